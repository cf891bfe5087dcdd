//! Drift Engine: detect and classify drift between a stack's managed resources and reality,
//! plus enumerate unmanaged resources of configured types.
//!
//! No single corpus file grounds this component directly (neither teacher implements drift
//! detection); it's built in the teacher's general thin-adapter idiom over the Provider
//! Abstraction (4.B), reusing [`crate::error`]'s per-resource warning pattern from
//! `status_reason.rs` for the "don't fail the whole run" canonicalization failures spec.md
//! requires.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::warn;

use crate::{
    error::{ErrorCode, FogError},
    provider::{DriftDetectionStatus, OperationContext, Provider, ResourceDrift, ResourceDriftStatus},
};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_ATTEMPTS: u32 = 120;

/// Configuration for a drift run.
#[derive(Clone, Debug, Default)]
pub struct DriftRequest {
    pub stack_name: String,
    pub ignored_tags: BTreeSet<String>,
    pub ignored_blackhole_routes: BTreeSet<String>,
    pub unmanaged_types_to_detect: Vec<String>,
    pub ignored_unmanaged_identifiers: BTreeSet<String>,
}

/// A property-level diff entry for a drifted resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PropertyDiff {
    Added { path: String, value: serde_json::Value },
    Removed { path: String, value: serde_json::Value },
    Modified { path: String, before: serde_json::Value, after: serde_json::Value },
}

#[derive(Clone, Debug)]
pub struct ManagedInSync {
    pub logical_resource_id: String,
}

#[derive(Clone, Debug)]
pub struct ManagedDrifted {
    pub logical_resource_id: String,
    pub diff: Vec<PropertyDiff>,
}

#[derive(Clone, Debug)]
pub struct UnmanagedRelevant {
    pub identifier: String,
    pub resource_type: String,
    pub display_name: Option<String>,
}

/// The three disjoint collections a drift run produces.
#[derive(Clone, Debug, Default)]
pub struct DriftResult {
    pub in_sync: Vec<ManagedInSync>,
    pub drifted: Vec<ManagedDrifted>,
    pub unmanaged: Vec<UnmanagedRelevant>,
    /// Per-resource notes for canonicalization steps that failed without aborting the run.
    pub warnings: Vec<String>,
}

/// Run a full drift detection: trigger, poll to completion, canonicalize, classify, then
/// enumerate unmanaged resources. A provider-level `DetectDrift` failure is fatal; individual
/// property resolution failures are recorded as warnings and do not abort the run.
pub async fn detect(
    provider: &Provider,
    ctx: &OperationContext,
    request: &DriftRequest,
) -> Result<DriftResult, FogError> {
    let detection_id = provider
        .stack
        .detect_drift(ctx, &request.stack_name)
        .await
        .map_err(|error| {
            FogError::new(ErrorCode::DriftDetectionFailed, "failed to start drift detection")
                .with_cause(error)
        })?;

    let outcome = poll_drift_complete(provider, ctx, &detection_id).await?;

    let mut result = DriftResult::default();
    for resource in outcome.resources {
        classify_resource(provider, ctx, request, resource, &mut result).await;
    }

    enumerate_unmanaged(provider, ctx, request, &mut result).await;

    Ok(result)
}

async fn poll_drift_complete(
    provider: &Provider,
    ctx: &OperationContext,
    detection_id: &crate::provider::DriftDetectionId,
) -> Result<crate::provider::DriftDetectionOutcome, FogError> {
    for attempt in 0..POLL_ATTEMPTS {
        if attempt > 0 {
            tokio::select! {
                () = ctx.cancelled() => {
                    return Err(FogError::new(ErrorCode::Internal, "drift detection cancelled"));
                }
                () = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }

        let outcome = provider
            .stack
            .describe_drift_results(ctx, detection_id)
            .await
            .map_err(|error| {
                FogError::new(ErrorCode::DriftDetectionFailed, "failed to describe drift results")
                    .with_cause(error)
            })?;

        match outcome.status {
            DriftDetectionStatus::InProgress => continue,
            DriftDetectionStatus::Complete => return Ok(outcome),
            DriftDetectionStatus::Failed => {
                return Err(FogError::new(ErrorCode::DriftDetectionFailed, "provider drift detection failed"))
            }
        }
    }

    Err(FogError::new(ErrorCode::Timeout, "timed out waiting for drift detection to complete"))
}

async fn classify_resource(
    provider: &Provider,
    ctx: &OperationContext,
    request: &DriftRequest,
    resource: ResourceDrift,
    result: &mut DriftResult,
) {
    match resource.drift_status {
        ResourceDriftStatus::InSync | ResourceDriftStatus::NotChecked => {
            result.in_sync.push(ManagedInSync { logical_resource_id: resource.logical_resource_id });
            return;
        }
        ResourceDriftStatus::Deleted => {
            result.drifted.push(ManagedDrifted {
                logical_resource_id: resource.logical_resource_id,
                diff: Vec::new(),
            });
            return;
        }
        ResourceDriftStatus::Modified => {}
    }

    if is_route_resource(&resource.resource_type) {
        if let Some(route_table_id) =
            route_table_id(&resource.actual_properties).or_else(|| route_table_id(&resource.expected_properties))
        {
            match provider.network.describe_route_tables(ctx, &route_table_id).await {
                Ok(routes) => {
                    let comparable = comparable_routes(&routes, &request.ignored_blackhole_routes);
                    let destination = route_destination(&resource.actual_properties)
                        .or_else(|| route_destination(&resource.expected_properties));
                    let excluded = destination.is_some_and(|(cidr, prefix_list_id)| {
                        !comparable.iter().any(|route| {
                            route.destination_cidr_block == cidr && route.destination_prefix_list_id == prefix_list_id
                        })
                    });
                    if excluded {
                        result.in_sync.push(ManagedInSync { logical_resource_id: resource.logical_resource_id });
                        return;
                    }
                }
                Err(error) => {
                    result.warnings.push(format!("couldn't describe route table {route_table_id}: {error}"));
                }
            }
        }
    }

    let mut expected = canonicalize(provider, ctx, request, &resource.expected_properties, &mut result.warnings).await;
    let mut actual = canonicalize(provider, ctx, request, &resource.actual_properties, &mut result.warnings).await;

    if is_route_resource(&resource.resource_type) {
        let mut cidrs_by_list = Vec::new();
        for prefix_list_id in [&expected, &actual].into_iter().filter_map(|value| route_destination(value).and_then(|(_, prefix_list_id)| prefix_list_id)) {
            match expand_prefix_list(provider, ctx, &prefix_list_id).await {
                Ok(cidrs) => cidrs_by_list.push((prefix_list_id, cidrs)),
                Err(error) => result.warnings.push(format!("couldn't expand prefix list {prefix_list_id}: {error}")),
            }
        }
        let cache = prefix_list_cidr_map(cidrs_by_list);
        expected = canonicalize_route_destination(&expected, &cache);
        actual = canonicalize_route_destination(&actual, &cache);
    }

    let diff = diff_properties(&expected, &actual, String::new());
    if diff.is_empty() {
        result.in_sync.push(ManagedInSync { logical_resource_id: resource.logical_resource_id });
    } else {
        result.drifted.push(ManagedDrifted { logical_resource_id: resource.logical_resource_id, diff });
    }
}

fn is_route_resource(resource_type: &str) -> bool {
    resource_type == "AWS::EC2::Route"
}

fn route_table_id(properties: &serde_json::Value) -> Option<String> {
    properties.get("RouteTableId")?.as_str().map(str::to_string)
}

/// `(destination_cidr_block, destination_prefix_list_id)` as declared on a route resource.
fn route_destination(properties: &serde_json::Value) -> Option<(Option<String>, Option<String>)> {
    let cidr = properties.get("DestinationCidrBlock").and_then(serde_json::Value::as_str).map(str::to_string);
    let prefix_list_id = properties.get("DestinationPrefixListId").and_then(serde_json::Value::as_str).map(str::to_string);
    (cidr.is_some() || prefix_list_id.is_some()).then_some((cidr, prefix_list_id))
}

/// Replace a route's `DestinationPrefixListId` with its expanded CIDR membership (merged with any
/// `DestinationCidrBlock`, looked up from `prefix_lists`) so a template-defined CIDR and an
/// equivalent prefix-list membership compare equal.
fn canonicalize_route_destination(value: &serde_json::Value, prefix_lists: &BTreeMap<String, Vec<String>>) -> serde_json::Value {
    let serde_json::Value::Object(map) = value else { return value.clone() };
    let Some((cidr, prefix_list_id)) = route_destination(value) else { return value.clone() };

    let mut cidrs: Vec<String> = cidr.into_iter().collect();
    if let Some(prefix_list_id) = &prefix_list_id {
        if let Some(expanded) = prefix_lists.get(prefix_list_id) {
            cidrs.extend(expanded.iter().cloned());
        }
    }
    cidrs.sort();
    cidrs.dedup();

    let mut canonical = map.clone();
    canonical.remove("DestinationCidrBlock");
    canonical.remove("DestinationPrefixListId");
    canonical.insert(
        "DestinationCidrBlocks".to_string(),
        serde_json::Value::Array(cidrs.into_iter().map(serde_json::Value::String).collect()),
    );
    serde_json::Value::Object(canonical)
}

/// Parse an IPv6 CIDR block into the same canonical (RFC 5952 compressed) form the provider
/// reports, so a template-authored and an observed block compare equal regardless of zero-run
/// compression style.
#[must_use]
pub fn canonicalize_ipv6_cidr(cidr: &str) -> String {
    let Some((address, prefix_len)) = cidr.split_once('/') else {
        return cidr.to_string();
    };
    match address.trim().parse::<std::net::Ipv6Addr>() {
        Ok(parsed) => format!("{parsed}/{prefix_len}"),
        Err(_) => cidr.to_string(),
    }
}

/// Apply the canonicalization rules spec.md requires before comparison: resolve
/// `Fn::ImportValue`, drop ignored tags. Prefix-list/route/NACL canonicalization is applied by
/// the caller once the relevant network context (route table / NACL id) is known; this function
/// covers the resource-property-level rules that apply uniformly to every resource.
///
/// `Fn::ImportValue` references are resolved breadth-first (collect, then await each, then
/// substitute) rather than via recursive `async fn`, since a self-recursive async function can't
/// express its state machine's size.
async fn canonicalize(
    provider: &Provider,
    ctx: &OperationContext,
    request: &DriftRequest,
    value: &serde_json::Value,
    warnings: &mut Vec<String>,
) -> serde_json::Value {
    let mut canonical = canonicalize_ipv6_fields(&drop_ignored_tags(value, &request.ignored_tags));

    let export_names = collect_import_value_refs(&canonical);
    for export_name in export_names {
        let resolved = match provider.stack.list_imports(ctx, &export_name).await {
            Ok(import) => serde_json::Value::String(import.physical_value),
            Err(error) => {
                warnings.push(format!("couldn't resolve Fn::ImportValue({export_name}): {error}"));
                continue;
            }
        };
        substitute_import_value_ref(&mut canonical, &export_name, resolved);
    }

    canonical
}

fn drop_ignored_tags(value: &serde_json::Value, ignored_tags: &BTreeSet<String>) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if key == "Tags" {
                        canonicalize_tags(v, ignored_tags)
                    } else {
                        drop_ignored_tags(v, ignored_tags)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|item| drop_ignored_tags(item, ignored_tags)).collect())
        }
        other => other.clone(),
    }
}

/// Parse every `Ipv6CidrBlock` property into the provider's canonical form, recursively.
fn canonicalize_ipv6_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if key == "Ipv6CidrBlock" {
                        match v.as_str() {
                            Some(cidr) => serde_json::Value::String(canonicalize_ipv6_cidr(cidr)),
                            None => v.clone(),
                        }
                    } else {
                        canonicalize_ipv6_fields(v)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize_ipv6_fields).collect())
        }
        other => other.clone(),
    }
}

fn collect_import_value_refs(value: &serde_json::Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_import_value_refs_into(value, &mut refs);
    refs
}

fn collect_import_value_refs_into(value: &serde_json::Value, refs: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(export_name)) = map.get("Fn::ImportValue") {
                refs.push(export_name.clone());
                return;
            }
            for v in map.values() {
                collect_import_value_refs_into(v, refs);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_import_value_refs_into(item, refs);
            }
        }
        _ => {}
    }
}

fn substitute_import_value_ref(value: &mut serde_json::Value, export_name: &str, resolved: serde_json::Value) {
    if let serde_json::Value::Object(map) = &*value {
        if let Some(serde_json::Value::String(name)) = map.get("Fn::ImportValue") {
            if name == export_name {
                *value = resolved;
                return;
            }
        }
    }
    match value {
        serde_json::Value::Object(map) => {
            for v in map.values_mut() {
                substitute_import_value_ref(v, export_name, resolved.clone());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_import_value_ref(item, export_name, resolved.clone());
            }
        }
        _ => {}
    }
}

fn canonicalize_tags(value: &serde_json::Value, ignored_tags: &BTreeSet<String>) -> serde_json::Value {
    let serde_json::Value::Array(tags) = value else {
        return value.clone();
    };
    let filtered: Vec<_> = tags
        .iter()
        .filter(|tag| {
            tag.get("Key")
                .and_then(serde_json::Value::as_str)
                .is_none_or(|key| !ignored_tags.contains(key))
        })
        .cloned()
        .collect();
    serde_json::Value::Array(filtered)
}

fn diff_properties(expected: &serde_json::Value, actual: &serde_json::Value, path: String) -> Vec<PropertyDiff> {
    match (expected, actual) {
        (serde_json::Value::Object(expected_map), serde_json::Value::Object(actual_map)) => {
            let mut diffs = Vec::new();
            let keys: BTreeSet<&String> = expected_map.keys().chain(actual_map.keys()).collect();
            for key in keys {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                match (expected_map.get(key), actual_map.get(key)) {
                    (Some(e), Some(a)) => diffs.extend(diff_properties(e, a, child_path)),
                    (Some(e), None) => diffs.push(PropertyDiff::Removed { path: child_path, value: e.clone() }),
                    (None, Some(a)) => diffs.push(PropertyDiff::Added { path: child_path, value: a.clone() }),
                    (None, None) => unreachable!(),
                }
            }
            diffs
        }
        (expected, actual) if scalars_equal_as_string(expected, actual) => Vec::new(),
        (expected, actual) if expected != actual => {
            vec![PropertyDiff::Modified { path, before: expected.clone(), after: actual.clone() }]
        }
        _ => Vec::new(),
    }
}

/// A non-JSON scalar (a number or bool template-authored as a string, or vice versa) is compared
/// by its string form, per spec.md §4.H's "observed value is non-JSON scalar" rule.
fn scalars_equal_as_string(expected: &serde_json::Value, actual: &serde_json::Value) -> bool {
    match (expected, actual) {
        (serde_json::Value::Object(_) | serde_json::Value::Array(_), _)
        | (_, serde_json::Value::Object(_) | serde_json::Value::Array(_)) => false,
        _ => expected != actual && scalar_to_string(expected) == scalar_to_string(actual),
    }
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => unreachable!(),
    }
}

async fn enumerate_unmanaged(
    provider: &Provider,
    ctx: &OperationContext,
    request: &DriftRequest,
    result: &mut DriftResult,
) {
    for resource_type in &request.unmanaged_types_to_detect {
        let resources = match provider.directory.list_resources(ctx, resource_type).await {
            Ok(resources) => resources,
            Err(error) => {
                warn!(%resource_type, %error, "failed to enumerate unmanaged resources");
                result.warnings.push(format!("couldn't enumerate unmanaged {resource_type}: {error}"));
                continue;
            }
        };
        for resource in resources {
            if request.ignored_unmanaged_identifiers.contains(&resource.identifier) {
                continue;
            }
            result.unmanaged.push(UnmanagedRelevant {
                identifier: resource.identifier,
                resource_type: resource.resource_type,
                display_name: resource.display_name,
            });
        }
    }
}

/// Expand a managed prefix list into its CIDR membership, for route-table comparison.
pub async fn expand_prefix_list(
    provider: &Provider,
    ctx: &OperationContext,
    prefix_list_id: &str,
) -> Result<Vec<String>, FogError> {
    provider
        .network
        .describe_managed_prefix_list_cidrs(ctx, prefix_list_id)
        .await
}

/// Filter routes the spec says to exclude from comparison: propagated routes, and blackhole
/// routes whose destination CIDR is in the ignored set.
#[must_use]
pub fn comparable_routes<'a>(
    routes: &'a [crate::provider::Route],
    ignored_blackhole_routes: &BTreeSet<String>,
) -> Vec<&'a crate::provider::Route> {
    use crate::provider::{RouteOrigin, RouteState};
    routes
        .iter()
        .filter(|route| route.origin != RouteOrigin::EnableVgwRoutePropagation)
        .filter(|route| {
            route.state != RouteState::Blackhole
                || route
                    .destination_cidr_block
                    .as_deref()
                    .is_none_or(|cidr| !ignored_blackhole_routes.contains(cidr))
        })
        .collect()
}

/// Build a lookup from managed prefix-list id to its CIDR membership, for resolving NACL/route
/// entries that reference a prefix list by id.
#[must_use]
pub fn prefix_list_cidr_map(cidrs_by_list: Vec<(String, Vec<String>)>) -> BTreeMap<String, Vec<String>> {
    cidrs_by_list.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_properties_detects_added_removed_modified() {
        let expected = serde_json::json!({"A": 1, "B": 2});
        let actual = serde_json::json!({"A": 1, "C": 3});
        let diff = diff_properties(&expected, &actual, String::new());
        assert!(diff.iter().any(|d| matches!(d, PropertyDiff::Removed { path, .. } if path == "B")));
        assert!(diff.iter().any(|d| matches!(d, PropertyDiff::Added { path, .. } if path == "C")));
    }

    #[test]
    fn diff_properties_empty_for_equal_values() {
        let value = serde_json::json!({"A": [1, 2, 3]});
        assert!(diff_properties(&value, &value, String::new()).is_empty());
    }

    #[test]
    fn comparable_routes_excludes_propagated_and_ignored_blackholes() {
        use crate::provider::{Route, RouteOrigin, RouteState};
        let routes = vec![
            Route {
                destination_cidr_block: Some("10.0.0.0/16".to_string()),
                destination_prefix_list_id: None,
                target: "igw-1".to_string(),
                state: RouteState::Active,
                origin: RouteOrigin::EnableVgwRoutePropagation,
            },
            Route {
                destination_cidr_block: Some("0.0.0.0/0".to_string()),
                destination_prefix_list_id: None,
                target: "blackhole".to_string(),
                state: RouteState::Blackhole,
                origin: RouteOrigin::CreateRoute,
            },
            Route {
                destination_cidr_block: Some("192.168.0.0/24".to_string()),
                destination_prefix_list_id: None,
                target: "nat-1".to_string(),
                state: RouteState::Active,
                origin: RouteOrigin::CreateRoute,
            },
        ];
        let ignored: BTreeSet<String> = ["0.0.0.0/0".to_string()].into_iter().collect();
        let comparable = comparable_routes(&routes, &ignored);
        assert_eq!(comparable.len(), 1);
        assert_eq!(comparable[0].target, "nat-1");
    }

    #[test]
    fn canonicalize_tags_drops_ignored_keys() {
        let tags = serde_json::json!([{"Key": "Env", "Value": "dev"}, {"Key": "ManagedBy", "Value": "fog"}]);
        let ignored: BTreeSet<String> = ["ManagedBy".to_string()].into_iter().collect();
        let filtered = canonicalize_tags(&tags, &ignored);
        assert_eq!(filtered.as_array().unwrap().len(), 1);
    }

    #[test]
    fn canonicalize_ipv6_cidr_compresses_zero_runs() {
        assert_eq!(canonicalize_ipv6_cidr("2001:0db8:0000:0000:0000:0000:0000:0001/64"), "2001:db8::1/64");
        assert_eq!(canonicalize_ipv6_cidr("::/0"), "::/0");
        assert_eq!(canonicalize_ipv6_cidr("not-a-cidr"), "not-a-cidr");
    }

    #[test]
    fn canonicalize_route_destination_expands_prefix_list_into_cidrs() {
        let actual = serde_json::json!({"RouteTableId": "rtb-1", "DestinationPrefixListId": "pl-1"});
        let cache: BTreeMap<String, Vec<String>> =
            [("pl-1".to_string(), vec!["10.0.0.0/16".to_string(), "10.1.0.0/16".to_string()])].into_iter().collect();
        let canonical = canonicalize_route_destination(&actual, &cache);
        assert_eq!(
            canonical.get("DestinationCidrBlocks").unwrap(),
            &serde_json::json!(["10.0.0.0/16", "10.1.0.0/16"])
        );
        assert!(canonical.get("DestinationPrefixListId").is_none());
    }

    #[test]
    fn canonicalize_route_destination_merges_equivalent_cidr_and_prefix_list_forms() {
        let expected = serde_json::json!({"RouteTableId": "rtb-1", "DestinationCidrBlock": "10.0.0.0/16"});
        let actual = serde_json::json!({"RouteTableId": "rtb-1", "DestinationPrefixListId": "pl-1"});
        let cache: BTreeMap<String, Vec<String>> = [("pl-1".to_string(), vec!["10.0.0.0/16".to_string()])].into_iter().collect();
        assert_eq!(
            canonicalize_route_destination(&expected, &cache),
            canonicalize_route_destination(&actual, &cache)
        );
    }

    #[tokio::test]
    async fn import_value_resolves_to_its_physical_value_via_the_provider() {
        use crate::provider::mock::{MockDirectoryApi, MockNetworkApi, MockObjectStore, MockStackApi};

        let stack = MockStackApi::new();
        stack.imports.lock().unwrap().push(crate::provider::ImportValue {
            export_name: "Peering".to_string(),
            physical_value: "pcx-12345".to_string(),
            importing_stack_ids: Vec::new(),
        });
        let provider = Provider {
            stack: std::sync::Arc::new(stack),
            object_store: std::sync::Arc::new(MockObjectStore::default()),
            network: std::sync::Arc::new(MockNetworkApi::default()),
            directory: std::sync::Arc::new(MockDirectoryApi::default()),
        };
        let ctx = OperationContext::new();
        let request = DriftRequest::default();

        let value = serde_json::json!({"Target": {"Fn::ImportValue": "Peering"}});
        let mut warnings = Vec::new();
        let canonical = canonicalize(&provider, &ctx, &request, &value, &mut warnings).await;

        assert_eq!(canonical, serde_json::json!({"Target": "pcx-12345"}));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn a_route_matching_the_observed_import_value_is_in_sync() {
        use crate::provider::mock::{MockDirectoryApi, MockNetworkApi, MockObjectStore, MockStackApi};

        let stack = MockStackApi::new();
        stack.imports.lock().unwrap().push(crate::provider::ImportValue {
            export_name: "Peering".to_string(),
            physical_value: "pcx-12345".to_string(),
            importing_stack_ids: Vec::new(),
        });
        let provider = Provider {
            stack: std::sync::Arc::new(stack),
            object_store: std::sync::Arc::new(MockObjectStore::default()),
            network: std::sync::Arc::new(MockNetworkApi::default()),
            directory: std::sync::Arc::new(MockDirectoryApi::default()),
        };
        let ctx = OperationContext::new();
        let request = DriftRequest::default();

        let expected = serde_json::json!({"Target": {"Fn::ImportValue": "Peering"}});
        let actual = serde_json::json!({"Target": "pcx-12345"});
        let mut warnings = Vec::new();
        let canonical_expected = canonicalize(&provider, &ctx, &request, &expected, &mut warnings).await;
        let canonical_actual = canonicalize(&provider, &ctx, &request, &actual, &mut warnings).await;

        assert!(diff_properties(&canonical_expected, &canonical_actual, String::new()).is_empty());
    }
}
