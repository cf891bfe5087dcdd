//! Provider Abstraction: narrow capability interfaces over the cloud provider.
//!
//! Each trait is a thin seam between the core (Deployment State Machine, Drift Engine, ...) and
//! the concrete AWS SDK, following the pattern in `connec-cloudformatious`'s `raw.rs`: a single
//! extension trait over a provider client, rather than reflecting over SDK types. No retries
//! happen here — see [`crate::deploy`] and [`crate::drift`] for the poll-loop retry policy.

pub mod aws;
#[cfg(test)]
pub mod mock;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{change_set::ResourceChange, error::FogError, tag::Tag};

/// A cancellable ambient operation context.
///
/// This is the single cancellation root described by the Concurrency & Resource Model: calling
/// [`cancel`](Self::cancel) aborts any outstanding polling loop promptly. A child context
/// (obtained via [`child`](Self::child)) observes cancellation of its parent but can also be
/// cancelled independently, so a sub-operation (e.g. a single provider call inside a poll loop)
/// can be cancelled without affecting siblings.
#[derive(Clone)]
pub struct OperationContext {
    cancelled: std::sync::Arc<tokio::sync::Notify>,
    state: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self {
            cancelled: std::sync::Arc::new(tokio::sync::Notify::new()),
            state: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }
}

impl OperationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }

    pub fn cancel(&self) {
        use std::sync::atomic::Ordering;
        self.state.store(true, Ordering::SeqCst);
        self.cancelled.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.cancelled.notified().await;
    }

    /// Spawn a task that cancels this context on the first Ctrl-C. Best-effort: if installing the
    /// signal handler fails, the operation simply runs uncancellable-by-signal.
    pub fn cancel_on_sigint(&self) {
        let ctx = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.cancel();
            }
        });
    }
}

/// A minimal description of a stack, as returned by `DescribeStacks`.
#[derive(Clone, Debug)]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub stack_status: crate::status::StackStatus,
    pub creation_time: DateTime<Utc>,
    pub parameters: Vec<(String, String)>,
    pub tags: Vec<Tag>,
}

/// A physical resource belonging to a stack, as returned by `DescribeStackResources`.
#[derive(Clone, Debug)]
pub struct StackResource {
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    pub resource_type: String,
    pub resource_status: crate::status::ResourceStatus,
}

/// Inputs for `CreateChangeSet`/`UpdateChangeSet`-equivalent calls.
#[derive(Clone, Debug)]
pub struct CreateChangeSetRequest {
    pub stack_name: String,
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
    pub template: TemplateSource,
    pub parameters: Vec<(String, String)>,
    pub tags: Vec<Tag>,
    pub capabilities: Vec<String>,
}

/// Whether a change set creates a new stack or updates an existing one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeSetType {
    Create,
    Update,
}

/// Where a template's content comes from, from the provider's perspective.
#[derive(Clone, Debug)]
pub enum TemplateSource {
    Inline(String),
    S3Url(String),
}

/// A described change set, prior to execution.
#[derive(Clone, Debug)]
pub struct DescribedChangeSet {
    pub name: String,
    pub id: String,
    pub stack_id: String,
    pub status: crate::status::ChangeSetStatus,
    pub status_reason: Option<String>,
    pub creation_time: DateTime<Utc>,
    pub changes: Vec<ResourceChange>,
}

/// An import-value export, as returned by `ListImports`.
#[derive(Clone, Debug)]
pub struct ImportValue {
    pub export_name: String,
    pub physical_value: String,
    pub importing_stack_ids: Vec<String>,
}

/// A drift-detection run identifier, returned by `DetectDrift`.
#[derive(Clone, Debug)]
pub struct DriftDetectionId(pub String);

/// The outcome of a completed drift detection run.
#[derive(Clone, Debug)]
pub struct DriftDetectionOutcome {
    pub status: DriftDetectionStatus,
    pub resources: Vec<ResourceDrift>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriftDetectionStatus {
    InProgress,
    Complete,
    Failed,
}

/// A single resource's drift result, as returned by `DescribeStackResourceDrifts`.
#[derive(Clone, Debug)]
pub struct ResourceDrift {
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    pub resource_type: String,
    pub expected_properties: serde_json::Value,
    pub actual_properties: serde_json::Value,
    pub drift_status: ResourceDriftStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceDriftStatus {
    InSync,
    Modified,
    Deleted,
    NotChecked,
}

/// The stack-API capability: everything a deployment or drift run needs from CloudFormation.
#[async_trait::async_trait]
pub trait StackApi: Send + Sync {
    async fn describe_stack(
        &self,
        ctx: &OperationContext,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, FogError>;

    async fn describe_stack_resources(
        &self,
        ctx: &OperationContext,
        stack_id: &str,
    ) -> Result<Vec<StackResource>, FogError>;

    async fn describe_stack_events(
        &self,
        ctx: &OperationContext,
        stack_id: &str,
    ) -> Result<Vec<crate::events::StackEvent>, FogError>;

    async fn create_change_set(
        &self,
        ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<DescribedChangeSet, FogError>;

    async fn describe_change_set(
        &self,
        ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<DescribedChangeSet, FogError>;

    async fn execute_change_set(
        &self,
        ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<(), FogError>;

    async fn delete_change_set(
        &self,
        ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<(), FogError>;

    async fn create_stack(
        &self,
        ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<String, FogError>;

    async fn delete_stack(&self, ctx: &OperationContext, stack_name: &str) -> Result<(), FogError>;

    async fn list_imports(
        &self,
        ctx: &OperationContext,
        export_name: &str,
    ) -> Result<ImportValue, FogError>;

    async fn validate_template(
        &self,
        ctx: &OperationContext,
        template: &TemplateSource,
    ) -> Result<(), FogError>;

    async fn detect_drift(
        &self,
        ctx: &OperationContext,
        stack_name: &str,
    ) -> Result<DriftDetectionId, FogError>;

    async fn describe_drift_results(
        &self,
        ctx: &OperationContext,
        detection_id: &DriftDetectionId,
    ) -> Result<DriftDetectionOutcome, FogError>;
}

/// The object-store capability, used by the Template & Artifact Loader for oversized templates.
#[async_trait::async_trait]
pub trait ObjectStoreApi: Send + Sync {
    async fn put_object(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), FogError>;

    async fn head_object(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        key: &str,
    ) -> Result<bool, FogError>;
}

/// A route in a route table, for drift canonicalization.
#[derive(Clone, Debug)]
pub struct Route {
    pub destination_cidr_block: Option<String>,
    pub destination_prefix_list_id: Option<String>,
    pub target: String,
    pub state: RouteState,
    pub origin: RouteOrigin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteState {
    Active,
    Blackhole,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteOrigin {
    CreateRouteTable,
    CreateRoute,
    EnableVgwRoutePropagation,
}

/// A network ACL entry, for drift canonicalization.
#[derive(Clone, Debug)]
pub struct NetworkAclEntry {
    pub rule_number: i32,
    pub cidr_block: Option<String>,
    pub ipv6_cidr_block: Option<String>,
    pub egress: bool,
}

/// The network capability, used by the Drift Engine to resolve prefix lists and inspect routing.
#[async_trait::async_trait]
pub trait NetworkApi: Send + Sync {
    async fn describe_route_tables(
        &self,
        ctx: &OperationContext,
        route_table_id: &str,
    ) -> Result<Vec<Route>, FogError>;

    async fn describe_network_acls(
        &self,
        ctx: &OperationContext,
        network_acl_id: &str,
    ) -> Result<Vec<NetworkAclEntry>, FogError>;

    async fn describe_managed_prefix_list_cidrs(
        &self,
        ctx: &OperationContext,
        prefix_list_id: &str,
    ) -> Result<Vec<String>, FogError>;
}

/// An unmanaged resource candidate, as reported by the directory/identity capability.
#[derive(Clone, Debug)]
pub struct DirectoryResource {
    pub identifier: String,
    pub resource_type: String,
    pub display_name: Option<String>,
}

/// The directory capability, used by the Drift Engine's unmanaged-resource enumeration.
#[async_trait::async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn caller_identity(&self, ctx: &OperationContext) -> Result<String, FogError>;

    async fn list_account_aliases(&self, ctx: &OperationContext) -> Result<Vec<String>, FogError>;

    async fn list_resources(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
    ) -> Result<Vec<DirectoryResource>, FogError>;
}

/// A grouping of the four provider capabilities, injected into components that need them.
pub struct Provider {
    pub stack: std::sync::Arc<dyn StackApi>,
    pub object_store: std::sync::Arc<dyn ObjectStoreApi>,
    pub network: std::sync::Arc<dyn NetworkApi>,
    pub directory: std::sync::Arc<dyn DirectoryApi>,
}

pub(crate) type ParameterMap = BTreeMap<String, String>;
