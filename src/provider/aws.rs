//! AWS SDK-backed adapters implementing the Provider Abstraction.
//!
//! Each adapter is a thin struct wrapping a single AWS SDK client, following
//! `connec-cloudformatious`'s `raw.rs` pattern of an extension trait over the raw client rather
//! than reflection over SDK types. Credential/config bootstrapping follows the teacher's
//! `src/client.rs` (SSO device-flow first, falling back to the default provider chain).

use std::fmt;

use aws_config::meta::credentials::CredentialsProviderChain;
use aws_sdk_cloudformation::config::ProvideCredentials;
use aws_smithy_types_convert::date_time::DateTimeExt;
use aws_types::region::Region;

use crate::{
    change_set::{Action, ModifyDetail, Replacement, ResourceChange},
    error::{ErrorCode, FogError},
    events::StackEvent,
    status::{ChangeSetStatus, ResourceStatus, StackStatus},
    tag::Tag,
};

use super::{
    ChangeSetType, CreateChangeSetRequest, DescribedChangeSet, DriftDetectionId,
    DriftDetectionOutcome, DriftDetectionStatus, ImportValue, NetworkAclEntry, OperationContext,
    Route, RouteOrigin, RouteState, StackApi, StackDescription, StackResource, TemplateSource,
};

/// Bootstrap an [`aws_config::SdkConfig`] the way the CLI teacher does: try SSO device-flow
/// first, then fall back to the default provider chain, then pre-warm credentials so later
/// concurrent calls don't race to trigger the interactive flow.
pub async fn load_sdk_config(
    region: Option<Region>,
    non_interactive: bool,
) -> Result<aws_config::SdkConfig, FogError> {
    let sso = aws_sso_flow::SsoFlow::builder().verification_prompt(move |url| async move {
        if non_interactive {
            Err(NonInteractiveSsoError)
        } else {
            eprintln!("Using an SSO profile – go to {url} to authenticate");
            Ok(())
        }
    });
    let credentials = CredentialsProviderChain::first_try("SsoFlow", sso)
        .or_default_provider()
        .await;

    credentials.provide_credentials().await.map_err(|error| {
        FogError::new(ErrorCode::MissingCredentials, "failed to resolve AWS credentials")
            .with_user_message("Could not obtain AWS credentials")
            .with_cause(AdapterError(error.to_string()))
    })?;

    let mut loader = aws_config::from_env().credentials_provider(credentials);
    if let Some(region) = region {
        loader = loader.region(region);
    }
    Ok(loader.load().await)
}

#[derive(Debug)]
struct NonInteractiveSsoError;

impl fmt::Display for NonInteractiveSsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "can't complete SSO authentication in a non-interactive context")
    }
}

impl std::error::Error for NonInteractiveSsoError {}

#[derive(Debug)]
struct AdapterError(String);

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AdapterError {}

fn provider_error(code: ErrorCode, context: &str, error: impl fmt::Display) -> FogError {
    FogError::new(code, format!("{context}: {error}"))
        .with_cause(AdapterError(error.to_string()))
}

/// [`StackApi`] backed by `aws-sdk-cloudformation`.
pub struct CloudFormationAdapter {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationAdapter {
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
        }
    }

    /// `ListImports` reports only the importing stack ids, never the export's value, so
    /// `list_imports` pages through `ListExports` looking for the matching name.
    async fn find_export_value(&self, export_name: &str) -> Result<String, FogError> {
        let mut next_token = None;
        loop {
            let mut builder = self.client.list_exports();
            if let Some(token) = next_token {
                builder = builder.next_token(token);
            }
            let output = builder
                .send()
                .await
                .map_err(|error| provider_error(ErrorCode::ServiceError, "ListExports failed", error))?;

            if let Some(export) = output.exports.unwrap_or_default().into_iter().find(|export| export.name() == Some(export_name)) {
                return Ok(export.value().unwrap_or_default().to_string());
            }

            next_token = output.next_token;
            if next_token.is_none() {
                return Ok(String::new());
            }
        }
    }
}

#[async_trait::async_trait]
impl StackApi for CloudFormationAdapter {
    async fn describe_stack(
        &self,
        _ctx: &OperationContext,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, FogError> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(error) if is_stack_not_found(&error) => return Ok(None),
            Err(error) => {
                return Err(provider_error(ErrorCode::ServiceError, "DescribeStacks failed", error))
            }
        };
        let stack = match output.stacks.and_then(|mut stacks| stacks.pop()) {
            Some(stack) => stack,
            None => return Ok(None),
        };
        let stack_status = stack
            .stack_status
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or_default()
            .parse::<StackStatus>()
            .map_err(|_| FogError::new(ErrorCode::Internal, "unrecognized stack status"))?;
        Ok(Some(StackDescription {
            stack_id: stack.stack_id.unwrap_or_default(),
            stack_name: stack.stack_name.unwrap_or_default(),
            stack_status,
            creation_time: stack
                .creation_time
                .and_then(|t| t.to_chrono_utc().ok())
                .unwrap_or_default(),
            parameters: stack
                .parameters
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| Some((p.parameter_key?, p.parameter_value.unwrap_or_default())))
                .collect(),
            tags: stack.tags.unwrap_or_default().into_iter().map(Tag::from_sdk).collect(),
        }))
    }

    async fn describe_stack_resources(
        &self,
        _ctx: &OperationContext,
        stack_id: &str,
    ) -> Result<Vec<StackResource>, FogError> {
        let output = self
            .client
            .describe_stack_resources()
            .stack_name(stack_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ServiceError, "DescribeStackResources failed", error))?;
        output
            .stack_resources
            .unwrap_or_default()
            .into_iter()
            .map(|resource| {
                let resource_status = resource
                    .resource_status
                    .as_ref()
                    .map(|s| s.as_str())
                    .unwrap_or_default()
                    .parse::<ResourceStatus>()
                    .map_err(|_| FogError::new(ErrorCode::Internal, "unrecognized resource status"))?;
                Ok(StackResource {
                    logical_resource_id: resource.logical_resource_id.unwrap_or_default(),
                    physical_resource_id: resource.physical_resource_id,
                    resource_type: resource.resource_type.unwrap_or_default(),
                    resource_status,
                })
            })
            .collect()
    }

    async fn describe_stack_events(
        &self,
        _ctx: &OperationContext,
        stack_id: &str,
    ) -> Result<Vec<StackEvent>, FogError> {
        let mut events = Vec::new();
        let mut pages = self
            .client
            .describe_stack_events()
            .stack_name(stack_id)
            .into_paginator()
            .send();
        while let Some(page) = futures_util::StreamExt::next(&mut pages).await {
            let page = page.map_err(|error| {
                provider_error(ErrorCode::ServiceError, "DescribeStackEvents failed", error)
            })?;
            for event in page.stack_events.unwrap_or_default() {
                events.push(StackEvent::from_sdk(event)?);
            }
        }
        Ok(events)
    }

    async fn create_change_set(
        &self,
        ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<DescribedChangeSet, FogError> {
        let mut builder = self
            .client
            .create_change_set()
            .stack_name(&request.stack_name)
            .change_set_name(&request.change_set_name)
            .change_set_type(match request.change_set_type {
                ChangeSetType::Create => aws_sdk_cloudformation::types::ChangeSetType::Create,
                ChangeSetType::Update => aws_sdk_cloudformation::types::ChangeSetType::Update,
            })
            .set_capabilities(Some(
                request
                    .capabilities
                    .iter()
                    .filter_map(|c| c.parse().ok())
                    .collect(),
            ))
            .set_parameters(Some(
                request
                    .parameters
                    .iter()
                    .map(|(key, value)| {
                        aws_sdk_cloudformation::types::Parameter::builder()
                            .parameter_key(key)
                            .parameter_value(value)
                            .build()
                    })
                    .collect(),
            ))
            .set_tags(Some(request.tags.into_iter().map(Tag::into_sdk).collect()));
        builder = match &request.template {
            TemplateSource::Inline(body) => builder.template_body(body),
            TemplateSource::S3Url(url) => builder.template_url(url),
        };

        let output = builder
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ChangesetFailed, "CreateChangeSet failed", error))?;
        let change_set_id = output.id.ok_or_else(|| {
            FogError::new(ErrorCode::Internal, "CreateChangeSet returned no id")
        })?;

        self.describe_change_set(ctx, &change_set_id).await
    }

    async fn describe_change_set(
        &self,
        _ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<DescribedChangeSet, FogError> {
        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ChangesetFailed, "DescribeChangeSet failed", error))?;

        let status = output
            .status
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or_default()
            .parse::<ChangeSetStatus>()
            .map_err(|_| FogError::new(ErrorCode::Internal, "unrecognized change set status"))?;

        let changes = output
            .changes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|change| change.resource_change)
            .map(ResourceChange::from_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DescribedChangeSet {
            name: output.change_set_name.unwrap_or_default(),
            id: output.change_set_id.unwrap_or_default(),
            stack_id: output.stack_id.unwrap_or_default(),
            status,
            status_reason: output.status_reason,
            creation_time: output
                .creation_time
                .and_then(|t| t.to_chrono_utc().ok())
                .unwrap_or_default(),
            changes,
        })
    }

    async fn execute_change_set(
        &self,
        _ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<(), FogError> {
        self.client
            .execute_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ChangesetFailed, "ExecuteChangeSet failed", error))?;
        Ok(())
    }

    async fn delete_change_set(
        &self,
        _ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<(), FogError> {
        self.client
            .delete_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ServiceError, "DeleteChangeSet failed", error))?;
        Ok(())
    }

    async fn create_stack(
        &self,
        _ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<String, FogError> {
        let mut builder = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .set_capabilities(Some(
                request
                    .capabilities
                    .iter()
                    .filter_map(|c| c.parse().ok())
                    .collect(),
            ))
            .set_parameters(Some(
                request
                    .parameters
                    .iter()
                    .map(|(key, value)| {
                        aws_sdk_cloudformation::types::Parameter::builder()
                            .parameter_key(key)
                            .parameter_value(value)
                            .build()
                    })
                    .collect(),
            ))
            .set_tags(Some(request.tags.into_iter().map(Tag::into_sdk).collect()));
        builder = match &request.template {
            TemplateSource::Inline(body) => builder.template_body(body),
            TemplateSource::S3Url(url) => builder.template_url(url),
        };
        let output = builder
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::DeploymentFailed, "CreateStack failed", error))?;
        Ok(output.stack_id.unwrap_or_default())
    }

    async fn delete_stack(&self, _ctx: &OperationContext, stack_name: &str) -> Result<(), FogError> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::DeploymentFailed, "DeleteStack failed", error))?;
        Ok(())
    }

    async fn list_imports(
        &self,
        _ctx: &OperationContext,
        export_name: &str,
    ) -> Result<ImportValue, FogError> {
        let output = self
            .client
            .list_imports()
            .export_name(export_name)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ServiceError, "ListImports failed", error))?;

        let physical_value = self.find_export_value(export_name).await?;

        Ok(ImportValue {
            export_name: export_name.to_string(),
            physical_value,
            importing_stack_ids: output.imports.unwrap_or_default(),
        })
    }

    async fn validate_template(
        &self,
        _ctx: &OperationContext,
        template: &TemplateSource,
    ) -> Result<(), FogError> {
        let mut builder = self.client.validate_template();
        builder = match template {
            TemplateSource::Inline(body) => builder.template_body(body),
            TemplateSource::S3Url(url) => builder.template_url(url),
        };
        builder
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::TemplateInvalid, "ValidateTemplate failed", error))?;
        Ok(())
    }

    async fn detect_drift(
        &self,
        _ctx: &OperationContext,
        stack_name: &str,
    ) -> Result<DriftDetectionId, FogError> {
        let output = self
            .client
            .detect_stack_drift()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::DriftDetectionFailed, "DetectStackDrift failed", error))?;
        Ok(DriftDetectionId(output.stack_drift_detection_id.unwrap_or_default()))
    }

    async fn describe_drift_results(
        &self,
        _ctx: &OperationContext,
        detection_id: &DriftDetectionId,
    ) -> Result<DriftDetectionOutcome, FogError> {
        let status_output = self
            .client
            .describe_stack_drift_detection_status()
            .stack_drift_detection_id(&detection_id.0)
            .send()
            .await
            .map_err(|error| {
                provider_error(ErrorCode::DriftDetectionFailed, "DescribeStackDriftDetectionStatus failed", error)
            })?;

        use aws_sdk_cloudformation::types::StackDriftDetectionStatus as SdkStatus;
        let status = match status_output.detection_status {
            Some(SdkStatus::DetectionInProgress) => DriftDetectionStatus::InProgress,
            Some(SdkStatus::DetectionComplete) => DriftDetectionStatus::Complete,
            Some(SdkStatus::DetectionFailed) | None => DriftDetectionStatus::Failed,
            Some(_) => DriftDetectionStatus::Failed,
        };

        let resources = if status == DriftDetectionStatus::Complete {
            let output = self
                .client
                .describe_stack_resource_drifts()
                .stack_name(status_output.stack_id.unwrap_or_default())
                .send()
                .await
                .map_err(|error| {
                    provider_error(ErrorCode::DriftDetectionFailed, "DescribeStackResourceDrifts failed", error)
                })?;
            output
                .stack_resource_drifts
                .unwrap_or_default()
                .into_iter()
                .map(|drift| {
                    use aws_sdk_cloudformation::types::StackResourceDriftStatus as SdkDriftStatus;
                    super::ResourceDrift {
                        logical_resource_id: drift.logical_resource_id.unwrap_or_default(),
                        physical_resource_id: drift.physical_resource_id,
                        resource_type: drift.resource_type.unwrap_or_default(),
                        expected_properties: drift
                            .expected_properties
                            .as_deref()
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(serde_json::Value::Null),
                        actual_properties: drift
                            .actual_properties
                            .as_deref()
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(serde_json::Value::Null),
                        drift_status: match drift.stack_resource_drift_status {
                            Some(SdkDriftStatus::InSync) => super::ResourceDriftStatus::InSync,
                            Some(SdkDriftStatus::Modified) => super::ResourceDriftStatus::Modified,
                            Some(SdkDriftStatus::Deleted) => super::ResourceDriftStatus::Deleted,
                            _ => super::ResourceDriftStatus::NotChecked,
                        },
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(DriftDetectionOutcome { status, resources })
    }
}

fn is_stack_not_found<E>(error: &aws_sdk_cloudformation::error::SdkError<E>) -> bool
where
    E: std::error::Error + 'static,
{
    error.to_string().contains("does not exist")
}

/// [`super::ObjectStoreApi`] backed by `aws-sdk-s3`.
pub struct S3Adapter {
    client: aws_sdk_s3::Client,
}

impl S3Adapter {
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl super::ObjectStoreApi for S3Adapter {
    async fn put_object(
        &self,
        _ctx: &OperationContext,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), FogError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(bytes.into())
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::TemplateUploadFailed, "PutObject failed", error))?;
        Ok(())
    }

    async fn head_object(
        &self,
        _ctx: &OperationContext,
        bucket: &str,
        key: &str,
    ) -> Result<bool, FogError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(error) if error.to_string().contains("404") || error.to_string().contains("NotFound") => Ok(false),
            Err(error) => Err(provider_error(ErrorCode::ServiceError, "HeadObject failed", error)),
        }
    }
}

/// [`super::NetworkApi`] backed by `aws-sdk-ec2`.
pub struct Ec2Adapter {
    client: aws_sdk_ec2::Client,
}

impl Ec2Adapter {
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl super::NetworkApi for Ec2Adapter {
    async fn describe_route_tables(
        &self,
        _ctx: &OperationContext,
        route_table_id: &str,
    ) -> Result<Vec<Route>, FogError> {
        let output = self
            .client
            .describe_route_tables()
            .route_table_ids(route_table_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ServiceError, "DescribeRouteTables failed", error))?;

        let routes = output
            .route_tables
            .unwrap_or_default()
            .into_iter()
            .flat_map(|table| table.routes.unwrap_or_default())
            .map(|route| Route {
                destination_cidr_block: route.destination_cidr_block,
                destination_prefix_list_id: route.destination_prefix_list_id,
                target: route
                    .gateway_id
                    .or(route.nat_gateway_id)
                    .or(route.vpc_peering_connection_id)
                    .or(route.network_interface_id)
                    .or(route.instance_id)
                    .unwrap_or_default(),
                state: match route.state {
                    Some(aws_sdk_ec2::types::RouteState::Blackhole) => RouteState::Blackhole,
                    _ => RouteState::Active,
                },
                origin: match route.origin {
                    Some(aws_sdk_ec2::types::RouteOrigin::CreateRoute) => RouteOrigin::CreateRoute,
                    Some(aws_sdk_ec2::types::RouteOrigin::EnableVgwRoutePropagation) => {
                        RouteOrigin::EnableVgwRoutePropagation
                    }
                    _ => RouteOrigin::CreateRouteTable,
                },
            })
            .collect();
        Ok(routes)
    }

    async fn describe_network_acls(
        &self,
        _ctx: &OperationContext,
        network_acl_id: &str,
    ) -> Result<Vec<NetworkAclEntry>, FogError> {
        let output = self
            .client
            .describe_network_acls()
            .network_acl_ids(network_acl_id)
            .send()
            .await
            .map_err(|error| provider_error(ErrorCode::ServiceError, "DescribeNetworkAcls failed", error))?;

        let entries = output
            .network_acls
            .unwrap_or_default()
            .into_iter()
            .flat_map(|acl| acl.entries.unwrap_or_default())
            .map(|entry| NetworkAclEntry {
                rule_number: entry.rule_number.unwrap_or_default(),
                cidr_block: entry.cidr_block,
                ipv6_cidr_block: entry.ipv6_cidr_block.map(|cidr| crate::drift::canonicalize_ipv6_cidr(&cidr)),
                egress: entry.egress.unwrap_or_default(),
            })
            .collect();
        Ok(entries)
    }

    async fn describe_managed_prefix_list_cidrs(
        &self,
        _ctx: &OperationContext,
        prefix_list_id: &str,
    ) -> Result<Vec<String>, FogError> {
        let mut cidrs = Vec::new();
        let mut pages = self
            .client
            .get_managed_prefix_list_entries()
            .prefix_list_id(prefix_list_id)
            .into_paginator()
            .send();
        while let Some(page) = futures_util::StreamExt::next(&mut pages).await {
            let page = page.map_err(|error| {
                provider_error(ErrorCode::ServiceError, "GetManagedPrefixListEntries failed", error)
            })?;
            for entry in page.entries.unwrap_or_default() {
                if let Some(cidr) = entry.cidr {
                    cidrs.push(cidr);
                }
            }
        }
        Ok(cidrs)
    }
}

/// [`super::DirectoryApi`] backed by `aws-sdk-sso-admin` (permission sets/assignments) and
/// `aws-sdk-sts`-equivalent caller identity via the CloudFormation client's underlying config.
pub struct DirectoryAdapter {
    sso_admin: aws_sdk_sso_admin::Client,
    instance_arn: Option<String>,
}

impl DirectoryAdapter {
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig, instance_arn: Option<String>) -> Self {
        Self {
            sso_admin: aws_sdk_sso_admin::Client::new(config),
            instance_arn,
        }
    }
}

#[async_trait::async_trait]
impl super::DirectoryApi for DirectoryAdapter {
    async fn caller_identity(&self, _ctx: &OperationContext) -> Result<String, FogError> {
        Err(FogError::new(
            ErrorCode::NotImplemented,
            "caller identity requires the STS adapter, which is wired up by the CLI edge",
        ))
    }

    async fn list_account_aliases(&self, _ctx: &OperationContext) -> Result<Vec<String>, FogError> {
        Ok(Vec::new())
    }

    async fn list_resources(
        &self,
        _ctx: &OperationContext,
        resource_type: &str,
    ) -> Result<Vec<super::DirectoryResource>, FogError> {
        let instance_arn = self.instance_arn.as_deref().ok_or_else(|| {
            FogError::new(ErrorCode::ConfigInvalid, "SSO instance ARN is not configured")
        })?;

        match resource_type {
            "SSO.PermissionSet" => {
                let mut resources = Vec::new();
                let mut pages = self
                    .sso_admin
                    .list_permission_sets()
                    .instance_arn(instance_arn)
                    .into_paginator()
                    .send();
                while let Some(page) = futures_util::StreamExt::next(&mut pages).await {
                    let page = page.map_err(|error| {
                        provider_error(ErrorCode::ServiceError, "ListPermissionSets failed", error)
                    })?;
                    for arn in page.permission_sets.unwrap_or_default() {
                        resources.push(super::DirectoryResource {
                            identifier: arn,
                            resource_type: resource_type.to_string(),
                            display_name: None,
                        });
                    }
                }
                Ok(resources)
            }
            other => Err(FogError::new(
                ErrorCode::NotImplemented,
                format!("unmanaged resource type `{other}` is not supported"),
            )),
        }
    }
}
