//! Hand-built test fakes for the four Provider Abstraction traits.
//!
//! Following the library teacher's preference for fakes over a mocking framework (its
//! `tests/common/mod.rs` drives a real client against a test account); since this crate has no
//! integration-test account to target, these fakes let the Deployment State Machine, Event
//! Watcher and Drift Engine be tested without network access.

use std::sync::Mutex;

use chrono::Utc;

use crate::{
    error::{ErrorCode, FogError},
    events::StackEvent,
    status::{ChangeSetStatus, StackStatus},
    tag::Tag,
};

use super::{
    ChangeSetType, CreateChangeSetRequest, DescribedChangeSet, DirectoryApi, DirectoryResource,
    DriftDetectionId, DriftDetectionOutcome, DriftDetectionStatus, ImportValue, NetworkAclEntry,
    NetworkApi, ObjectStoreApi, OperationContext, Route, StackApi, StackDescription,
    StackResource, TemplateSource,
};

/// An in-memory [`StackApi`] fake, seeded with canned responses and recording every call made
/// against it so tests can assert on call order.
#[derive(Default)]
pub struct MockStackApi {
    pub stacks: Mutex<Vec<StackDescription>>,
    pub resources: Mutex<Vec<StackResource>>,
    pub events: Mutex<Vec<StackEvent>>,
    pub change_sets: Mutex<Vec<DescribedChangeSet>>,
    pub imports: Mutex<Vec<ImportValue>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_next_describe_stack: Mutex<bool>,
}

impl MockStackApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl StackApi for MockStackApi {
    async fn describe_stack(
        &self,
        _ctx: &OperationContext,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, FogError> {
        self.record("describe_stack");
        if std::mem::take(&mut *self.fail_next_describe_stack.lock().unwrap()) {
            return Err(FogError::new(ErrorCode::ServiceError, "simulated DescribeStacks failure"));
        }
        Ok(self
            .stacks
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.stack_name == stack_name)
            .cloned())
    }

    async fn describe_stack_resources(
        &self,
        _ctx: &OperationContext,
        _stack_id: &str,
    ) -> Result<Vec<StackResource>, FogError> {
        self.record("describe_stack_resources");
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn describe_stack_events(
        &self,
        _ctx: &OperationContext,
        _stack_id: &str,
    ) -> Result<Vec<StackEvent>, FogError> {
        self.record("describe_stack_events");
        Ok(self.events.lock().unwrap().clone())
    }

    async fn create_change_set(
        &self,
        _ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<DescribedChangeSet, FogError> {
        self.record("create_change_set");
        Ok(DescribedChangeSet {
            name: request.change_set_name,
            id: "mock-change-set-id".to_string(),
            stack_id: format!("mock-stack-id/{}", request.stack_name),
            status: ChangeSetStatus::CreateComplete,
            status_reason: None,
            creation_time: Utc::now(),
            changes: Vec::new(),
        })
    }

    async fn describe_change_set(
        &self,
        _ctx: &OperationContext,
        change_set_id: &str,
    ) -> Result<DescribedChangeSet, FogError> {
        self.record("describe_change_set");
        self.change_sets
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == change_set_id)
            .cloned()
            .ok_or_else(|| FogError::new(ErrorCode::NotFound, "no such change set"))
    }

    async fn execute_change_set(
        &self,
        _ctx: &OperationContext,
        _change_set_id: &str,
    ) -> Result<(), FogError> {
        self.record("execute_change_set");
        Ok(())
    }

    async fn delete_change_set(
        &self,
        _ctx: &OperationContext,
        _change_set_id: &str,
    ) -> Result<(), FogError> {
        self.record("delete_change_set");
        Ok(())
    }

    async fn create_stack(
        &self,
        _ctx: &OperationContext,
        request: CreateChangeSetRequest,
    ) -> Result<String, FogError> {
        self.record("create_stack");
        Ok(format!("mock-stack-id/{}", request.stack_name))
    }

    async fn delete_stack(&self, _ctx: &OperationContext, _stack_name: &str) -> Result<(), FogError> {
        self.record("delete_stack");
        Ok(())
    }

    async fn list_imports(
        &self,
        _ctx: &OperationContext,
        export_name: &str,
    ) -> Result<ImportValue, FogError> {
        self.record("list_imports");
        Ok(self
            .imports
            .lock()
            .unwrap()
            .iter()
            .find(|import| import.export_name == export_name)
            .cloned()
            .unwrap_or_else(|| ImportValue {
                export_name: export_name.to_string(),
                physical_value: String::new(),
                importing_stack_ids: Vec::new(),
            }))
    }

    async fn validate_template(
        &self,
        _ctx: &OperationContext,
        _template: &TemplateSource,
    ) -> Result<(), FogError> {
        self.record("validate_template");
        Ok(())
    }

    async fn detect_drift(
        &self,
        _ctx: &OperationContext,
        _stack_name: &str,
    ) -> Result<DriftDetectionId, FogError> {
        self.record("detect_drift");
        Ok(DriftDetectionId("mock-drift-id".to_string()))
    }

    async fn describe_drift_results(
        &self,
        _ctx: &OperationContext,
        _detection_id: &DriftDetectionId,
    ) -> Result<DriftDetectionOutcome, FogError> {
        self.record("describe_drift_results");
        Ok(DriftDetectionOutcome {
            status: DriftDetectionStatus::Complete,
            resources: Vec::new(),
        })
    }
}

/// An in-memory [`ObjectStoreApi`] fake, storing put objects in a map.
#[derive(Default)]
pub struct MockObjectStore {
    pub objects: Mutex<std::collections::BTreeMap<(String, String), Vec<u8>>>,
}

#[async_trait::async_trait]
impl ObjectStoreApi for MockObjectStore {
    async fn put_object(
        &self,
        _ctx: &OperationContext,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), FogError> {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn head_object(
        &self,
        _ctx: &OperationContext,
        bucket: &str,
        key: &str,
    ) -> Result<bool, FogError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }
}

/// An in-memory [`NetworkApi`] fake.
#[derive(Default)]
pub struct MockNetworkApi {
    pub routes: Mutex<Vec<Route>>,
    pub network_acl_entries: Mutex<Vec<NetworkAclEntry>>,
    pub prefix_list_cidrs: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl NetworkApi for MockNetworkApi {
    async fn describe_route_tables(
        &self,
        _ctx: &OperationContext,
        _route_table_id: &str,
    ) -> Result<Vec<Route>, FogError> {
        Ok(self.routes.lock().unwrap().clone())
    }

    async fn describe_network_acls(
        &self,
        _ctx: &OperationContext,
        _network_acl_id: &str,
    ) -> Result<Vec<NetworkAclEntry>, FogError> {
        Ok(self.network_acl_entries.lock().unwrap().clone())
    }

    async fn describe_managed_prefix_list_cidrs(
        &self,
        _ctx: &OperationContext,
        _prefix_list_id: &str,
    ) -> Result<Vec<String>, FogError> {
        Ok(self.prefix_list_cidrs.lock().unwrap().clone())
    }
}

/// An in-memory [`DirectoryApi`] fake.
#[derive(Default)]
pub struct MockDirectoryApi {
    pub account_id: Mutex<String>,
    pub account_aliases: Mutex<Vec<String>>,
    pub resources: Mutex<Vec<DirectoryResource>>,
}

#[async_trait::async_trait]
impl DirectoryApi for MockDirectoryApi {
    async fn caller_identity(&self, _ctx: &OperationContext) -> Result<String, FogError> {
        Ok(self.account_id.lock().unwrap().clone())
    }

    async fn list_account_aliases(&self, _ctx: &OperationContext) -> Result<Vec<String>, FogError> {
        Ok(self.account_aliases.lock().unwrap().clone())
    }

    async fn list_resources(
        &self,
        _ctx: &OperationContext,
        _resource_type: &str,
    ) -> Result<Vec<DirectoryResource>, FogError> {
        Ok(self.resources.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn describe_stack_returns_seeded_stack() {
        let api = MockStackApi::new();
        api.stacks.lock().unwrap().push(StackDescription {
            stack_id: "id".to_string(),
            stack_name: "my-stack".to_string(),
            stack_status: StackStatus::CreateComplete,
            creation_time: Utc::now(),
            parameters: Vec::new(),
            tags: vec![Tag { key: "Env".to_string(), value: "dev".to_string() }],
        });

        let ctx = OperationContext::new();
        let found = api.describe_stack(&ctx, "my-stack").await.unwrap();
        assert!(found.is_some());
        assert_eq!(api.calls.lock().unwrap().as_slice(), ["describe_stack"]);
    }

    #[tokio::test]
    async fn describe_stack_failure_is_one_shot() {
        let api = MockStackApi::new();
        *api.fail_next_describe_stack.lock().unwrap() = true;
        let ctx = OperationContext::new();

        assert!(api.describe_stack(&ctx, "x").await.is_err());
        assert!(api.describe_stack(&ctx, "x").await.unwrap().is_none());
    }
}
