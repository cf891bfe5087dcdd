//! Changeset Analyzer: classify each resource change and flag dangerous operations.
//!
//! Types are ported from `connec-cloudformatious`'s `change_set.rs`, trimmed to what the core
//! needs as a pure projection over an already-described change set (no polling or SDK calls live
//! here — see [`crate::provider::aws::CloudFormationAdapter`] for the SDK boundary).

use std::collections::BTreeMap;

use enumset::EnumSet;

use crate::error::{ErrorCode, FogError};

/// The resource and the action CloudFormation will perform on it if the change set is executed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceChange {
    pub action: Action,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    pub resource_type: String,
    /// Set when this change belongs to a nested change-set module, surfaced in rendered tables.
    pub module_id: Option<String>,
}

impl ResourceChange {
    pub(crate) fn from_sdk(
        change: aws_sdk_cloudformation::types::ResourceChange,
    ) -> Result<Self, FogError> {
        let resource_type = change.resource_type.unwrap_or_default();
        let action = change
            .action
            .ok_or_else(|| FogError::new(ErrorCode::Internal, "ResourceChange without action"))?;
        Ok(Self {
            action: Action::from_sdk(
                &resource_type,
                &action,
                change.details,
                change.replacement,
                change.scope,
            )?,
            logical_resource_id: change.logical_resource_id.unwrap_or_default(),
            physical_resource_id: change.physical_resource_id,
            resource_type,
            module_id: change.module_info.and_then(|info| info.logical_id_hierarchy),
        })
    }

    /// Whether this change is "dangerous" per spec: removal, or a replacement that may or will
    /// happen.
    #[must_use]
    pub fn is_dangerous(&self) -> bool {
        match &self.action {
            Action::Remove => true,
            Action::Modify(detail) => {
                matches!(detail.replacement, Replacement::True | Replacement::Conditional)
            }
            Action::Add | Action::Import | Action::Dynamic => false,
        }
    }
}

/// The action CloudFormation takes on a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Add,
    Modify(ModifyDetail),
    Remove,
    Import,
    Dynamic,
}

impl Action {
    /// A short label for summary tables (`Add`/`Modify`/`Remove`/`Import`/`Dynamic`).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Modify(_) => "Modify",
            Self::Remove => "Remove",
            Self::Import => "Import",
            Self::Dynamic => "Dynamic",
        }
    }

    fn from_sdk(
        resource_type: &str,
        action: &aws_sdk_cloudformation::types::ChangeAction,
        details: Option<Vec<aws_sdk_cloudformation::types::ResourceChangeDetail>>,
        replacement: Option<aws_sdk_cloudformation::types::Replacement>,
        scope: Option<Vec<aws_sdk_cloudformation::types::ResourceAttribute>>,
    ) -> Result<Self, FogError> {
        use aws_sdk_cloudformation::types::ChangeAction;
        match action {
            ChangeAction::Add => Ok(Self::Add),
            ChangeAction::Remove => Ok(Self::Remove),
            ChangeAction::Import => Ok(Self::Import),
            ChangeAction::Dynamic => Ok(Self::Dynamic),
            ChangeAction::Modify => Ok(Self::Modify(ModifyDetail::from_sdk(
                resource_type,
                details.unwrap_or_default(),
                replacement.as_ref(),
                scope.unwrap_or_default(),
            )?)),
            other => Err(FogError::new(
                ErrorCode::Internal,
                format!("ResourceChange with unexpected action {other:?}"),
            )),
        }
    }
}

/// Additional detail for resource modifications.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModifyDetail {
    pub details: Vec<ResourceChangeDetail>,
    pub replacement: Replacement,
    pub scope: EnumSet<ModifyScope>,
}

impl ModifyDetail {
    fn from_sdk(
        resource_type: &str,
        details: Vec<aws_sdk_cloudformation::types::ResourceChangeDetail>,
        replacement: Option<&aws_sdk_cloudformation::types::Replacement>,
        scope: Vec<aws_sdk_cloudformation::types::ResourceAttribute>,
    ) -> Result<Self, FogError> {
        let replacement = replacement
            .map(|r| r.as_str().parse::<Replacement>())
            .transpose()
            .map_err(|_| FogError::new(ErrorCode::Internal, "invalid Replacement value"))?
            .unwrap_or(Replacement::False);
        Ok(Self {
            details: details
                .into_iter()
                .map(|detail| ResourceChangeDetail::from_sdk(resource_type, detail))
                .collect::<Result<_, _>>()?,
            replacement,
            scope: scope
                .into_iter()
                .filter_map(|s| s.as_str().parse::<ModifyScope>().ok())
                .collect(),
        })
    }
}

/// Whether CloudFormation will replace the resource by creating a new one and deleting the old.
#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display, parse_display::FromStr)]
pub enum Replacement {
    True,
    False,
    Conditional,
}

mod modify_scope {
    #![allow(clippy::expl_impl_clone_on_copy)]

    /// Indicates which resource attribute is triggering this update.
    #[derive(Debug, enumset::EnumSetType, parse_display::Display, parse_display::FromStr)]
    #[enumset(no_ops)]
    pub enum ModifyScope {
        Properties,
        Metadata,
        CreationPolicy,
        UpdatePolicy,
        DeletionPolicy,
        Tags,
    }
}
pub use modify_scope::ModifyScope;

/// A single change CloudFormation will make to a resource's attribute.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceChangeDetail {
    pub change_source: Option<ChangeSource>,
    pub evaluation: Evaluation,
    pub target: ResourceTargetDefinition,
}

impl ResourceChangeDetail {
    fn from_sdk(
        resource_type: &str,
        detail: aws_sdk_cloudformation::types::ResourceChangeDetail,
    ) -> Result<Self, FogError> {
        let causing_entity = detail.causing_entity.clone();
        Ok(Self {
            change_source: detail
                .change_source
                .map(|source| ChangeSource::from_sdk(&source, causing_entity)),
            evaluation: detail
                .evaluation
                .map(|e| e.as_str().parse())
                .transpose()
                .map_err(|_| FogError::new(ErrorCode::Internal, "invalid Evaluation value"))?
                .unwrap_or(Evaluation::Static),
            target: detail
                .target
                .map(|target| ResourceTargetDefinition::from_sdk(resource_type, target))
                .transpose()?
                .unwrap_or(ResourceTargetDefinition::Metadata),
        })
    }
}

/// The type of entity that triggered a change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChangeSource {
    ResourceReference(String),
    ParameterReference(String),
    ResourceAttribute(String),
    DirectModification,
    Automatic,
}

impl ChangeSource {
    fn from_sdk(
        change_source: &aws_sdk_cloudformation::types::ChangeSource,
        causing_entity: Option<String>,
    ) -> Self {
        use aws_sdk_cloudformation::types::ChangeSource as SdkSource;
        let entity = causing_entity.unwrap_or_default();
        match change_source {
            SdkSource::ResourceReference => Self::ResourceReference(entity),
            SdkSource::ParameterReference => Self::ParameterReference(entity),
            SdkSource::ResourceAttribute => Self::ResourceAttribute(entity),
            SdkSource::Automatic => Self::Automatic,
            _ => Self::DirectModification,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display, parse_display::FromStr)]
pub enum Evaluation {
    Static,
    Dynamic,
}

/// The field CloudFormation will change, and whether the resource will be recreated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceTargetDefinition {
    Properties {
        name: String,
        requires_recreation: RequiresRecreation,
    },
    Metadata,
    CreationPolicy,
    UpdatePolicy,
    DeletionPolicy,
    Tags,
}

impl ResourceTargetDefinition {
    fn from_sdk(
        _resource_type: &str,
        target: aws_sdk_cloudformation::types::ResourceTargetDefinition,
    ) -> Result<Self, FogError> {
        use aws_sdk_cloudformation::types::ResourceAttribute;
        let attribute = target
            .attribute
            .ok_or_else(|| FogError::new(ErrorCode::Internal, "ResourceTargetDefinition without attribute"))?;
        Ok(match attribute {
            ResourceAttribute::Properties => Self::Properties {
                name: target.name.unwrap_or_default(),
                requires_recreation: target
                    .requires_recreation
                    .map(|r| r.as_str().parse())
                    .transpose()
                    .map_err(|_| FogError::new(ErrorCode::Internal, "invalid RequiresRecreation value"))?
                    .unwrap_or(RequiresRecreation::Never),
            },
            ResourceAttribute::Metadata => Self::Metadata,
            ResourceAttribute::CreationPolicy => Self::CreationPolicy,
            ResourceAttribute::UpdatePolicy => Self::UpdatePolicy,
            ResourceAttribute::DeletionPolicy => Self::DeletionPolicy,
            ResourceAttribute::Tags => Self::Tags,
            _ => Self::Metadata,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display, parse_display::FromStr)]
pub enum RequiresRecreation {
    Never,
    Conditionally,
    Always,
}

/// Per-action counts over a set of changes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub counts: BTreeMap<&'static str, usize>,
}

/// The subset of changes flagged dangerous, plus the full summary.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    pub summary: Summary,
    pub danger: Vec<ResourceChange>,
}

/// Classify each change and build the summary/danger tables. Pure projection: never mutates or
/// re-fetches the change set.
#[must_use]
pub fn analyze(changes: &[ResourceChange]) -> Analysis {
    let mut summary = Summary::default();
    let mut danger = Vec::new();
    for change in changes {
        *summary.counts.entry(change.action.label()).or_insert(0) += 1;
        if change.is_dangerous() {
            danger.push(change.clone());
        }
    }
    Analysis { summary, danger }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(id: &str) -> ResourceChange {
        ResourceChange {
            action: Action::Add,
            logical_resource_id: id.to_string(),
            physical_resource_id: None,
            resource_type: "AWS::S3::Bucket".to_string(),
            module_id: None,
        }
    }

    fn remove(id: &str) -> ResourceChange {
        ResourceChange {
            action: Action::Remove,
            logical_resource_id: id.to_string(),
            physical_resource_id: Some(format!("{id}-physical")),
            resource_type: "AWS::S3::Bucket".to_string(),
            module_id: None,
        }
    }

    fn modify(id: &str, replacement: Replacement) -> ResourceChange {
        ResourceChange {
            action: Action::Modify(ModifyDetail {
                details: Vec::new(),
                replacement,
                scope: EnumSet::only(ModifyScope::Properties),
            }),
            logical_resource_id: id.to_string(),
            physical_resource_id: Some(format!("{id}-physical")),
            resource_type: "AWS::S3::Bucket".to_string(),
            module_id: None,
        }
    }

    #[test]
    fn danger_flags_remove_and_replacement() {
        let changes = vec![
            add("A"),
            remove("B"),
            modify("C", Replacement::True),
            modify("D", Replacement::Conditional),
            modify("E", Replacement::False),
        ];
        let analysis = analyze(&changes);
        let danger_ids: Vec<_> = analysis
            .danger
            .iter()
            .map(|c| c.logical_resource_id.as_str())
            .collect();
        assert_eq!(danger_ids, vec!["B", "C", "D"]);
    }

    #[test]
    fn summary_counts_by_action_label() {
        let changes = vec![add("A"), add("B"), remove("C")];
        let analysis = analyze(&changes);
        assert_eq!(analysis.summary.counts.get("Add"), Some(&2));
        assert_eq!(analysis.summary.counts.get("Remove"), Some(&1));
    }

    #[test]
    fn module_id_is_surfaced() {
        let mut change = add("A");
        change.module_id = Some("MyModule/Nested".to_string());
        assert_eq!(change.module_id.as_deref(), Some("MyModule/Nested"));
    }
}
