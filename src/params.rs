//! Parameter & Tag Resolver: ordered-file-merge semantics for stack parameters and tags.
//!
//! Tag merging lives in [`crate::tag::merge_tags`]; this module covers parameters and the
//! template-parameter validation pass, following the same left-to-right override idiom.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorAggregator, ErrorCode, FogError};

/// A single parameter record as read from a parameter file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterRecord {
    pub parameter_key: String,
    pub parameter_value: Option<String>,
    pub use_previous_value: Option<bool>,
}

/// Merge ordered parameter files left-to-right (later values override earlier ones for the same
/// key), and return a deterministic list sorted by key.
#[must_use]
pub fn load_parameters(ordered: &[Vec<ParameterRecord>]) -> Vec<ParameterRecord> {
    let mut merged: BTreeMap<String, ParameterRecord> = BTreeMap::new();
    for file in ordered {
        for record in file {
            merged.insert(record.parameter_key.clone(), record.clone());
        }
    }
    merged.into_values().collect()
}

/// A template parameter declaration, as extracted from the `Parameters` section.
#[derive(Clone, Debug)]
pub struct TemplateParameter {
    pub name: String,
    pub has_default: bool,
}

/// Validate that every required template parameter is satisfied (present, marked
/// `UsePreviousValue` on an update, or has a template default) and that no unknown parameter keys
/// were supplied.
pub fn validate_parameters(
    parameters: &[ParameterRecord],
    template_parameters: &[TemplateParameter],
    is_update: bool,
) -> Result<(), FogError> {
    let mut aggregator = ErrorAggregator::new("ValidateParameters");

    let supplied: BTreeMap<&str, &ParameterRecord> = parameters
        .iter()
        .map(|p| (p.parameter_key.as_str(), p))
        .collect();
    let declared: BTreeSet<&str> = template_parameters.iter().map(|p| p.name.as_str()).collect();

    for template_param in template_parameters {
        let satisfied = match supplied.get(template_param.name.as_str()) {
            Some(record) => {
                record.parameter_value.is_some()
                    || (is_update && record.use_previous_value == Some(true))
            }
            None => template_param.has_default,
        };
        if !satisfied {
            aggregator.push(
                FogError::new(
                    ErrorCode::ParameterMissing,
                    format!("template parameter `{}` was not supplied", template_param.name),
                )
                .with_field("parameter", template_param.name.clone()),
            );
        }
    }

    for key in supplied.keys() {
        if !declared.contains(key) {
            aggregator.push(
                FogError::new(ErrorCode::ParameterInvalid, format!("unknown parameter `{key}`"))
                    .with_field("parameter", (*key).to_string()),
            );
        }
    }

    match aggregator.finish() {
        None => Ok(()),
        Some(aggregated) => Err(match aggregated {
            crate::error::Aggregated::Single(error) => error,
            crate::error::Aggregated::Multi(multi) => FogError::new(
                ErrorCode::ValidationFailed,
                "parameter validation failed",
            )
            .with_cause(multi),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, value: &str) -> ParameterRecord {
        ParameterRecord {
            parameter_key: key.to_string(),
            parameter_value: Some(value.to_string()),
            use_previous_value: None,
        }
    }

    #[test]
    fn load_parameters_overrides_left_to_right_and_sorts_by_key() {
        let a = vec![record("CidrBlock", "10.0.0.0/16"), record("Zeta", "1")];
        let b = vec![record("CidrBlock", "10.1.0.0/16")];

        let merged = load_parameters(&[a, b]);
        assert_eq!(
            merged.iter().map(|p| p.parameter_key.as_str()).collect::<Vec<_>>(),
            vec!["CidrBlock", "Zeta"]
        );
        assert_eq!(merged[0].parameter_value.as_deref(), Some("10.1.0.0/16"));
    }

    #[test]
    fn validate_parameters_rejects_unknown_keys() {
        let supplied = vec![record("Unknown", "x")];
        let declared = vec![TemplateParameter { name: "Known".to_string(), has_default: true }];
        let error = validate_parameters(&supplied, &declared, false).unwrap_err();
        assert_eq!(error.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn validate_parameters_allows_use_previous_value_on_update() {
        let supplied = vec![ParameterRecord {
            parameter_key: "Known".to_string(),
            parameter_value: None,
            use_previous_value: Some(true),
        }];
        let declared = vec![TemplateParameter { name: "Known".to_string(), has_default: false }];
        assert!(validate_parameters(&supplied, &declared, true).is_ok());
        assert!(validate_parameters(&supplied, &declared, false).is_err());
    }

    #[test]
    fn validate_parameters_allows_template_default_when_omitted() {
        let declared = vec![TemplateParameter { name: "Known".to_string(), has_default: true }];
        assert!(validate_parameters(&[], &declared, false).is_ok());
    }
}
