//! Validation Core: a short-lived rule accumulator bound to a named operation.
//!
//! spec.md §4.K names six primitives, each recording a [`FogError`] into the shared
//! [`ErrorAggregator`] (4.A) rather than failing fast, so a single validation pass can report
//! every problem it finds. `build()` collapses the pass into `Ok(())`, a single error, or a
//! `ValidationFailed` error wrapping a `MultiError`, following the same collapse [`crate::params`]
//! uses for parameter validation.

use crate::error::{Aggregated, ErrorAggregator, ErrorCode, FogError};

/// A validation run bound to an operation name (e.g. `"deploy"`, `"drift"`).
pub struct Validation {
    aggregator: ErrorAggregator,
}

impl Validation {
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self { aggregator: ErrorAggregator::new(operation) }
    }

    /// `field` must be present; fails when `present` is `false`.
    pub fn required_field(&mut self, field: &str, present: bool) -> &mut Self {
        if !present {
            self.aggregator.push(
                FogError::new(ErrorCode::RequiredField, format!("`{field}` is required"))
                    .with_field("field", field.to_string()),
            );
        }
        self
    }

    /// `field` was supplied but `value` doesn't satisfy `reason`'s constraint.
    pub fn invalid_value(&mut self, field: &str, value: &str, reason: &str) -> &mut Self {
        self.aggregator.push(
            FogError::new(ErrorCode::InvalidValue, format!("`{field}` has an invalid value `{value}`: {reason}"))
                .with_field("field", field.to_string())
                .with_field("value", value.to_string()),
        );
        self
    }

    /// More than one of a mutually-exclusive set of flags was supplied.
    pub fn conflicting_flags(&mut self, flags: &[&str]) -> &mut Self {
        if flags.len() > 1 {
            self.aggregator.push(
                FogError::new(ErrorCode::ConflictingFlags, format!("conflicting flags: {}", flags.join(", ")))
                    .with_field("flags", flags.join(",")),
            );
        }
        self
    }

    /// `trigger` was supplied but none of `required` were, when at least one of `required` must
    /// accompany it.
    pub fn missing_dependency(&mut self, trigger: &str, required: &[&str], satisfied: bool) -> &mut Self {
        if !satisfied {
            self.aggregator.push(
                FogError::new(
                    ErrorCode::DependencyMissing,
                    format!("`{trigger}` requires one of: {}", required.join(", ")),
                )
                .with_field("trigger", trigger.to_string())
                .with_field("required", required.join(",")),
            );
        }
        self
    }

    /// `path` was supplied for `field` but doesn't exist on disk.
    pub fn file_not_found(&mut self, field: &str, path: &str, exists: bool) -> &mut Self {
        if !exists {
            self.aggregator.push(
                FogError::new(ErrorCode::FileNotFound, format!("`{field}` points to a missing file: {path}"))
                    .with_field("field", field.to_string())
                    .with_field("path", path.to_string()),
            );
        }
        self
    }

    /// `value` for `field` doesn't parse as `expected`.
    pub fn invalid_format(&mut self, field: &str, value: &str, expected: &str) -> &mut Self {
        self.aggregator.push(
            FogError::new(ErrorCode::InvalidFormat, format!("`{field}` value `{value}` isn't valid {expected}"))
                .with_field("field", field.to_string())
                .with_field("value", value.to_string()),
        );
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregator.is_empty()
    }

    /// Collapse the accumulated rule failures: `Ok(())` if none fired, the lone error if exactly
    /// one fired, or a `ValidationFailed` error wrapping a `MultiError` if more than one did.
    pub fn build(self) -> Result<(), FogError> {
        match self.aggregator.finish() {
            None => Ok(()),
            Some(Aggregated::Single(error)) => Err(error),
            Some(Aggregated::Multi(multi)) => {
                Err(FogError::new(ErrorCode::ValidationFailed, format!("validation failed with {} errors", multi.errors().len()))
                    .with_cause(multi))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn clean_run_builds_ok() {
        let mut validation = Validation::new("deploy");
        validation.required_field("StackName", true);
        assert!(validation.build().is_ok());
    }

    #[test]
    fn single_failure_surfaces_its_own_code() {
        let mut validation = Validation::new("deploy");
        validation.required_field("StackName", false);
        let error = validation.build().unwrap_err();
        assert_eq!(error.code(), ErrorCode::RequiredField);
    }

    #[test]
    fn multiple_failures_collapse_to_validation_failed() {
        let mut validation = Validation::new("deploy");
        validation.required_field("StackName", false);
        validation.conflicting_flags(&["--dry-run", "--create-changeset"]);
        let error = validation.build().unwrap_err();
        assert_eq!(error.code(), ErrorCode::ValidationFailed);
        assert_eq!(error.category(), ErrorCategory::Validation);
    }
}
