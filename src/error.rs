//! The structured error core.
//!
//! Every error that crosses a component boundary in this crate is a [`FogError`]. It carries a
//! fixed `code` from which `category`, `severity`, and `retryable` are derived (see
//! [`ErrorCode::meta`]), plus a human message, an optional user-facing message, suggestions, a
//! structured field map, the ambient [`ErrorContext`] active when it was raised, and an optional
//! wrapped cause.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
};

use colored::Colorize;

tokio::task_local! {
    static CONTEXT: RefCell<ErrorContext>;
}

/// Run `f` with `context` folded into any [`FogError`] constructed during its execution.
///
/// Nested calls layer: fields left unset by an inner context fall back to the enclosing one.
pub async fn with_context<F, Fut, T>(context: ErrorContext, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let merged = current_context().merge(context);
    CONTEXT.scope(RefCell::new(merged), f()).await
}

fn current_context() -> ErrorContext {
    CONTEXT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_default()
}

/// Ambient context folded automatically into every [`FogError`] raised within its scope.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub component: Option<String>,
    pub stack_name: Option<String>,
    pub template_path: Option<String>,
    pub region: Option<String>,
    pub account: Option<String>,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl ErrorContext {
    /// Start a new, empty context for a named operation.
    #[must_use]
    pub fn for_operation(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = Some(stack_name.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            operation: other.operation.or(self.operation),
            component: other.component.or(self.component),
            stack_name: other.stack_name.or(self.stack_name),
            template_path: other.template_path.or(self.template_path),
            region: other.region.or(self.region),
            account: other.account.or(self.account),
            request_id: other.request_id.or(self.request_id),
            correlation_id: other.correlation_id.or(self.correlation_id),
        }
    }

    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        macro_rules! push {
            ($label:literal, $field:expr) => {
                if let Some(value) = &$field {
                    parts.push(format!("{}={}", $label, value));
                }
            };
        }
        push!("operation", self.operation);
        push!("component", self.component);
        push!("stack", self.stack_name);
        push!("template", self.template_path);
        push!("region", self.region);
        push!("account", self.account);
        push!("request_id", self.request_id);
        push!("correlation_id", self.correlation_id);
        write!(f, "{}", parts.join(" "))
    }
}

/// The category of an error, used for exit-code mapping and severity aggregation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display)]
#[display(style = "Title Case")]
pub enum ErrorCategory {
    Validation,
    Configuration,
    FileSystem,
    Template,
    Provider,
    Network,
    Resource,
    Internal,
}

/// The severity of an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, parse_display::Display)]
#[display(style = "UPPERCASE")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A fixed error code identifying the precise failure.
///
/// `category`/`severity`/`retryable` are derived from the code via [`ErrorCode::meta`] — this
/// mapping is the single source of truth, per the Error Core's contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display)]
#[display(style = "SNAKE_CASE")]
#[allow(clippy::enum_variant_names)]
pub enum ErrorCode {
    // Validation
    RequiredField,
    InvalidValue,
    InvalidFormat,
    ConflictingFlags,
    DependencyMissing,
    ValidationFailed,
    // Configuration
    ConfigNotFound,
    ConfigInvalid,
    ConfigPermission,
    MissingCredentials,
    InvalidCredentials,
    // FileSystem
    FileNotFound,
    FilePermission,
    FileInvalid,
    DirectoryNotFound,
    DirectoryPermission,
    // Template
    TemplateNotFound,
    TemplateInvalid,
    TemplateTooLarge,
    TemplateUploadFailed,
    ParameterInvalid,
    ParameterMissing,
    // Provider
    AuthenticationError,
    PermissionError,
    RateLimit,
    ServiceError,
    RegionInvalid,
    StackNotFound,
    StackInvalidState,
    ChangesetFailed,
    DeploymentFailed,
    DriftDetectionFailed,
    // Network
    Timeout,
    Connection,
    Unreachable,
    // Resource
    NotFound,
    Conflict,
    Limit,
    Locked,
    // Internal
    Internal,
    NotImplemented,
    MultipleErrors,
    // Operation
    Cancelled,
}

impl ErrorCode {
    /// The fixed `(category, severity, retryable)` mapping for this code.
    #[must_use]
    pub fn meta(self) -> (ErrorCategory, ErrorSeverity, bool) {
        use ErrorCategory::{
            Configuration, FileSystem, Internal, Network, Provider, Resource, Template, Validation,
        };
        use ErrorSeverity::{Critical, High, Low, Medium};

        match self {
            Self::RequiredField | Self::InvalidValue | Self::InvalidFormat => {
                (Validation, Low, false)
            }
            Self::ConflictingFlags | Self::DependencyMissing => (Validation, Medium, false),
            Self::ValidationFailed => (Validation, Medium, false),

            Self::ConfigNotFound | Self::ConfigInvalid => (Configuration, Medium, false),
            Self::ConfigPermission => (Configuration, High, false),
            Self::MissingCredentials | Self::InvalidCredentials => (Configuration, Critical, false),

            Self::FileNotFound | Self::DirectoryNotFound => (FileSystem, Medium, false),
            Self::FilePermission | Self::DirectoryPermission => (FileSystem, High, false),
            Self::FileInvalid => (FileSystem, Medium, false),

            Self::TemplateNotFound | Self::ParameterMissing => (Template, Medium, false),
            Self::TemplateInvalid | Self::ParameterInvalid => (Template, Medium, false),
            Self::TemplateTooLarge => (Template, Low, false),
            Self::TemplateUploadFailed => (Template, High, true),

            Self::AuthenticationError | Self::PermissionError => (Provider, Critical, false),
            Self::RateLimit | Self::ServiceError => (Provider, Medium, true),
            Self::RegionInvalid => (Provider, Medium, false),
            Self::StackNotFound => (Provider, Medium, false),
            Self::StackInvalidState => (Provider, High, false),
            Self::ChangesetFailed | Self::DeploymentFailed => (Provider, High, false),
            Self::DriftDetectionFailed => (Provider, High, true),

            Self::Timeout | Self::Connection => (Network, Medium, true),
            Self::Unreachable => (Network, High, true),

            Self::NotFound => (Resource, Medium, false),
            Self::Conflict => (Resource, Medium, false),
            Self::Limit => (Resource, High, false),
            Self::Locked => (Resource, Medium, true),

            Self::Internal => (Internal, Critical, false),
            Self::NotImplemented => (Internal, Low, false),
            Self::MultipleErrors => (Internal, Critical, false),

            Self::Cancelled => (Internal, Low, false),
        }
    }
}

/// A structured error value.
///
/// Constructing a `FogError` never panics and never fails; it only allocates.
pub struct FogError {
    code: ErrorCode,
    message: String,
    user_message: Option<String>,
    suggestions: Vec<String>,
    fields: BTreeMap<String, String>,
    context: ErrorContext,
    backtrace: std::backtrace::Backtrace,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl FogError {
    /// Construct a new error with the given code and developer-facing message.
    ///
    /// The ambient [`ErrorContext`] (see [`with_context`]) is captured automatically.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: None,
            suggestions: Vec::new(),
            fields: BTreeMap::new(),
            context: current_context(),
            backtrace: std::backtrace::Backtrace::capture(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.meta().0
    }

    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        self.code.meta().1
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        self.code.meta().2
    }

    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Render the severity-tagged, user-facing error block described by the Error Handling
    /// Design: a user message, suggestions, and — only in verbose mode — context, cause chain,
    /// and stack trace.
    #[must_use]
    pub fn render(&self, verbose: bool) -> String {
        use fmt::Write;

        let mut out = String::new();
        let tag = match self.severity() {
            ErrorSeverity::Critical => "CRITICAL".red().bold(),
            ErrorSeverity::High => "HIGH".red(),
            ErrorSeverity::Medium => "MEDIUM".yellow(),
            ErrorSeverity::Low => "LOW".normal(),
        };
        let _ = writeln!(out, "[{}] {}", tag, self.user_message());
        if !self.suggestions.is_empty() {
            let _ = writeln!(out, "\nSuggestions:");
            for suggestion in &self.suggestions {
                let _ = writeln!(out, "  - {suggestion}");
            }
        }
        if verbose {
            if !self.context.is_empty() {
                let _ = writeln!(out, "\nContext: {}", self.context);
            }
            let _ = writeln!(out, "\nCause chain: {}", self.message);
            let chain = std::iter::successors(
                self.cause.as_deref().map(|c| c as &(dyn std::error::Error)),
                |error| error.source(),
            );
            for cause in chain {
                let _ = writeln!(out, "  caused by: {cause}");
            }
            let _ = writeln!(out, "\n{}", self.backtrace);
        }
        out
    }

    fn user_message(&self) -> &str {
        self.user_message.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Debug for FogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FogError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("context", &self.context)
            .finish()
    }
}

impl fmt::Display for FogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.code, self.category(), self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// An aggregate of more than one [`FogError`] raised in the same operation.
///
/// The aggregate's category is that of its highest-severity member.
pub struct MultiError {
    errors: Vec<FogError>,
}

impl MultiError {
    #[must_use]
    pub fn errors(&self) -> &[FogError] {
        &self.errors
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.errors
            .iter()
            .max_by_key(|error| error.severity())
            .map(FogError::category)
            .unwrap_or(ErrorCategory::Internal)
    }

    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        self.errors
            .iter()
            .map(FogError::severity)
            .max()
            .unwrap_or(ErrorSeverity::Low)
    }

    /// Whether any member error has the given code.
    #[must_use]
    pub fn contains_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|error| error.code() == code)
    }
}

impl fmt::Debug for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.errors.iter().map(FogError::to_string)).finish()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            writeln!(f, "{}. {}", index + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Either a single error, or an aggregate of several, produced by an [`ErrorAggregator`].
#[derive(Debug)]
pub enum Aggregated {
    Single(FogError),
    Multi(MultiError),
}

impl Aggregated {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Single(error) => error.category(),
            Self::Multi(multi) => multi.category(),
        }
    }
}

impl fmt::Display for Aggregated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(error) => error.fmt(f),
            Self::Multi(multi) => multi.fmt(f),
        }
    }
}

impl std::error::Error for Aggregated {}

/// Accumulates [`FogError`]s raised during a named operation.
///
/// This never panics. Calling [`finish`](Self::finish) on an empty aggregator returns `None`; on
/// one error it returns `Some(Aggregated::Single(_))`; on more than one, `Some(Aggregated::Multi(_))`.
pub struct ErrorAggregator {
    operation: String,
    errors: Vec<FogError>,
}

impl ErrorAggregator {
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, error: FogError) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    #[must_use]
    pub fn finish(mut self) -> Option<Aggregated> {
        match self.errors.len() {
            0 => None,
            1 => Some(Aggregated::Single(self.errors.remove(0))),
            _ => Some(Aggregated::Multi(MultiError {
                errors: self.errors,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_mapping_is_fixed() {
        assert_eq!(
            ErrorCode::ChangesetFailed.meta(),
            (ErrorCategory::Provider, ErrorSeverity::High, false)
        );
        assert_eq!(
            ErrorCode::Timeout.meta(),
            (ErrorCategory::Network, ErrorSeverity::Medium, true)
        );
    }

    #[test]
    fn aggregator_empty_is_none() {
        let aggregator = ErrorAggregator::new("deploy");
        assert!(aggregator.finish().is_none());
    }

    #[test]
    fn aggregator_single_is_single() {
        let mut aggregator = ErrorAggregator::new("deploy");
        aggregator.push(FogError::new(ErrorCode::RequiredField, "stack-name is required"));
        assert!(matches!(aggregator.finish(), Some(Aggregated::Single(_))));
    }

    #[test]
    fn aggregator_multi_category_is_max_severity() {
        let mut aggregator = ErrorAggregator::new("deploy");
        aggregator.push(FogError::new(ErrorCode::RequiredField, "a"));
        aggregator.push(FogError::new(ErrorCode::MissingCredentials, "b"));
        let Some(Aggregated::Multi(multi)) = aggregator.finish() else {
            panic!("expected multi");
        };
        assert_eq!(multi.category(), ErrorCategory::Configuration);
        assert_eq!(multi.severity(), ErrorSeverity::Critical);
    }

    #[tokio::test]
    async fn context_is_captured_ambiently() {
        let context = ErrorContext::for_operation("deploy").with_stack_name("vpc-a");
        with_context(context.clone(), || async {
            let error = FogError::new(ErrorCode::StackInvalidState, "bad state");
            assert_eq!(error.context().stack_name.as_deref(), Some("vpc-a"));
        })
        .await;
    }
}
