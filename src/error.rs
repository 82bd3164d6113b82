use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrellisError>;

#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("No object registered for {type_name}")]
    UnresolvedDependency { type_name: String },

    #[error("Parameter {position} of {target} carries {count} qualifiers; at most one is allowed")]
    InvalidParameterAnnotation {
        target: String,
        position: usize,
        count: usize,
    },

    #[error("Last argument of {target} cannot be used as {type_name}")]
    LastArgumentMismatch { target: String, type_name: String },

    #[error("Malformed value {value:?} for input '{name}': {reason}")]
    MalformedInput {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Enum constant not found: {value:?} is not a {type_name}")]
    UnknownEnumConstant { type_name: String, value: String },

    #[error("Unsupported input type {type_name} (value: {value:?})")]
    UnsupportedInputType { type_name: String, value: String },

    #[error("Required input '{name}' is missing")]
    MissingInput { name: String },

    #[error("Input '{name}' is a list but declares no separator")]
    MissingSeparator { name: String },

    #[error("Missing attributes: {} in template {template}", .missing.join(", "))]
    MissingAttributes {
        template: String,
        missing: Vec<String>,
    },

    #[error("Embedded task {task} returned unsupported result {kind}")]
    InvalidEmbeddedResult { task: String, kind: String },

    #[error("Task {task} of kind {kind} cannot produce a top-level response")]
    UnknownTaskKind { task: String, kind: String },

    #[error("No task registered as {name}")]
    UnresolvableTask { name: String },

    #[error("Task name {name} is registered twice ({first} and {second})")]
    DuplicateTask {
        name: String,
        first: String,
        second: String,
    },

    #[error("Type {type_name} does not end with the task suffix '{suffix}'")]
    InvalidTaskName { type_name: String, suffix: String },

    #[error("Cannot find template {name}")]
    TemplateNotFound { name: String },

    #[error("Template {name} is malformed: {message}")]
    TemplateSyntax { name: String, message: String },

    #[error("Rendering template {name} failed: {message}")]
    TemplateRender { name: String, message: String },

    #[error("Resource not found: {name}")]
    ResourceNotFound { name: String },

    #[error("Invalid configuration value {value:?} for {key}")]
    InvalidConfig { key: String, value: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrellisError {
    /// Configuration errors are programming mistakes; retrying the request cannot succeed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TrellisError::InvalidParameterAnnotation { .. }
                | TrellisError::LastArgumentMismatch { .. }
                | TrellisError::InvalidEmbeddedResult { .. }
                | TrellisError::UnknownTaskKind { .. }
                | TrellisError::UnresolvableTask { .. }
                | TrellisError::DuplicateTask { .. }
                | TrellisError::InvalidTaskName { .. }
                | TrellisError::TemplateNotFound { .. }
                | TrellisError::TemplateSyntax { .. }
                | TrellisError::MissingSeparator { .. }
                | TrellisError::InvalidConfig { .. }
        )
    }
}

impl axum::response::IntoResponse for TrellisError {
    fn into_response(self) -> axum::response::Response {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}
