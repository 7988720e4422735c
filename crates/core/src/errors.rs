use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid `{field}`: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("parse failure: {message}")]
    Parse { message: String, raw: String },
    #[error("{resource} `{id}` not found")]
    NotFound { resource: &'static str, id: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("report generation failed: {0}")]
    Report(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), raw: raw.into() }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Stable machine-readable class used by the CLI and HTTP error bodies.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Parse { .. } => "parse",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io",
            Self::Integration(_) => "integration",
            Self::Report(_) => "report",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::UnprocessableReply { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable model reply: {message}")]
    UnprocessableReply { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::UnprocessableReply { .. } => {
                "The risk assessment service returned an unusable answer. Please retry."
            }
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::UnprocessableReply { .. } => 422,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::UnprocessableReply { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::UnprocessableReply { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Validation(_) => Self::BadRequest { message, correlation_id },
            ApplicationError::Parse { .. } => Self::UnprocessableReply { message, correlation_id },
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Integration(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Io { .. }
            | ApplicationError::Report(_)
            | ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}
