//! Error types and service error classification.

use azure_core::error::ErrorKind;
use thiserror::Error;

/// Service error codes the scenarios inspect.
///
/// Storage services report these in the `x-ms-error-code` header; Cosmos DB
/// and Service Bus only report a status, which maps to [`ErrorCode::Conflict`]
/// and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // General errors
    AuthenticationFailed,
    AuthorizationFailure,
    Conflict,
    InternalError,
    InvalidResourceName,
    OperationTimedOut,
    ResourceAlreadyExists,
    ResourceNotFound,
    ServerBusy,

    // Blob-specific errors
    BlobNotFound,
    ContainerAlreadyExists,
    ContainerBeingDeleted,
    ContainerNotFound,

    // Queue-specific errors
    MessageNotFound,
    PopReceiptMismatch,
    QueueAlreadyExists,
    QueueBeingDeleted,
    QueueNotFound,

    // Table-specific errors
    EntityAlreadyExists,
    TableAlreadyExists,
    TableBeingDeleted,
    TableNotFound,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AuthenticationFailed",
            ErrorCode::AuthorizationFailure => "AuthorizationFailure",
            ErrorCode::Conflict => "Conflict",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::InvalidResourceName => "InvalidResourceName",
            ErrorCode::OperationTimedOut => "OperationTimedOut",
            ErrorCode::ResourceAlreadyExists => "ResourceAlreadyExists",
            ErrorCode::ResourceNotFound => "ResourceNotFound",
            ErrorCode::ServerBusy => "ServerBusy",
            ErrorCode::BlobNotFound => "BlobNotFound",
            ErrorCode::ContainerAlreadyExists => "ContainerAlreadyExists",
            ErrorCode::ContainerBeingDeleted => "ContainerBeingDeleted",
            ErrorCode::ContainerNotFound => "ContainerNotFound",
            ErrorCode::MessageNotFound => "MessageNotFound",
            ErrorCode::PopReceiptMismatch => "PopReceiptMismatch",
            ErrorCode::QueueAlreadyExists => "QueueAlreadyExists",
            ErrorCode::QueueBeingDeleted => "QueueBeingDeleted",
            ErrorCode::QueueNotFound => "QueueNotFound",
            ErrorCode::EntityAlreadyExists => "EntityAlreadyExists",
            ErrorCode::TableAlreadyExists => "TableAlreadyExists",
            ErrorCode::TableBeingDeleted => "TableBeingDeleted",
            ErrorCode::TableNotFound => "TableNotFound",
        }
    }

    /// Parses an error code reported by a service. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = match code {
            "AuthenticationFailed" => ErrorCode::AuthenticationFailed,
            "AuthorizationFailure" => ErrorCode::AuthorizationFailure,
            "Conflict" => ErrorCode::Conflict,
            "InternalError" => ErrorCode::InternalError,
            "InvalidResourceName" => ErrorCode::InvalidResourceName,
            "OperationTimedOut" => ErrorCode::OperationTimedOut,
            "ResourceAlreadyExists" => ErrorCode::ResourceAlreadyExists,
            "ResourceNotFound" => ErrorCode::ResourceNotFound,
            "ServerBusy" => ErrorCode::ServerBusy,
            "BlobNotFound" => ErrorCode::BlobNotFound,
            "ContainerAlreadyExists" => ErrorCode::ContainerAlreadyExists,
            "ContainerBeingDeleted" => ErrorCode::ContainerBeingDeleted,
            "ContainerNotFound" => ErrorCode::ContainerNotFound,
            "MessageNotFound" => ErrorCode::MessageNotFound,
            "PopReceiptMismatch" => ErrorCode::PopReceiptMismatch,
            "QueueAlreadyExists" => ErrorCode::QueueAlreadyExists,
            "QueueBeingDeleted" => ErrorCode::QueueBeingDeleted,
            "QueueNotFound" => ErrorCode::QueueNotFound,
            "EntityAlreadyExists" => ErrorCode::EntityAlreadyExists,
            "TableAlreadyExists" => ErrorCode::TableAlreadyExists,
            "TableBeingDeleted" => ErrorCode::TableBeingDeleted,
            "TableNotFound" => ErrorCode::TableNotFound,
            _ => return None,
        };
        Some(code)
    }

    /// Returns the HTTP status code the service answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidResourceName | ErrorCode::PopReceiptMismatch => 400,

            ErrorCode::AuthenticationFailed => 401,

            ErrorCode::AuthorizationFailure => 403,

            ErrorCode::BlobNotFound
            | ErrorCode::ContainerNotFound
            | ErrorCode::MessageNotFound
            | ErrorCode::QueueNotFound
            | ErrorCode::ResourceNotFound
            | ErrorCode::TableNotFound => 404,

            ErrorCode::Conflict
            | ErrorCode::ContainerAlreadyExists
            | ErrorCode::ContainerBeingDeleted
            | ErrorCode::EntityAlreadyExists
            | ErrorCode::QueueAlreadyExists
            | ErrorCode::QueueBeingDeleted
            | ErrorCode::ResourceAlreadyExists
            | ErrorCode::TableAlreadyExists
            | ErrorCode::TableBeingDeleted => 409,

            ErrorCode::InternalError | ErrorCode::OperationTimedOut => 500,

            ErrorCode::ServerBusy => 503,
        }
    }

    /// Returns true for the codes a create call reports when the resource is
    /// already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            ErrorCode::ContainerAlreadyExists
                | ErrorCode::QueueAlreadyExists
                | ErrorCode::TableAlreadyExists
                | ErrorCode::EntityAlreadyExists
                | ErrorCode::ResourceAlreadyExists
        )
    }
}

/// A failed service call: the HTTP status plus the service error code, if any.
#[derive(Debug, Clone, Error)]
#[error("HTTP {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct ServiceFailure {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

impl ServiceFailure {
    /// Creates a failure with the given status and code.
    pub fn new(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Returns the parsed error code, if the service reported a known one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.code.as_deref().and_then(ErrorCode::from_code)
    }

    /// Returns true if the failure is a 409 Conflict, either by status or by
    /// a code the service answers with 409.
    pub fn is_conflict(&self) -> bool {
        self.status == 409 || self.error_code().is_some_and(|code| code.status_code() == 409)
    }

    /// Returns true if the failure reports one of the "already exists" codes.
    pub fn is_already_exists(&self) -> bool {
        self.error_code().is_some_and(|code| code.is_already_exists())
    }

    /// Returns true if the failure carries exactly `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code.as_deref() == Some(code.as_str())
    }
}

/// Errors produced by the smoke scenarios.
#[derive(Debug, Error)]
pub enum Error {
    #[error("service call failed: {0}")]
    Service(ServiceFailure),

    #[error("SDK error: {0}")]
    Sdk(azure_core::Error),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue poller failed: {0}")]
    Poller(String),

    #[error("service bus error: {0}")]
    ServiceBus(String),

    #[error("unexpected result: {0}")]
    Mismatch(String),
}

impl Error {
    /// Returns the service failure behind this error, if any.
    pub fn service_failure(&self) -> Option<&ServiceFailure> {
        match self {
            Error::Service(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns true if the error is a 409 Conflict from a service.
    pub fn is_conflict(&self) -> bool {
        self.service_failure().is_some_and(ServiceFailure::is_conflict)
    }

    /// Returns true if the error reports that the resource already exists.
    pub fn is_already_exists(&self) -> bool {
        self.service_failure()
            .is_some_and(ServiceFailure::is_already_exists)
    }

    /// Returns true if the error carries exactly `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.service_failure().is_some_and(|f| f.has_code(code))
    }
}

impl From<azure_core::Error> for Error {
    fn from(err: azure_core::Error) -> Self {
        let response = match err.kind() {
            ErrorKind::HttpResponse { status, error_code } => {
                Some((u16::from(*status), error_code.clone()))
            }
            _ => None,
        };

        match response {
            Some((status, code)) => Error::Service(ServiceFailure {
                status,
                code,
                message: err.to_string(),
            }),
            None => Error::Sdk(err),
        }
    }
}

/// Result type alias for scenario operations.
pub type Result<T> = std::result::Result<T, Error>;
