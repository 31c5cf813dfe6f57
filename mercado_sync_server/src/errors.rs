use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use mercado_sync_engine::{SyncError, VaultError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The webhook signature header is missing.")]
    MissingSignature,
    #[error("The webhook signature does not match the payload.")]
    InvalidSignature,
    #[error("The marketplace could not complete the request. {0}")]
    UpstreamError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::UNAUTHORIZED,
                AuthError::InvalidInternalSecret => StatusCode::FORBIDDEN,
                AuthError::OrganizationMismatch => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::MissingSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No API key or internal secret was provided.")]
    MissingCredentials,
    #[error("The API key is not recognized.")]
    InvalidApiKey,
    #[error("The internal service secret does not match.")]
    InvalidInternalSecret,
    #[error("The API key does not belong to the requested organization.")]
    OrganizationMismatch,
}

impl From<SyncError> for ServerError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NoActiveIntegration(_) |
            SyncError::UnknownSeller(_) |
            SyncError::ShipmentWithoutOrder(_) => Self::NoRecordFound(e.to_string()),
            SyncError::VaultError(VaultError::IntegrationNotFound(_)) => Self::NoRecordFound(e.to_string()),
            SyncError::VaultError(VaultError::RefreshFailure { .. }) => Self::UpstreamError(e.to_string()),
            SyncError::QueryError(_) => Self::UpstreamError(e.to_string()),
            SyncError::MissingSellerAccount(_) | SyncError::MalformedOrder(_) => {
                Self::BackendError(e.to_string())
            },
            SyncError::VaultError(_) | SyncError::StorageError(_) => Self::BackendError(e.to_string()),
        }
    }
}
