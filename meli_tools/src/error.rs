use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeliApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl MeliApiError {
    /// True when the upstream rejected the request for authorization reasons. Callers use this to decide whether a
    /// reactive token refresh and a single retry are worth attempting.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, MeliApiError::QueryError { status: 401 | 403, .. })
    }
}
