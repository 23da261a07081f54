use api_client::{ApiClientError, RemoteError, RpcMethod};
use thiserror::Error;

/// Appended to the message of a listing that fell back to cached photos.
pub const CACHE_NOTICE: &str = "\nDisplaying photos from cache.";

/// Why an operation failed. `Display` is the message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("You are not authenticated.")]
    NotAuthenticated,
    #[error("An internal server error occurred.")]
    ServerInternal,
    #[error("An unknown error occurred.")]
    Unknown,
    #[error("Impossible to connect to the server.")]
    Connection,
    #[error("An error occurred while uploading")]
    Upload,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Could not save local data: {0}")]
    Storage(String),
}

impl ClientError {
    /// Whether the local session must be dropped after this error.
    pub fn forces_sign_out(&self) -> bool {
        matches!(self, ClientError::NotAuthenticated)
    }
}

/// Maps an application error carried in a response to a [`ClientError`].
pub fn classify_remote(method: RpcMethod, error: &RemoteError) -> ClientError {
    tracing::warn!(
        method = method.as_str(),
        code = %error.code,
        details = %error.details,
        "Response has an error code"
    );
    match error.code.as_str() {
        "403" => ClientError::NotAuthenticated,
        "500" => ClientError::ServerInternal,
        _ => ClientError::Unknown,
    }
}

/// Any failure to complete the call is a connectivity problem to the user.
pub fn classify_transport(method: RpcMethod, error: &ApiClientError) -> ClientError {
    tracing::warn!(method = method.as_str(), error = %error, "Call failed");
    ClientError::Connection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(code: &str) -> RemoteError {
        RemoteError { code: code.into(), details: "details".into() }
    }

    #[test]
    fn test_classify_remote_codes() {
        let m = RpcMethod::EditPhoto;
        assert_eq!(classify_remote(m, &remote("403")), ClientError::NotAuthenticated);
        assert_eq!(classify_remote(m, &remote("500")), ClientError::ServerInternal);
        assert_eq!(classify_remote(m, &remote("404")), ClientError::Unknown);
        assert_eq!(classify_remote(m, &remote("oops")), ClientError::Unknown);
    }

    #[test]
    fn test_messages() {
        assert_eq!(ClientError::NotAuthenticated.to_string(), "You are not authenticated.");
        assert_eq!(ClientError::ServerInternal.to_string(), "An internal server error occurred.");
        assert_eq!(ClientError::Unknown.to_string(), "An unknown error occurred.");
        assert_eq!(ClientError::Connection.to_string(), "Impossible to connect to the server.");
        assert_eq!(ClientError::Upload.to_string(), "An error occurred while uploading");
    }

    #[test]
    fn test_only_403_forces_sign_out() {
        assert!(ClientError::NotAuthenticated.forces_sign_out());
        assert!(!ClientError::ServerInternal.forces_sign_out());
        assert!(!ClientError::Connection.forces_sign_out());
    }

    #[test]
    fn test_transport_failures_are_connection_errors() {
        let e = ApiClientError::ServerError { status: 502, body: "bad gateway".into() };
        assert_eq!(classify_transport(RpcMethod::SignIn, &e), ClientError::Connection);
        let e = ApiClientError::DecodeError("eof".into());
        assert_eq!(classify_transport(RpcMethod::PhotoStream, &e), ClientError::Connection);
    }
}
