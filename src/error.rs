// Error type shared by the library modules. The binary wraps these in
// `anyhow` so the driver can attach context to each failing step.

use thiserror::Error;

/// Message the gallery sends back when the finalize call hits an image
/// that is already registered.
pub const FILE_ALREADY_EXISTS: &str = "file already exists";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}: {body}")]
    Status {
        method: String,
        status: u16,
        body: String,
    },

    /// The server answered with `stat="fail"`. `status` is the HTTP status
    /// when the failure came with a non-2xx response.
    #[error("{method} failed with code {code}: {message}")]
    Api {
        method: String,
        status: Option<u16>,
        code: u16,
        message: String,
    },

    #[error("malformed response to {method}: {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("image conversion failed: {0}")]
    Conversion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the conflict the finalize call reports when the image is
    /// already present in the gallery.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::Api {
                status,
                code,
                message,
                ..
            } => (*code == 500 || *status == Some(500)) && message == FILE_ALREADY_EXISTS,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: Option<u16>, code: u16, message: &str) -> Error {
        Error::Api {
            method: "pwg.images.add".into(),
            status,
            code,
            message: message.into(),
        }
    }

    #[test]
    fn conflict_needs_500_and_exact_message() {
        assert!(api(Some(500), 500, "file already exists").is_already_exists());
        assert!(api(None, 500, "file already exists").is_already_exists());
        assert!(api(Some(500), 999, "file already exists").is_already_exists());
        assert!(!api(Some(500), 500, "Invalid category").is_already_exists());
        assert!(!api(Some(400), 400, "file already exists").is_already_exists());
    }

    #[test]
    fn other_errors_are_not_conflicts() {
        let err = Error::Status {
            method: "pwg.images.add".into(),
            status: 500,
            body: "file already exists".into(),
        };
        assert!(!err.is_already_exists());
        assert!(!Error::CategoryNotFound("x".into()).is_already_exists());
    }
}
