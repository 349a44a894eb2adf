use thiserror::Error;

/// Errors raised by a project store while loading or saving a scene payload
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize scene: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project store is offline")]
    Offline,

    #[error("Invalid scene key: {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// A stored payload that cannot be turned into a scene
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Scene payload is not a JSON object")]
    NotAnObject,

    #[error("Malformed {field}: {source}")]
    Malformed {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Undecodable bitmap in {location}: {source}")]
    Bitmap {
        location: String,
        #[source]
        source: BitmapError,
    },
}

/// A stored bitmap that is not valid base64 or not a readable image
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid image: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure reported by the host's upload collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Upload failed: {0}")]
    Failed(String),

    #[error("Upload cancelled")]
    Cancelled,
}

pub type StoreResult<T> = Result<T, StoreError>;
