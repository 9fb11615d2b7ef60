use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an import run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("manifest {path} is addressed by an invalid digest: {digest}")]
    InvalidManifestDigest { path: String, digest: String },

    #[error("archive read error: {0}")]
    ArchiveRead(#[from] std::io::Error),

    #[error("malformed manifest {path}: {source}")]
    MalformedManifest {
        path: String,
        #[source]
        source: ManifestError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("invalid manifest json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is neither an image manifest nor an image index")]
    Invalid,
}

/// Failure of a single blob or manifest operation.
///
/// These never abort a run; they are recorded in the
/// [`ImportReport`](crate::ImportReport) and the run moves on to the next item.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    #[error("blob upload failed: {0}")]
    BlobUpload(String),

    #[error("blob mount from {from} failed: {reason}")]
    BlobMount { from: String, reason: String },

    #[error("manifest decode failed: {0}")]
    ManifestDecode(String),

    #[error("manifest submission failed: {0}")]
    ManifestSubmission(String),
}
