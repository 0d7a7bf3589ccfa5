use thiserror::Error;

/// Failure surfaced by the capture orchestrator. Always returned after the
/// tool UI has been restored.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture surface unavailable: {0}")]
    Unavailable(String),
}

/// Transport-level failure talking to a privileged capture surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("capture runtime has been invalidated")]
    Invalidated,

    #[error("capture transport failed: {0}")]
    Transport(String),

    #[error("failed to decode captured bitmap: {0}")]
    Decode(#[from] image::ImageError),

    #[error("capture I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SurfaceError> for CaptureError {
    fn from(err: SurfaceError) -> Self {
        CaptureError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read page snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid page snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}
