use thiserror::Error;

/// Library error type for coverflow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The content manifest holds no projects.
    #[error("content manifest lists no projects")]
    EmptyContent,

    /// A texture URL the loader cannot resolve locally.
    #[error("unsupported texture source: {0}")]
    UnsupportedSource(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Texture decode failure.
    #[error(transparent)]
    Decode(#[from] image::ImageError),
}
