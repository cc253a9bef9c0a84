use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    // Structural errors
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("label {label} is out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },
    #[error("got {images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Dataset errors
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    // File operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl NetworkError {
    pub(crate) fn shape(context: &'static str, expected: &[usize], found: &[usize]) -> Self {
        NetworkError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;
