pub type BoothResult<T> = Result<T, BoothError>;

#[derive(thiserror::Error, Debug)]
pub enum BoothError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("detection error: {0}")]
    Detection(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoothError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }
}
