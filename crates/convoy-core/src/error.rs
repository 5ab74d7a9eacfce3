use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvoyError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConvoyError {
    /// Short machine-readable code, used as the process exit reason in logs.
    pub fn code(&self) -> &'static str {
        match self {
            ConvoyError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvoyError>;
