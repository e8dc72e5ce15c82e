use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown agent '{name}'. Available: {}", available.join(", "))]
    UnknownAgent {
        name: String,
        available: Vec<String>,
    },

    #[error("Transfer depth limit of {0} exceeded")]
    TransferDepth(usize),

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
