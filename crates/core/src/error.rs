use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum TubetalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session runtime stopped: {reason}")]
    RuntimeStopped { reason: String },
}

pub type Result<T> = std::result::Result<T, TubetalkError>;
