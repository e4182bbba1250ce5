//! Error types for batch runs

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a batch before any asset is processed
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source directory not found: {}", .0.display())]
    SourceDirectoryNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
