use thiserror::Error;

/// Errors produced while parsing, building or querying a skeleton.
#[derive(Debug, Error)]
pub enum BvhError {
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("format error: {0}")]
    Format(String),

    #[error("joint '{0}' not found in the hierarchy")]
    NotFound(String),

    #[error("frame {frame} is out of range (frame count {frame_count})")]
    Range { frame: usize, frame_count: usize },

    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("container encoding error: {0}")]
    Container(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, BvhError>;

impl BvhError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        BvhError::Parse {
            line,
            message: message.into(),
        }
    }
}
