use thiserror::Error;

/// Failures surfaced by the filesystem engine. None of these terminate the
/// shell; they are printed and the session continues.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("{0}: not a directory")]
    NotADirectory(String),

    #[error("{0}: already exists")]
    AlreadyExists(String),

    #[error("out of space")]
    OutOfSpace,

    #[error("partition {0} is not formatted")]
    InvalidPartition(usize),

    #[error("sector {0} does not exist")]
    InvalidSector(u32),

    #[error("invalid 8.3 name: {0}")]
    InvalidName(String),

    #[error("corrupt image: {0}")]
    CorruptImage(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
