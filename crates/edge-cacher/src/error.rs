//! Error types for the edge cacher service

use std::fmt;

#[derive(Debug)]
pub enum EdgeError {
    Cache(shard_cache::CacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for EdgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeError::Cache(err) => write!(f, "Cache error: {}", err),
            EdgeError::Io(err) => write!(f, "IO error: {}", err),
            EdgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for EdgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EdgeError::Cache(err) => Some(err),
            EdgeError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<shard_cache::CacheError> for EdgeError {
    fn from(err: shard_cache::CacheError) -> Self {
        EdgeError::Cache(err)
    }
}

impl From<std::io::Error> for EdgeError {
    fn from(err: std::io::Error) -> Self {
        EdgeError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for EdgeError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        EdgeError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EdgeError>;
