use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("request timed out")]
	Timeout,
	#[error("network error: {0}")]
	Network(String),
	#[error("server responded with status {0}")]
	Status(u16),
	#[error("failed to read document: {0}")]
	Io(#[from] std::io::Error),
}

/// Reasons a single candidate block is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
	#[error("no timestamp found in candidate")]
	NoTimestampFound,
	#[error("unparseable timestamp {raw:?}")]
	UnparseableTimestamp { raw: String },
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Fetch(#[from] FetchError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
