use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read {path:?}.")]
	ReadFile { path: PathBuf, source: std::io::Error },
	#[error("Failed to decode {path:?}.")]
	DecodeFile { path: PathBuf, source: serde_json::Error },
	#[error("Invalid index for topic {topic}: {message}")]
	InvalidIndex { topic: String, message: String },
	#[error("Query vector has {actual} dimensions but topic {topic} is indexed with {expected}.")]
	DimensionMismatch { topic: String, expected: usize, actual: usize },
}
