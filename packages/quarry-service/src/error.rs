pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unknown topic: {topic}.")]
	UnknownTopic { topic: String },
	#[error("Provider call failed")]
	Provider(#[from] quarry_providers::Error),
	#[error("Storage operation failed")]
	Storage(#[from] quarry_storage::Error),
	#[error("Index search task failed")]
	Search(#[from] tokio::task::JoinError),
	#[error("Failed to encode job record")]
	Record(#[from] serde_json::Error),
	#[error("Job queue is full.")]
	QueueFull,
	#[error("Job runner has shut down.")]
	RunnerClosed,
}
