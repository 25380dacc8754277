pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),

	#[error(transparent)]
	Storage(#[from] quarry_storage::Error),

	#[error(transparent)]
	Service(#[from] quarry_service::Error),
}
