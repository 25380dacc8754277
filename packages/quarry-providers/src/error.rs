pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Provider rejected the request with status {status}: {message}")]
	Rejected { status: u16, message: String },
	#[error("Provider failed with status {status}: {message}")]
	Status { status: u16, message: String },
	#[error("Invalid document URL: {message}")]
	InvalidUrl { message: String },
}
impl Error {
	/// Whether the failure concerns the shape of a request or reply rather than the transport.
	///
	/// Callers may retry such failures in a different request mode.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Rejected { .. } | Self::InvalidResponse { .. })
	}
}
