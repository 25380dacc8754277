use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read config file {path:?}.")]
	ReadConfig { path: PathBuf, source: std::io::Error },
	#[error("Config file {path:?} is not valid TOML for this service.")]
	ParseConfig { path: PathBuf, source: toml::de::Error },
	#[error("Invalid configuration: {message}")]
	Validation { message: String },
}
