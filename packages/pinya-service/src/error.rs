pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration missing: {message}")]
	ConfigurationMissing { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Timed out during {stage}.")]
	Timeout { stage: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<pinya_storage::Error> for Error {
	fn from(err: pinya_storage::Error) -> Self {
		match err {
			pinya_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			pinya_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			pinya_storage::Error::NotFound(message) => Self::NotFound { message },
			pinya_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
