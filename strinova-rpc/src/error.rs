/// Failures the application distinguishes at runtime.
///
/// Only `Configuration` is fatal; everything else is scoped to a single tick.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Bad or missing config, roster or OCR models. Surfaced once at startup.
	#[error("configuration error: {0:#}")]
	Configuration(anyhow::Error),

	/// The screen could not be captured this tick.
	#[error("capture of region {region:?} failed: {message}")]
	Capture { region: String, message: String },

	/// A presence update could not be sent.
	#[error("presence update failed: {0}")]
	Transport(String),

	/// The transport is waiting before its next connection attempt.
	#[error("presence client not connected; next attempt in {0:?}")]
	Disconnected(std::time::Duration),
}

impl From<anyhow::Error> for Error {
	fn from(err: anyhow::Error) -> Self {
		Self::Configuration(err)
	}
}
