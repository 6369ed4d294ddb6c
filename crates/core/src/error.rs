use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub type Result<T, E = GraphicsError> = std::result::Result<T, E>;

/// The error taxonomy of every fallible operation. Backend errors are translated into one of these kinds with their
/// message attached, native error codes never cross this boundary.
///
/// Misuse of the command buffer state machine is not represented here, it panics.
#[derive(Error)]
pub enum GraphicsError {
	/// No supported backend or adapter was found, or backend device creation failed.
	#[error("Initialization Error: {0}")]
	Initialization(String),
	/// A resource description was invalid or unsupported, or the backend refused to create the resource.
	#[error("Resource Creation Error for {name:?}: {reason}")]
	ResourceCreation { name: String, reason: String },
	/// A usage and heap type combination that is not permitted.
	#[error("Invalid Usage of {name:?}: {reason}")]
	InvalidUsage { name: String, reason: String },
	/// The backend failed to submit, wait or present and the device must be considered lost.
	#[error("Device Lost: {0}")]
	DeviceLost(String),
}

impl Debug for GraphicsError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GraphicsErrorKind {
	Initialization,
	ResourceCreation,
	InvalidUsage,
	DeviceLost,
}

impl GraphicsError {
	pub fn kind(&self) -> GraphicsErrorKind {
		match self {
			GraphicsError::Initialization(_) => GraphicsErrorKind::Initialization,
			GraphicsError::ResourceCreation { .. } => GraphicsErrorKind::ResourceCreation,
			GraphicsError::InvalidUsage { .. } => GraphicsErrorKind::InvalidUsage,
			GraphicsError::DeviceLost(_) => GraphicsErrorKind::DeviceLost,
		}
	}

	pub fn initialization(err: impl Error) -> Self {
		Self::Initialization(err.to_string())
	}

	pub fn resource_creation(name: &str, reason: impl Display) -> Self {
		Self::ResourceCreation {
			name: name.to_string(),
			reason: reason.to_string(),
		}
	}

	pub fn invalid_usage(name: &str, reason: impl Display) -> Self {
		Self::InvalidUsage {
			name: name.to_string(),
			reason: reason.to_string(),
		}
	}

	pub fn device_lost(err: impl Error) -> Self {
		Self::DeviceLost(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debug_is_display() -> anyhow::Result<()> {
		let err = GraphicsError::invalid_usage("vertices", "MAP_READ requires a Readback heap");
		assert_eq!(format!("{err:?}"), format!("{err}"));
		assert_eq!(
			err.to_string(),
			"Invalid Usage of \"vertices\": MAP_READ requires a Readback heap"
		);
		assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
		Ok(())
	}
}
