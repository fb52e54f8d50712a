//! Error types for treesync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::exclusion::ExclusionError;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Invalid configuration
	InvalidConfig { message: String },

	/// Source root is missing or not a directory
	InvalidSource { path: PathBuf },

	/// No usable destination directory left after filtering
	NoDestinations,

	/// Rule file could not be loaded (nested)
	Exclusion(ExclusionError),

	/// A directory could not be enumerated while building a tree
	Listing { path: PathBuf, source: io::Error },

	/// A filesystem mutation failed (after the path was restored)
	Mutation { operation: &'static str, path: PathBuf, source: io::Error },

	/// Every backup candidate name next to the path is occupied
	BackupUnavailable { path: PathBuf },
}

impl SyncError {
	/// Build a mutation error for `path`
	pub fn mutation(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
		SyncError::Mutation { operation, path: path.into(), source }
	}

	/// Whether this error was raised before any tree was built
	pub fn is_config_error(&self) -> bool {
		matches!(
			self,
			SyncError::InvalidConfig { .. }
				| SyncError::InvalidSource { .. }
				| SyncError::NoDestinations
				| SyncError::Exclusion(_)
		)
	}

	/// Process exit status for this error
	///
	/// Configuration and rule-file errors exit with 2, everything else with 1.
	pub fn exit_code(&self) -> u8 {
		if self.is_config_error() {
			2
		} else {
			1
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::InvalidSource { path } => {
				write!(f, "Source {} does not exist or is not a directory", path.display())
			}
			SyncError::NoDestinations => write!(f, "No usable destination directories"),
			SyncError::Exclusion(e) => write!(f, "Rule error: {}", e),
			SyncError::Listing { path, source } => {
				write!(f, "Cannot list directory {}: {}", path.display(), source)
			}
			SyncError::Mutation { operation, path, source } => {
				write!(f, "Failed to {} {}: {}", operation, path.display(), source)
			}
			SyncError::BackupUnavailable { path } => {
				write!(f, "No free backup name for {}", path.display())
			}
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Exclusion(e) => Some(e),
			SyncError::Listing { source, .. } | SyncError::Mutation { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Exclusion(e)
	}
}


// vim: ts=4
