//! Crash-safe wrapping of destructive filesystem mutations
//!
//! Before a path is overwritten or removed, whatever occupies it is renamed
//! aside next to it. If the mutation succeeds the backup is discarded, if
//! it fails the backup is moved back over whatever the mutation left behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::logging::*;
use crate::metadata::Attributes;

/// Suffixes tried in order when renaming a path aside
pub const BACKUP_SUFFIXES: [&str; 3] = [".TrEeSyNc-BaK", ".TrEeSyNc-BaK1", ".TrEeSyNc-BaK2"];

/// State needed to undo or finalize one mutation
#[derive(Debug)]
#[must_use = "a backup record must be restored or discarded"]
pub struct BackupRecord {
	original_path: PathBuf,
	backup_path: Option<PathBuf>,
	attributes: Option<Attributes>,
	is_directory: bool,
}

impl BackupRecord {
	fn empty(path: &Path) -> Self {
		Self {
			original_path: path.to_path_buf(),
			backup_path: None,
			attributes: None,
			is_directory: false,
		}
	}

	/// Nothing was saved: the path did not exist, or this is a dry run
	pub fn is_empty(&self) -> bool {
		self.backup_path.is_none() && self.attributes.is_none()
	}

	pub fn original_path(&self) -> &Path {
		&self.original_path
	}

	pub fn backup_path(&self) -> Option<&Path> {
		self.backup_path.as_deref()
	}

	pub fn attributes(&self) -> Option<&Attributes> {
		self.attributes.as_ref()
	}

	pub fn is_directory(&self) -> bool {
		self.is_directory
	}
}

/// Creates, restores and discards backups
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupManager {
	dry_run: bool,
}

impl BackupManager {
	pub fn new(dry_run: bool) -> Self {
		Self { dry_run }
	}

	/// First backup candidate for `path` that is not occupied on disk
	pub fn free_backup_path(path: &Path) -> Option<PathBuf> {
		let file_name = path.file_name()?;
		BACKUP_SUFFIXES
			.iter()
			.map(|suffix| {
				let mut name = file_name.to_os_string();
				name.push(suffix);
				path.with_file_name(name)
			})
			.find(|candidate| !occupied(candidate))
	}

	/// Rename `path` aside before it is overwritten or removed
	///
	/// Returns an empty record when `path` does not exist.
	pub fn begin(&self, path: &Path) -> Result<BackupRecord, SyncError> {
		if self.dry_run || !occupied(path) {
			return Ok(BackupRecord::empty(path));
		}

		let backup_path = Self::free_backup_path(path)
			.ok_or_else(|| SyncError::BackupUnavailable { path: path.to_path_buf() })?;
		let meta = fs::symlink_metadata(path).map_err(|e| SyncError::mutation("inspect", path, e))?;
		// Links are moved as is, without attributes
		let attributes =
			if meta.file_type().is_symlink() { None } else { Attributes::capture(path).ok() };

		debug!("Creating backup {} for {}", backup_path.display(), path.display());
		fs::rename(path, &backup_path).map_err(|e| SyncError::mutation("back up", path, e))?;

		Ok(BackupRecord {
			original_path: path.to_path_buf(),
			backup_path: Some(backup_path),
			attributes,
			is_directory: meta.is_dir(),
		})
	}

	/// Snapshot the attributes of `path` without moving it
	///
	/// Guards attribute updates on directories that must stay in place.
	pub fn begin_attributes(&self, path: &Path) -> Result<BackupRecord, SyncError> {
		if self.dry_run || !occupied(path) {
			return Ok(BackupRecord::empty(path));
		}
		let attributes =
			Attributes::capture(path).map_err(|e| SyncError::mutation("inspect", path, e))?;
		let is_directory = attributes.is_dir;
		Ok(BackupRecord {
			original_path: path.to_path_buf(),
			backup_path: None,
			attributes: Some(attributes),
			is_directory,
		})
	}

	/// Put the saved state back after a failed mutation
	pub fn restore(&self, record: BackupRecord) -> Result<(), SyncError> {
		if record.is_empty() {
			return Ok(());
		}
		let original = &record.original_path;

		if let Some(backup_path) = &record.backup_path {
			warn!("Restoring {} from {}", original.display(), backup_path.display());
			remove_any(original).map_err(|e| SyncError::mutation("clear", original, e))?;
			fs::rename(backup_path, original).map_err(|e| SyncError::mutation("restore", original, e))?;
		} else {
			warn!("Restoring attributes of {}", original.display());
		}

		if let Some(attributes) = &record.attributes {
			attributes
				.apply(original)
				.map_err(|e| SyncError::mutation("restore attributes of", original, e))?;
		}
		Ok(())
	}

	/// Delete the saved state after a successful mutation
	pub fn discard(&self, record: BackupRecord) -> Result<(), SyncError> {
		if let Some(backup_path) = &record.backup_path {
			debug!("Discarding backup {}", backup_path.display());
			remove_any(backup_path).map_err(|e| SyncError::mutation("discard backup", backup_path, e))?;
		}
		Ok(())
	}
}

fn occupied(path: &Path) -> bool {
	fs::symlink_metadata(path).is_ok()
}

/// Remove a file, symlink or directory tree; a missing path is fine
pub(crate) fn remove_any(path: &Path) -> io::Result<()> {
	let meta = match fs::symlink_metadata(path) {
		Ok(m) => m,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(e),
	};
	if meta.is_dir() {
		fs::remove_dir_all(path)
	} else {
		fs::remove_file(path)
	}
}
