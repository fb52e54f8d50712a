//! Capture and reapply filesystem metadata
//!
//! Timestamps are handled on every platform. Ownership and mode bits are
//! handled on Unix, hidden and readonly bits on Windows. Fields the current
//! platform does not support are `None` and never applied.

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;

use crate::logging::*;

/// Metadata snapshot of one file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
	pub accessed: FileTime,
	pub modified: FileTime,
	/// Permission bits (Unix)
	pub mode: Option<u32>,
	pub uid: Option<u32>,
	pub gid: Option<u32>,
	/// Readonly bit (Windows)
	pub readonly: Option<bool>,
	/// Hidden bit (Windows)
	pub hidden: Option<bool>,
	pub is_dir: bool,
}

impl Attributes {
	/// Capture the metadata of `path`, following symlinks
	pub fn capture(path: &Path) -> io::Result<Self> {
		let meta = fs::metadata(path)?;
		Ok(Self::from_metadata(&meta))
	}

	pub fn from_metadata(meta: &fs::Metadata) -> Self {
		let mut attrs = Self {
			accessed: FileTime::from_last_access_time(meta),
			modified: FileTime::from_last_modification_time(meta),
			mode: None,
			uid: None,
			gid: None,
			readonly: None,
			hidden: None,
			is_dir: meta.is_dir(),
		};

		#[cfg(unix)]
		{
			use std::os::unix::fs::MetadataExt;
			attrs.mode = Some(meta.mode() & 0o7777);
			attrs.uid = Some(meta.uid());
			attrs.gid = Some(meta.gid());
		}

		#[cfg(windows)]
		{
			use std::os::windows::fs::MetadataExt;
			attrs.readonly = Some(meta.permissions().readonly());
			attrs.hidden = Some(meta.file_attributes() & windows::FILE_ATTRIBUTE_HIDDEN != 0);
		}

		attrs
	}

	/// Write this snapshot onto `path`
	///
	/// Must run after the content of `path` is complete: writing content
	/// afterwards would move the modification time again.
	pub fn apply(&self, path: &Path) -> io::Result<()> {
		#[cfg(unix)]
		{
			apply_ownership(path, self.uid, self.gid)?;
			if let Some(mode) = self.mode {
				use std::os::unix::fs::PermissionsExt;
				fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
			}
			filetime::set_file_times(path, self.accessed, self.modified)?;
		}

		#[cfg(windows)]
		{
			// A readonly file rejects timestamp updates, so times go first
			filetime::set_file_times(path, self.accessed, self.modified)?;
			if let Some(hidden) = self.hidden {
				windows::set_hidden(path, hidden)?;
			}
			if let (Some(readonly), false) = (self.readonly, self.is_dir) {
				let mut perms = fs::metadata(path)?.permissions();
				if perms.readonly() != readonly {
					perms.set_readonly(readonly);
					fs::set_permissions(path, perms)?;
				}
			}
		}

		#[cfg(not(any(unix, windows)))]
		{
			filetime::set_file_times(path, self.accessed, self.modified)?;
		}

		Ok(())
	}
}

/// Whether `src` was modified strictly after `dest`
pub fn is_newer(src: &Path, dest: &Path) -> io::Result<bool> {
	let src_time = FileTime::from_last_modification_time(&fs::metadata(src)?);
	let dest_time = FileTime::from_last_modification_time(&fs::metadata(dest)?);
	Ok(src_time > dest_time)
}

#[cfg(unix)]
fn apply_ownership(path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
	use std::ffi::CString;
	use std::os::unix::ffi::OsStrExt;
	use std::os::unix::fs::MetadataExt;

	let current = fs::metadata(path)?;
	let uid = uid.filter(|&u| u != current.uid());
	let gid = gid.filter(|&g| g != current.gid());
	if uid.is_none() && gid.is_none() {
		return Ok(());
	}

	let c_path = CString::new(path.as_os_str().as_bytes())
		.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
	// -1 leaves the id unchanged
	let raw_uid = uid.map_or(libc::uid_t::MAX, |u| u as libc::uid_t);
	let raw_gid = gid.map_or(libc::gid_t::MAX, |g| g as libc::gid_t);

	let rc = unsafe { libc::chown(c_path.as_ptr(), raw_uid, raw_gid) };
	if rc == 0 {
		return Ok(());
	}

	let err = io::Error::last_os_error();
	if err.raw_os_error() == Some(libc::EPERM) {
		// Only root may give files away
		debug!("Cannot preserve ownership of {}: {}", path.display(), err);
		return Ok(());
	}
	Err(err)
}

#[cfg(windows)]
mod windows {
	use std::io;
	use std::os::windows::ffi::OsStrExt;
	use std::os::windows::fs::MetadataExt;
	use std::path::Path;

	pub use windows_sys::Win32::Storage::FileSystem::FILE_ATTRIBUTE_HIDDEN;
	use windows_sys::Win32::Storage::FileSystem::SetFileAttributesW;

	pub fn set_hidden(path: &Path, hidden: bool) -> io::Result<()> {
		let current = std::fs::metadata(path)?.file_attributes();
		let wanted =
			if hidden { current | FILE_ATTRIBUTE_HIDDEN } else { current & !FILE_ATTRIBUTE_HIDDEN };
		if wanted == current {
			return Ok(());
		}

		let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
		let ok = unsafe { SetFileAttributesW(wide.as_ptr(), wanted) };
		if ok == 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_capture_apply_timestamps() {
		let temp_dir = TempDir::new().unwrap();
		let src = temp_dir.path().join("src.txt");
		let dest = temp_dir.path().join("dest.txt");
		fs::write(&src, "a").unwrap();
		fs::write(&dest, "b").unwrap();
		filetime::set_file_times(
			&src,
			FileTime::from_unix_time(1_600_000_000, 0),
			FileTime::from_unix_time(1_500_000_000, 123_000),
		)
		.unwrap();

		let attrs = Attributes::capture(&src).unwrap();
		attrs.apply(&dest).unwrap();

		let after = Attributes::capture(&dest).unwrap();
		assert_eq!(after.modified, FileTime::from_unix_time(1_500_000_000, 123_000));
		assert_eq!(after.modified, attrs.modified);
		assert!(!after.is_dir);
	}

	#[cfg(unix)]
	#[test]
	fn test_capture_apply_mode() {
		use std::os::unix::fs::PermissionsExt;

		let temp_dir = TempDir::new().unwrap();
		let src = temp_dir.path().join("run.sh");
		let dest = temp_dir.path().join("copy.sh");
		fs::write(&src, "#!/bin/sh").unwrap();
		fs::write(&dest, "").unwrap();
		fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();
		fs::set_permissions(&dest, fs::Permissions::from_mode(0o600)).unwrap();

		Attributes::capture(&src).unwrap().apply(&dest).unwrap();

		let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
		assert_eq!(mode, 0o750);
	}

	#[test]
	fn test_directory_attributes() {
		let temp_dir = TempDir::new().unwrap();
		let dir = temp_dir.path().join("d");
		fs::create_dir(&dir).unwrap();
		let stamp = FileTime::from_unix_time(1_400_000_000, 0);
		filetime::set_file_times(&dir, stamp, stamp).unwrap();

		let attrs = Attributes::capture(&dir).unwrap();
		assert!(attrs.is_dir);
		assert_eq!(attrs.modified, stamp);
	}

	#[test]
	fn test_is_newer() {
		let temp_dir = TempDir::new().unwrap();
		let old = temp_dir.path().join("old");
		let new = temp_dir.path().join("new");
		fs::write(&old, "").unwrap();
		fs::write(&new, "").unwrap();
		filetime::set_file_mtime(&old, FileTime::from_unix_time(1_000, 0)).unwrap();
		filetime::set_file_mtime(&new, FileTime::from_unix_time(2_000, 0)).unwrap();

		assert!(is_newer(&new, &old).unwrap());
		assert!(!is_newer(&old, &new).unwrap());
		assert!(!is_newer(&old, &old).unwrap());
	}
}
