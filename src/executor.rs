//! Apply a reconciliation plan to the filesystem
//!
//! Every mutation that can destroy existing data (copying over a file,
//! removing a file or directory, updating directory attributes) is wrapped
//! by the [`BackupManager`]: on failure the path is restored and the error
//! is returned, which aborts the run.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::backup::{remove_any, BackupManager, BackupRecord};
use crate::error::SyncError;
use crate::logging::*;
use crate::metadata::{is_newer, Attributes};
use crate::tree::{list_dir, DirEntry, FileEntry};

/// Copies file contents
///
/// Attributes are applied by the executor afterwards.
pub trait FileCopier {
	fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64>;
}

/// [`FileCopier`] backed by [`std::fs::copy`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdCopier;

impl FileCopier for StdCopier {
	fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64> {
		fs::copy(src, dest)
	}
}

/// What one executor run did (or would do, in dry-run mode)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
	pub files_copied: usize,
	/// Files left alone because the destination was not older
	pub files_skipped: usize,
	pub files_removed: usize,
	pub dirs_created: usize,
	pub dirs_removed: usize,
	/// Destination-only directories kept because they hold protected entries
	pub dirs_preserved: usize,
}

impl SyncStats {
	/// Number of filesystem changes
	pub fn changes(&self) -> usize {
		self.files_copied + self.files_removed + self.dirs_created + self.dirs_removed
	}
}

/// Walks a plan and performs copies and removals
pub struct Executor {
	dry_run: bool,
	backups: BackupManager,
	copier: Arc<dyn FileCopier>,
	stats: SyncStats,
}

impl Executor {
	pub fn new(dry_run: bool) -> Self {
		Self {
			dry_run,
			backups: BackupManager::new(dry_run),
			copier: Arc::new(StdCopier),
			stats: SyncStats::default(),
		}
	}

	/// Replace the file copier
	pub fn with_copier(mut self, copier: Arc<dyn FileCopier>) -> Self {
		self.copier = copier;
		self
	}

	pub fn stats(&self) -> &SyncStats {
		&self.stats
	}

	pub fn into_stats(self) -> SyncStats {
		self.stats
	}

	/// Apply `plan` to `dest_root`, reading from `src_root`
	///
	/// Files are handled before subdirectories.
	pub fn apply(&mut self, src_root: &Path, dest_root: &Path, plan: &DirEntry) -> Result<(), SyncError> {
		let preserved: BTreeSet<&str> =
			plan.subdirs.iter().filter(|d| d.preserve).map(|d| d.name.as_str()).collect();

		for file in &plan.files {
			self.apply_file(src_root, dest_root, file, &preserved)?;
		}
		for dir in &plan.subdirs {
			self.apply_dir(src_root, dest_root, dir)?;
		}
		Ok(())
	}

	fn apply_file(
		&mut self,
		src_root: &Path,
		dest_root: &Path,
		file: &FileEntry,
		preserved: &BTreeSet<&str>,
	) -> Result<(), SyncError> {
		let src = src_root.join(&file.name);
		let dest = dest_root.join(&file.name);

		match (is_real_file(&src), is_real_file(&dest)) {
			(false, false) => {
				debug!("{} is gone on both sides", dest.display());
				Ok(())
			}
			(true, false) => {
				if is_real_dir(&dest) && preserved.contains(file.name.as_str()) {
					warn!("Not replacing protected directory {} with a file", dest.display());
					return Ok(());
				}
				self.copy_file(&src, &dest)
			}
			(false, true) => {
				if file.ignore {
					debug!("Keeping ignored file {}", dest.display());
					return Ok(());
				}
				self.remove(&dest)
			}
			(true, true) => self.update_file(&src, &dest, file.force_copy),
		}
	}

	fn apply_dir(&mut self, src_root: &Path, dest_root: &Path, dir: &DirEntry) -> Result<(), SyncError> {
		let src = src_root.join(&dir.name);
		let dest = dest_root.join(&dir.name);

		if !is_real_dir(&dest) {
			if !is_real_dir(&src) {
				debug!("{} is gone on both sides", dest.display());
				return Ok(());
			}
			self.make_dir(&dest)?;
			if dir.force_copy {
				self.copy_tree(&src, &dest)?;
			} else {
				self.apply(&src, &dest, dir)?;
			}
			return self.copy_dir_attributes(&src, &dest);
		}

		if !is_real_dir(&src) {
			if dir.preserve {
				// Nothing to compare against; leave the whole subtree as is
				info!("Preserving {}", dest.display());
				self.stats.dirs_preserved += 1;
				return Ok(());
			}
			return self.remove(&dest);
		}

		if dir.force_copy {
			return self.copy_tree(&src, &dest);
		}
		self.apply(&src, &dest, dir)
	}

	/// Copy a source subtree onto `dest` without removing anything
	///
	/// Files are only copied when missing or older in the destination.
	fn copy_tree(&mut self, src: &Path, dest: &Path) -> Result<(), SyncError> {
		let listing =
			list_dir(src).map_err(|e| SyncError::Listing { path: src.to_path_buf(), source: e })?;

		for name in &listing.files {
			let (src_file, dest_file) = (src.join(name), dest.join(name));
			if is_real_file(&dest_file) {
				self.update_file(&src_file, &dest_file, false)?;
			} else {
				self.copy_file(&src_file, &dest_file)?;
			}
		}

		for name in &listing.dirs {
			let (src_dir, dest_dir) = (src.join(name), dest.join(name));
			if is_real_dir(&dest_dir) {
				self.copy_tree(&src_dir, &dest_dir)?;
			} else {
				self.make_dir(&dest_dir)?;
				self.copy_tree(&src_dir, &dest_dir)?;
				self.copy_dir_attributes(&src_dir, &dest_dir)?;
			}
		}
		Ok(())
	}

	fn update_file(&mut self, src: &Path, dest: &Path, force: bool) -> Result<(), SyncError> {
		let newer = is_newer(src, dest).map_err(|e| SyncError::mutation("compare", dest, e))?;
		if force || newer {
			return self.copy_file(src, dest);
		}
		self.stats.files_skipped += 1;
		Ok(())
	}

	fn copy_file(&mut self, src: &Path, dest: &Path) -> Result<(), SyncError> {
		if self.dry_run {
			info!("[dry-run] copy {} -> {}", src.display(), dest.display());
			self.stats.files_copied += 1;
			return Ok(());
		}

		let attributes =
			Attributes::capture(src).map_err(|e| SyncError::mutation("read attributes of", src, e))?;
		self.guarded("copy", dest, || {
			self.copier.copy(src, dest)?;
			attributes.apply(dest)
		})?;

		info!("Copied {}", dest.display());
		self.stats.files_copied += 1;
		Ok(())
	}

	fn remove(&mut self, dest: &Path) -> Result<(), SyncError> {
		let is_dir = is_real_dir(dest);
		if self.dry_run {
			info!("[dry-run] remove {}", dest.display());
		} else {
			// Renaming aside is atomic; deleting the backup finishes the removal
			let record = self.backups.begin(dest)?;
			self.backups.discard(record)?;
			info!("Removed {}", dest.display());
		}

		if is_dir {
			self.stats.dirs_removed += 1;
		} else {
			self.stats.files_removed += 1;
		}
		Ok(())
	}

	fn make_dir(&mut self, dest: &Path) -> Result<(), SyncError> {
		if self.dry_run {
			info!("[dry-run] create directory {}", dest.display());
		} else {
			self.guarded("create directory", dest, || fs::create_dir(dest))?;
			debug!("Created directory {}", dest.display());
		}
		self.stats.dirs_created += 1;
		Ok(())
	}

	/// Apply the attributes of `src` onto the directory `dest`
	///
	/// Runs after the directory's contents are complete.
	fn copy_dir_attributes(&mut self, src: &Path, dest: &Path) -> Result<(), SyncError> {
		if self.dry_run {
			return Ok(());
		}
		let attributes =
			Attributes::capture(src).map_err(|e| SyncError::mutation("read attributes of", src, e))?;

		let record = self.backups.begin_attributes(dest)?;
		match attributes.apply(dest) {
			Ok(()) => self.backups.discard(record),
			Err(e) => {
				self.restore_after_failure(record, dest);
				Err(SyncError::mutation("set attributes of", dest, e))
			}
		}
	}

	/// Run `mutation` on `path` with a backup of whatever was there before
	fn guarded<F>(&self, operation: &'static str, path: &Path, mutation: F) -> Result<(), SyncError>
	where
		F: FnOnce() -> io::Result<()>,
	{
		let record = self.backups.begin(path)?;
		match mutation() {
			Ok(()) => self.backups.discard(record),
			Err(e) => {
				error!("Failed to {} {}: {}", operation, path.display(), e);
				self.restore_after_failure(record, path);
				Err(SyncError::mutation(operation, path, e))
			}
		}
	}

	fn restore_after_failure(&self, record: BackupRecord, path: &Path) {
		if record.is_empty() {
			// Nothing existed before; drop whatever the failed mutation left
			if let Err(e) = remove_any(path) {
				error!("Could not clean up {}: {}", path.display(), e);
			}
			return;
		}
		if let Err(e) = self.backups.restore(record) {
			error!("Could not restore {}: {}", path.display(), e);
		}
	}
}

/// Regular file, not reached through a symlink
fn is_real_file(path: &Path) -> bool {
	fs::symlink_metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Directory, not reached through a symlink
fn is_real_dir(path: &Path) -> bool {
	fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use filetime::FileTime;
	use std::io::Write;
	use tempfile::TempDir;

	/// Writes a few bytes, then fails
	struct BrokenCopier;

	impl FileCopier for BrokenCopier {
		fn copy(&self, _src: &Path, dest: &Path) -> io::Result<u64> {
			let mut f = fs::File::create(dest)?;
			f.write_all(b"partial")?;
			Err(io::Error::new(io::ErrorKind::Other, "disk full"))
		}
	}

	fn plan_with_file(name: &str, force_copy: bool) -> DirEntry {
		let mut plan = DirEntry::root();
		plan.files.push(FileEntry { name: name.to_string(), force_copy, ignore: false });
		plan
	}

	fn set_mtime(path: &Path, secs: i64) {
		let t = FileTime::from_unix_time(secs, 0);
		filetime::set_file_times(path, t, t).unwrap();
	}

	#[test]
	fn test_failed_copy_restores_destination() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::write(src.path().join("a.txt"), "new").unwrap();
		fs::write(dest.path().join("a.txt"), "old").unwrap();
		set_mtime(&src.path().join("a.txt"), 2_000_000_000);
		set_mtime(&dest.path().join("a.txt"), 1_000_000_000);

		let mut executor = Executor::new(false).with_copier(Arc::new(BrokenCopier));
		let result = executor.apply(src.path(), dest.path(), &plan_with_file("a.txt", false));

		assert!(matches!(result, Err(SyncError::Mutation { operation: "copy", .. })));
		assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "old");
		let restored = Attributes::capture(&dest.path().join("a.txt")).unwrap();
		assert_eq!(restored.modified, FileTime::from_unix_time(1_000_000_000, 0));
		let leftovers: Vec<_> = fs::read_dir(dest.path()).unwrap().collect();
		assert_eq!(leftovers.len(), 1);
	}

	#[test]
	fn test_failed_copy_of_new_file_leaves_nothing_behind() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::write(src.path().join("a.txt"), "new").unwrap();

		let mut executor = Executor::new(false).with_copier(Arc::new(BrokenCopier));
		let result = executor.apply(src.path(), dest.path(), &plan_with_file("a.txt", false));

		assert!(result.is_err());
		assert!(!dest.path().join("a.txt").exists());
	}

	#[test]
	fn test_force_copy_ignores_timestamps() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::write(src.path().join("cfg"), "source").unwrap();
		fs::write(dest.path().join("cfg"), "dest").unwrap();
		set_mtime(&src.path().join("cfg"), 1_000_000_000);
		set_mtime(&dest.path().join("cfg"), 2_000_000_000);

		let mut executor = Executor::new(false);
		executor.apply(src.path(), dest.path(), &plan_with_file("cfg", false)).unwrap();
		assert_eq!(fs::read_to_string(dest.path().join("cfg")).unwrap(), "dest");
		assert_eq!(executor.stats().files_skipped, 1);

		executor.apply(src.path(), dest.path(), &plan_with_file("cfg", true)).unwrap();
		assert_eq!(fs::read_to_string(dest.path().join("cfg")).unwrap(), "source");
		assert_eq!(executor.stats().files_copied, 1);
	}

	#[test]
	fn test_dry_run_touches_nothing() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::write(src.path().join("new.txt"), "n").unwrap();
		fs::write(dest.path().join("old.txt"), "o").unwrap();
		let mut plan = plan_with_file("new.txt", false);
		plan.files.push(FileEntry::new("old.txt"));

		let mut executor = Executor::new(true);
		executor.apply(src.path(), dest.path(), &plan).unwrap();

		assert!(!dest.path().join("new.txt").exists());
		assert!(dest.path().join("old.txt").exists());
		assert_eq!(executor.stats().files_copied, 1);
		assert_eq!(executor.stats().files_removed, 1);
	}

	#[test]
	fn test_preserved_dir_without_source_is_left_alone() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::create_dir_all(dest.path().join("local/sub")).unwrap();
		fs::write(dest.path().join("local/keep.env"), "k").unwrap();
		fs::write(dest.path().join("local/junk.txt"), "j").unwrap();

		let mut local = DirEntry::new("local");
		local.preserve = true;
		local.files.push(FileEntry::new("junk.txt"));
		let mut plan = DirEntry::root();
		plan.preserve = true;
		plan.subdirs.push(local);

		let mut executor = Executor::new(false);
		executor.apply(src.path(), dest.path(), &plan).unwrap();

		assert!(dest.path().join("local/keep.env").exists());
		assert!(dest.path().join("local/junk.txt").exists());
		assert!(dest.path().join("local/sub").is_dir());
		assert_eq!(executor.stats().dirs_preserved, 1);
		assert_eq!(executor.stats().changes(), 0);
	}

	#[test]
	fn test_force_copied_dir_never_removes() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::create_dir_all(src.path().join("assets/img")).unwrap();
		fs::write(src.path().join("assets/img/logo.png"), "png").unwrap();
		fs::create_dir_all(dest.path().join("assets")).unwrap();
		fs::write(dest.path().join("assets/extra.bin"), "x").unwrap();

		let mut assets = DirEntry::new("assets");
		assets.force_copy = true;
		let mut plan = DirEntry::root();
		plan.subdirs.push(assets);

		let mut executor = Executor::new(false);
		executor.apply(src.path(), dest.path(), &plan).unwrap();

		assert_eq!(fs::read_to_string(dest.path().join("assets/img/logo.png")).unwrap(), "png");
		assert!(dest.path().join("assets/extra.bin").exists());
	}

	#[test]
	fn test_removed_directory_leaves_no_backup() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		fs::create_dir_all(dest.path().join("stale/deep")).unwrap();
		fs::write(dest.path().join("stale/deep/f"), "").unwrap();

		let mut plan = DirEntry::root();
		plan.subdirs.push(DirEntry::new("stale"));

		let mut executor = Executor::new(false);
		executor.apply(src.path(), dest.path(), &plan).unwrap();

		assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
		assert_eq!(executor.stats().dirs_removed, 1);
	}

	#[cfg(unix)]
	#[test]
	fn test_destination_symlink_is_replaced_not_entered() {
		let src = TempDir::new().unwrap();
		let dest = TempDir::new().unwrap();
		let outside = TempDir::new().unwrap();
		fs::create_dir(src.path().join("a")).unwrap();
		fs::write(src.path().join("a/x.txt"), "x").unwrap();
		fs::write(outside.path().join("precious.txt"), "keep").unwrap();
		std::os::unix::fs::symlink(outside.path(), dest.path().join("a")).unwrap();

		let mut a = DirEntry::new("a");
		a.files.push(FileEntry::new("x.txt"));
		let mut plan = DirEntry::root();
		plan.subdirs.push(a);

		let mut executor = Executor::new(false);
		executor.apply(src.path(), dest.path(), &plan).unwrap();

		assert!(!fs::symlink_metadata(dest.path().join("a")).unwrap().file_type().is_symlink());
		assert_eq!(fs::read_to_string(dest.path().join("a/x.txt")).unwrap(), "x");
		assert!(outside.path().join("precious.txt").exists());
		assert!(!outside.path().join("x.txt").exists());
	}
}
