//! Build annotated trees from real directories

use std::fs;
use std::io;
use std::path::Path;

use super::{join_relative, DirEntry, FileEntry};
use crate::error::SyncError;
use crate::exclusion::RuleSet;
use crate::logging::*;

/// Names of the subdirectories and files of one directory, sorted
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing {
	pub dirs: Vec<String>,
	pub files: Vec<String>,
}

/// List a directory
///
/// Symlinks are never followed: they are skipped with a warning, like
/// entries that are neither files nor directories and entries whose names
/// are not UTF-8.
pub fn list_dir(path: &Path) -> io::Result<Listing> {
	let mut listing = Listing::default();

	for entry_result in fs::read_dir(path)? {
		let entry = entry_result?;
		let name = match entry.file_name().into_string() {
			Ok(name) => name,
			Err(raw) => {
				warn!("Skipping non UTF-8 name {:?} in {}", raw, path.display());
				continue;
			}
		};

		let file_type = match entry.file_type() {
			Ok(t) => t,
			Err(e) => {
				warn!("Skipping {}: {}", entry.path().display(), e);
				continue;
			}
		};

		if file_type.is_symlink() {
			warn!("Skipping symbolic link {}", entry.path().display());
		} else if file_type.is_dir() {
			listing.dirs.push(name);
		} else if file_type.is_file() {
			listing.files.push(name);
		} else {
			debug!("Skipping special file {}", entry.path().display());
		}
	}

	listing.dirs.sort();
	listing.dirs.dedup();
	listing.files.sort();
	listing.files.dedup();
	Ok(listing)
}

/// Which rules annotate a tree
#[derive(Clone, Copy)]
enum Annotation<'a> {
	Source { force_copy: &'a RuleSet, ignore: &'a RuleSet },
	Destination { ignore: &'a RuleSet },
}

#[derive(Default, Clone, Copy)]
struct Flags {
	force_copy: bool,
	ignore: bool,
}

impl Annotation<'_> {
	fn file_flags(&self, name: &str, relative: &str) -> Flags {
		match self {
			Annotation::Source { force_copy, ignore } => resolve(
				force_copy.matches_file(name, relative),
				ignore.matches_file(name, relative),
				relative,
			),
			Annotation::Destination { ignore } => {
				Flags { force_copy: false, ignore: ignore.matches_file(name, relative) }
			}
		}
	}

	fn dir_flags(&self, name: &str, relative: &str) -> Flags {
		match self {
			Annotation::Source { force_copy, ignore } => resolve(
				force_copy.matches_dir(name, relative),
				ignore.matches_dir(name, relative),
				relative,
			),
			Annotation::Destination { ignore } => {
				Flags { force_copy: false, ignore: ignore.matches_dir(name, relative) }
			}
		}
	}
}

fn resolve(force_copy: bool, ignore: bool, relative: &str) -> Flags {
	if force_copy && ignore {
		info!("Force copy overrides ignore for {}", relative);
		return Flags { force_copy: true, ignore: false };
	}
	Flags { force_copy, ignore }
}

/// Build the source tree, annotated with force-copy and source-ignore flags
pub fn build_source_tree(
	root: &Path,
	force_copy: &RuleSet,
	source_ignore: &RuleSet,
) -> Result<DirEntry, SyncError> {
	let annotation = Annotation::Source { force_copy, ignore: source_ignore };
	build_dir(root, DirEntry::root(), "", annotation, true)
}

/// Build the destination tree, annotated with destination-ignore flags
pub fn build_destination_tree(root: &Path, ignore: &RuleSet) -> Result<DirEntry, SyncError> {
	build_dir(root, DirEntry::root(), "", Annotation::Destination { ignore }, true)
}

/// Fill `node` with the contents of `path`
///
/// Rules are only evaluated while `evaluate` holds; below a force-copied
/// directory entries carry no flags of their own.
fn build_dir(
	path: &Path,
	mut node: DirEntry,
	relative: &str,
	annotation: Annotation<'_>,
	evaluate: bool,
) -> Result<DirEntry, SyncError> {
	let listing =
		list_dir(path).map_err(|e| SyncError::Listing { path: path.to_path_buf(), source: e })?;

	for name in listing.dirs {
		let child_relative = join_relative(relative, &name);
		let flags =
			if evaluate { annotation.dir_flags(&name, &child_relative) } else { Flags::default() };

		let mut child = DirEntry::new(name);
		child.force_copy = flags.force_copy;
		child.ignore = flags.ignore;

		if flags.ignore {
			debug!("Ignoring directory {}", child_relative);
			node.subdirs.push(child);
			continue;
		}

		let child_path = path.join(&child.name);
		let child = build_dir(
			&child_path,
			child,
			&child_relative,
			annotation,
			evaluate && !flags.force_copy,
		)?;
		node.subdirs.push(child);
	}

	for name in listing.files {
		let mut file = FileEntry::new(name);
		if evaluate {
			let child_relative = join_relative(relative, &file.name);
			let flags = annotation.file_flags(&file.name, &child_relative);
			file.force_copy = flags.force_copy;
			file.ignore = flags.ignore;
		}
		node.files.push(file);
	}

	Ok(node)
}
