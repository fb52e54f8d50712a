//! Merge a source tree and a destination tree into a reconciliation plan
//!
//! The plan lists, per directory, every file and subdirectory the executor
//! has to look at:
//!
//! - entries present in the source (to copy or update),
//! - entries present only in the destination (to remove),
//! - force-copied subdirectories as opaque nodes (copied wholesale),
//!
//! and marks with `preserve` every directory that holds something protected
//! by a destination-ignore rule. Source-ignored entries never appear, so
//! nothing under them is copied or removed.

use std::collections::{BTreeMap, BTreeSet};

use crate::logging::*;
use crate::tree::{DirEntry, FileEntry};

/// Merge `src` and `dest` into a new plan node
///
/// Neither input is modified. Either side may be an empty placeholder when
/// the directory exists on one side only.
pub fn merge(src: &DirEntry, dest: &DirEntry) -> DirEntry {
	let name = if src.name.is_empty() { &dest.name } else { &src.name };
	let mut out = DirEntry::new(name.clone());

	merge_subdirs(src, dest, &mut out);
	merge_files(src, dest, &mut out);

	out
}

fn merge_subdirs(src: &DirEntry, dest: &DirEntry, out: &mut DirEntry) {
	let mut skip: BTreeSet<&str> = BTreeSet::new();
	let mut pairs: BTreeMap<&str, (Option<&DirEntry>, Option<&DirEntry>)> = BTreeMap::new();
	let mut opaque: Vec<DirEntry> = Vec::new();

	for dir in &src.subdirs {
		if dir.ignore || dir.force_copy {
			skip.insert(&dir.name);
			if dir.force_copy {
				// Copied wholesale, never compared entry by entry
				let mut node = DirEntry::new(dir.name.clone());
				node.force_copy = true;
				opaque.push(node);
			}
			continue;
		}
		pairs.insert(&dir.name, (Some(dir), None));
	}

	for dir in &dest.subdirs {
		if skip.contains(dir.name.as_str()) {
			continue;
		}
		match pairs.get_mut(dir.name.as_str()) {
			Some(pair) => pair.1 = Some(dir),
			None if dir.ignore => {
				debug!("Keeping ignored destination directory {}", dir.name);
				out.preserve = true;
			}
			None => {
				pairs.insert(&dir.name, (None, Some(dir)));
			}
		}
	}

	let placeholder = DirEntry::default();
	for (name, (src_dir, dest_dir)) in pairs {
		let mut child = merge(src_dir.unwrap_or(&placeholder), dest_dir.unwrap_or(&placeholder));
		child.name = name.to_string();
		child.force_copy = src_dir.map_or(false, |d| d.force_copy);
		if dest_dir.map_or(false, |d| d.ignore) {
			child.preserve = true;
		}
		if child.preserve {
			out.preserve = true;
		}
		out.subdirs.push(child);
	}

	out.subdirs.extend(opaque);
	out.subdirs.sort_by(|a, b| a.name.cmp(&b.name));
}

fn merge_files(src: &DirEntry, dest: &DirEntry, out: &mut DirEntry) {
	let mut excluded: BTreeSet<&str> = BTreeSet::new();
	let mut files: BTreeMap<&str, FileEntry> = BTreeMap::new();

	for file in &src.files {
		if file.ignore {
			excluded.insert(&file.name);
			continue;
		}
		if file.force_copy {
			excluded.insert(&file.name);
		}
		files.insert(&file.name, file.clone());
	}

	for file in &dest.files {
		if files.contains_key(file.name.as_str()) || excluded.contains(file.name.as_str()) {
			continue;
		}
		if file.ignore {
			out.preserve = true;
			continue;
		}
		files.insert(&file.name, FileEntry::new(file.name.clone()));
	}

	out.files = files.into_values().collect();
}

#[cfg(test)]
mod tests {
	use super::*;

	fn file(name: &str) -> FileEntry {
		FileEntry::new(name)
	}

	fn flagged_file(name: &str, force_copy: bool, ignore: bool) -> FileEntry {
		FileEntry { name: name.to_string(), force_copy, ignore }
	}

	fn dir(name: &str, subdirs: Vec<DirEntry>, files: Vec<FileEntry>) -> DirEntry {
		DirEntry { name: name.to_string(), subdirs, files, ..Default::default() }
	}

	fn names(files: &[FileEntry]) -> Vec<&str> {
		files.iter().map(|f| f.name.as_str()).collect()
	}

	#[test]
	fn test_three_way_files() {
		let src = dir("", vec![], vec![file("both.txt"), file("new.txt")]);
		let dest = dir("", vec![], vec![file("both.txt"), file("old.log")]);

		let plan = merge(&src, &dest);
		assert_eq!(names(&plan.files), vec!["both.txt", "new.txt", "old.log"]);
		assert!(!plan.preserve);
	}

	#[test]
	fn test_source_ignored_file_is_invisible() {
		let src = dir("", vec![], vec![flagged_file("secret.key", false, true)]);
		let dest = dir("", vec![], vec![file("secret.key")]);

		let plan = merge(&src, &dest);
		assert!(plan.files.is_empty());
	}

	#[test]
	fn test_force_copied_file_is_not_duplicated() {
		let src = dir("", vec![], vec![flagged_file("app.cfg", true, false)]);
		let dest = dir("", vec![], vec![file("app.cfg")]);

		let plan = merge(&src, &dest);
		assert_eq!(plan.files, vec![flagged_file("app.cfg", true, false)]);
	}

	#[test]
	fn test_destination_ignored_file_marks_preserve() {
		let src = dir("", vec![], vec![]);
		let dest = dir("", vec![], vec![flagged_file("local.env", false, true), file("stale.txt")]);

		let plan = merge(&src, &dest);
		assert!(plan.preserve);
		assert_eq!(names(&plan.files), vec!["stale.txt"]);
	}

	#[test]
	fn test_source_ignored_dir_hides_destination_dir() {
		let mut git = dir(".git", vec![], vec![]);
		git.ignore = true;
		let src = dir("", vec![git], vec![]);
		let dest = dir("", vec![dir(".git", vec![], vec![file("HEAD")])], vec![]);

		let plan = merge(&src, &dest);
		assert!(plan.subdirs.is_empty());
	}

	#[test]
	fn test_force_copied_dir_is_opaque() {
		let mut assets = dir("assets", vec![dir("img", vec![], vec![file("a.png")])], vec![file("x")]);
		assets.force_copy = true;
		let src = dir("", vec![assets], vec![]);
		let dest = dir("", vec![dir("assets", vec![], vec![file("extra")])], vec![]);

		let plan = merge(&src, &dest);
		assert_eq!(plan.subdirs.len(), 1);
		let node = &plan.subdirs[0];
		assert_eq!(node.name, "assets");
		assert!(node.force_copy);
		assert!(node.subdirs.is_empty());
		assert!(node.files.is_empty());
	}

	#[test]
	fn test_destination_only_dir_is_planned() {
		let src = dir("", vec![], vec![]);
		let dest = dir("", vec![dir("gone", vec![], vec![file("a")])], vec![]);

		let plan = merge(&src, &dest);
		let gone = plan.subdir("gone").unwrap();
		assert!(!gone.preserve);
		assert_eq!(names(&gone.files), vec!["a"]);
	}

	#[test]
	fn test_preserve_propagates_to_root() {
		let protected = flagged_file("keep.cfg", false, true);
		let z = dir("z", vec![], vec![protected, file("junk")]);
		let y = dir("y", vec![z], vec![]);
		let x = dir("x", vec![y], vec![]);
		let dest = dir("", vec![x], vec![]);
		let src = dir("", vec![], vec![]);

		let plan = merge(&src, &dest);
		assert!(plan.preserve);
		assert!(plan.find_dir("x").unwrap().preserve);
		assert!(plan.find_dir("x/y").unwrap().preserve);
		let z = plan.find_dir("x/y/z").unwrap();
		assert!(z.preserve);
		assert_eq!(names(&z.files), vec!["junk"]);
	}

	#[test]
	fn test_ignored_destination_dir_paired_with_source() {
		let src = dir("", vec![dir("data", vec![], vec![file("seed.csv")])], vec![]);
		let mut data = dir("data", vec![], vec![]);
		data.ignore = true;
		let dest = dir("", vec![data], vec![]);

		let plan = merge(&src, &dest);
		let node = plan.subdir("data").unwrap();
		assert!(node.preserve);
		assert!(plan.preserve);
		assert_eq!(names(&node.files), vec!["seed.csv"]);
	}

	#[test]
	fn test_ignored_destination_only_dir_is_left_out() {
		let mut cache = dir("cache", vec![], vec![]);
		cache.ignore = true;
		let dest = dir("", vec![dir("old", vec![cache], vec![])], vec![]);
		let src = dir("", vec![], vec![]);

		let plan = merge(&src, &dest);
		let old = plan.subdir("old").unwrap();
		assert!(old.subdirs.is_empty());
		assert!(old.preserve);
		assert!(plan.preserve);
	}

	#[test]
	fn test_inputs_are_not_modified() {
		let src = dir("", vec![dir("a", vec![], vec![file("1")])], vec![file("top")]);
		let dest = dir("", vec![dir("b", vec![], vec![flagged_file("2", false, true)])], vec![]);
		let (src_before, dest_before) = (src.clone(), dest.clone());

		let _ = merge(&src, &dest);
		assert_eq!(src, src_before);
		assert_eq!(dest, dest_before);
	}

	#[test]
	fn test_subdirs_are_sorted() {
		let mut forced = dir("m", vec![], vec![]);
		forced.force_copy = true;
		let src = dir("", vec![dir("z", vec![], vec![]), forced], vec![]);
		let dest = dir("", vec![dir("a", vec![], vec![])], vec![]);

		let plan = merge(&src, &dest);
		let order: Vec<&str> = plan.subdirs.iter().map(|d| d.name.as_str()).collect();
		assert_eq!(order, vec!["a", "m", "z"]);
	}
}
