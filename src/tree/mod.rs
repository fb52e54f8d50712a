//! In-memory directory trees
//!
//! The same node types describe three things: the annotated source tree,
//! the annotated destination tree, and the reconciliation plan that merges
//! them. Each directory owns its children; traversal is always top-down.

mod builder;

pub use builder::{build_destination_tree, build_source_tree, list_dir, Listing};

/// One file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileEntry {
	pub name: String,
	pub force_copy: bool,
	pub ignore: bool,
}

impl FileEntry {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), ..Default::default() }
	}
}

/// One directory and its children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirEntry {
	/// Path segment relative to the parent (empty for a root)
	pub name: String,
	pub force_copy: bool,
	pub ignore: bool,
	/// Never bulk-delete this directory (plan trees only)
	pub preserve: bool,
	pub subdirs: Vec<DirEntry>,
	pub files: Vec<FileEntry>,
}

impl DirEntry {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), ..Default::default() }
	}

	/// An unnamed root node
	pub fn root() -> Self {
		Self::default()
	}

	pub fn subdir(&self, name: &str) -> Option<&DirEntry> {
		self.subdirs.iter().find(|d| d.name == name)
	}

	pub fn file(&self, name: &str) -> Option<&FileEntry> {
		self.files.iter().find(|f| f.name == name)
	}

	/// Look up a descendant directory by `/`-separated relative path
	pub fn find_dir(&self, relative: &str) -> Option<&DirEntry> {
		relative
			.split('/')
			.filter(|s| !s.is_empty())
			.try_fold(self, |dir, segment| dir.subdir(segment))
	}

	/// Every file and directory below this node as `/`-separated relative
	/// paths, directories with a trailing `/`
	pub fn paths(&self) -> Vec<String> {
		let mut out = Vec::new();
		self.collect_paths("", &mut out);
		out
	}

	fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
		for file in &self.files {
			out.push(format!("{}{}", prefix, file.name));
		}
		for dir in &self.subdirs {
			let nested = format!("{}{}/", prefix, dir.name);
			out.push(nested.clone());
			dir.collect_paths(&nested, out);
		}
	}
}

/// Join a root-relative prefix and a name with `/`
pub(crate) fn join_relative(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{}/{}", prefix, name)
	}
}
