//! Rule sets deciding which entries are force-copied or ignored
//!
//! A [`RuleSet`] holds four ordered pattern lists, one per [`PatternClass`].
//! A run uses three of them, grouped in [`Rules`].

mod patterns;
mod rules_file;

pub use patterns::{wildcard_match, WildcardPattern};
pub use rules_file::{classify_line, parse_rule_lines};

use std::path::{Path, PathBuf};

use crate::logging::*;

/// Which part of an entry a pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternClass {
	/// File, matched by final path segment
	FileBasename,
	/// File, matched by path relative to the tree root
	FileRelative,
	/// Directory, matched by final path segment
	DirBasename,
	/// Directory, matched by path relative to the tree root
	DirRelative,
}

impl PatternClass {
	pub const ALL: [PatternClass; 4] = [
		PatternClass::FileBasename,
		PatternClass::FileRelative,
		PatternClass::DirBasename,
		PatternClass::DirRelative,
	];

	fn index(self) -> usize {
		match self {
			PatternClass::FileBasename => 0,
			PatternClass::FileRelative => 1,
			PatternClass::DirBasename => 2,
			PatternClass::DirRelative => 3,
		}
	}
}

/// Four ordered pattern lists, one per [`PatternClass`]
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
	classes: [Vec<WildcardPattern>; 4],
}

impl RuleSet {
	/// Create an empty rule set
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a pattern to the given class
	pub fn add(&mut self, class: PatternClass, pattern: &str) {
		self.classes[class.index()].push(WildcardPattern::new(pattern));
	}

	/// Builder-style [`RuleSet::add`]
	pub fn with(mut self, class: PatternClass, pattern: &str) -> Self {
		self.add(class, pattern);
		self
	}

	/// Patterns of one class, in insertion order
	pub fn patterns(&self, class: PatternClass) -> &[WildcardPattern] {
		&self.classes[class.index()]
	}

	pub fn is_empty(&self) -> bool {
		self.classes.iter().all(Vec::is_empty)
	}

	/// Total number of patterns across all classes
	pub fn len(&self) -> usize {
		self.classes.iter().map(Vec::len).sum()
	}

	/// Check a file by basename and by root-relative path
	pub fn matches_file(&self, basename: &str, relative: &str) -> bool {
		self.any_match(PatternClass::FileBasename, basename)
			|| self.any_match(PatternClass::FileRelative, relative)
	}

	/// Check a directory by basename and by root-relative path
	pub fn matches_dir(&self, basename: &str, relative: &str) -> bool {
		self.any_match(PatternClass::DirBasename, basename)
			|| self.any_match(PatternClass::DirRelative, relative)
	}

	fn any_match(&self, class: PatternClass, candidate: &str) -> bool {
		self.patterns(class).iter().any(|p| p.matches(candidate))
	}

	/// Build a rule set from rule-file text
	pub fn parse(contents: &str) -> Self {
		let mut set = RuleSet::new();
		for (class, pattern) in parse_rule_lines(contents) {
			set.add(class, &pattern);
		}
		set
	}

	/// Load a rule file
	///
	/// A missing file yields an empty set. A file that exists but cannot be
	/// read is an error.
	pub fn load(path: &Path) -> Result<Self, ExclusionError> {
		if !path.exists() {
			debug!("Rule file {} not found, using empty rule set", path.display());
			return Ok(RuleSet::new());
		}
		let contents = std::fs::read_to_string(path)
			.map_err(|e| ExclusionError::RuleFile { path: path.to_path_buf(), source: e })?;
		let set = RuleSet::parse(&contents);
		debug!("Loaded {} patterns from {}", set.len(), path.display());
		Ok(set)
	}
}

/// The three rule sets consulted during one run
#[derive(Debug, Clone, Default)]
pub struct Rules {
	/// Entries copied regardless of timestamps
	pub force_copy: RuleSet,
	/// Source entries invisible to reconciliation
	pub source_ignore: RuleSet,
	/// Destination entries protected from removal
	pub destination_ignore: RuleSet,
}

/// File names looked up inside a rules directory
pub const FORCE_COPY_FILE: &str = "force-copy.rules";
pub const SOURCE_IGNORE_FILE: &str = "source-ignore.rules";
pub const DESTINATION_IGNORE_FILE: &str = "destination-ignore.rules";

impl Rules {
	/// Load the three rule files
	///
	/// `None` means the rule set is not configured and stays empty.
	pub fn load(
		force_copy: Option<&Path>,
		source_ignore: Option<&Path>,
		destination_ignore: Option<&Path>,
	) -> Result<Self, ExclusionError> {
		let load = |path: Option<&Path>| match path {
			Some(p) => RuleSet::load(p),
			None => Ok(RuleSet::new()),
		};
		Ok(Self {
			force_copy: load(force_copy)?,
			source_ignore: load(source_ignore)?,
			destination_ignore: load(destination_ignore)?,
		})
	}

	/// Load the three rule files from their default names in `dir`
	pub fn load_dir(dir: &Path) -> Result<Self, ExclusionError> {
		Self::load(
			Some(&dir.join(FORCE_COPY_FILE)),
			Some(&dir.join(SOURCE_IGNORE_FILE)),
			Some(&dir.join(DESTINATION_IGNORE_FILE)),
		)
	}
}

/// Errors that can occur while loading rules
#[derive(Debug)]
pub enum ExclusionError {
	/// Rule file exists but could not be read
	RuleFile { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::RuleFile { path, source } => {
				write!(f, "Cannot read rule file {}: {}", path.display(), source)
			}
		}
	}
}

impl std::error::Error for ExclusionError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			ExclusionError::RuleFile { source, .. } => Some(source),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_rule_set_classes_are_independent() {
		let set = RuleSet::new()
			.with(PatternClass::FileBasename, "*.log")
			.with(PatternClass::DirBasename, "build");

		assert!(set.matches_file("debug.log", "a/debug.log"));
		assert!(!set.matches_dir("debug.log", "a/debug.log"));
		assert!(set.matches_dir("build", "a/build"));
		assert!(!set.matches_file("build", "a/build"));
	}

	#[test]
	fn test_relative_patterns() {
		let set = RuleSet::new()
			.with(PatternClass::FileRelative, "conf/*.ini")
			.with(PatternClass::DirRelative, "vendor/cache");

		assert!(set.matches_file("app.ini", "conf/app.ini"));
		assert!(!set.matches_file("app.ini", "other/app.ini"));
		assert!(set.matches_dir("cache", "vendor/cache"));
		assert!(!set.matches_dir("cache", "cache"));
	}

	#[test]
	fn test_parse_rule_file_contents() {
		let set = RuleSet::parse(
			r#"
# comment
*.tmp
.git/
/docs/
/top.txt
"#,
		);

		assert_eq!(set.len(), 4);
		assert_eq!(set.patterns(PatternClass::FileBasename)[0].as_str(), "*.tmp");
		assert_eq!(set.patterns(PatternClass::DirBasename)[0].as_str(), ".git");
		assert_eq!(set.patterns(PatternClass::DirRelative)[0].as_str(), "docs");
		assert_eq!(set.patterns(PatternClass::FileRelative)[0].as_str(), "top.txt");
	}

	#[test]
	fn test_missing_rule_file_is_empty() {
		let temp_dir = TempDir::new().unwrap();
		let set = RuleSet::load(&temp_dir.path().join("nope.rules")).unwrap();
		assert!(set.is_empty());
	}

	#[test]
	fn test_unreadable_rule_file_is_error() {
		let temp_dir = TempDir::new().unwrap();
		// A directory exists but cannot be read as text
		let path = temp_dir.path().join("dir.rules");
		fs::create_dir(&path).unwrap();

		let result = RuleSet::load(&path);
		assert!(matches!(result, Err(ExclusionError::RuleFile { .. })));
	}

	#[test]
	fn test_load_dir_uses_default_names() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(temp_dir.path().join(SOURCE_IGNORE_FILE), ".git/\n").unwrap();

		let rules = Rules::load_dir(temp_dir.path()).unwrap();
		assert!(rules.force_copy.is_empty());
		assert!(rules.destination_ignore.is_empty());
		assert!(rules.source_ignore.matches_dir(".git", "a/.git"));
	}
}
