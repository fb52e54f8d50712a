//! Configuration for treesync runs
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`SyncConfig::default()`)
//! 2. Config file (TOML, `--config`)
//! 3. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::exclusion::{Rules, DESTINATION_IGNORE_FILE, FORCE_COPY_FILE, SOURCE_IGNORE_FILE};
use crate::logging::*;

/// Default depth for destination discovery
pub const DEFAULT_SEARCH_DEPTH: usize = 3;

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
	/// Source root
	pub source: Option<PathBuf>,

	/// Destination roots, in processing order
	pub destinations: Vec<PathBuf>,

	/// File listing more destination roots, one per line
	pub destinations_file: Option<PathBuf>,

	/// Directories searched for destinations named like the source
	pub search_roots: Vec<PathBuf>,

	/// Maximum depth below each search root
	pub search_depth: usize,

	/// Directory holding the three rule files under their default names
	pub rules_dir: Option<PathBuf>,

	pub force_copy_rules: Option<PathBuf>,
	pub source_ignore_rules: Option<PathBuf>,
	pub destination_ignore_rules: Option<PathBuf>,

	/// Plan and log without touching the filesystem
	pub dry_run: bool,

	pub verbose: bool,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			source: None,
			destinations: Vec::new(),
			destinations_file: None,
			search_roots: Vec::new(),
			search_depth: DEFAULT_SEARCH_DEPTH,
			rules_dir: None,
			force_copy_rules: None,
			source_ignore_rules: None,
			destination_ignore_rules: None,
			dry_run: false,
			verbose: false,
		}
	}
}

impl SyncConfig {
	/// Parse a TOML configuration
	pub fn from_toml_str(contents: &str) -> Result<Self, SyncError> {
		toml::from_str(contents).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })
	}

	/// Load a TOML configuration file
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		let contents = fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("cannot read {}: {}", path.display(), e),
		})?;
		let config = Self::from_toml_str(&contents)?;
		debug!("Loaded configuration from {}", path.display());
		Ok(config)
	}

	/// Path of one rule file: the explicit setting, else its default name in
	/// `rules_dir`, else none
	fn rule_path(&self, explicit: &Option<PathBuf>, default_name: &str) -> Option<PathBuf> {
		explicit.clone().or_else(|| self.rules_dir.as_ref().map(|dir| dir.join(default_name)))
	}

	/// Load the three rule sets
	pub fn load_rules(&self) -> Result<Rules, SyncError> {
		let force_copy = self.rule_path(&self.force_copy_rules, FORCE_COPY_FILE);
		let source_ignore = self.rule_path(&self.source_ignore_rules, SOURCE_IGNORE_FILE);
		let destination_ignore =
			self.rule_path(&self.destination_ignore_rules, DESTINATION_IGNORE_FILE);

		let rules = Rules::load(
			force_copy.as_deref(),
			source_ignore.as_deref(),
			destination_ignore.as_deref(),
		)?;
		Ok(rules)
	}

	/// Source root, required
	pub fn source(&self) -> Result<&Path, SyncError> {
		self.source
			.as_deref()
			.ok_or_else(|| SyncError::InvalidConfig { message: "no source directory given".into() })
	}

	/// Every configured destination candidate, unfiltered
	///
	/// Explicit destinations come first, then the destinations file, then
	/// discovered directories. Duplicates are dropped.
	pub fn destination_candidates(&self) -> Result<Vec<PathBuf>, SyncError> {
		let mut candidates = self.destinations.clone();

		if let Some(list) = &self.destinations_file {
			candidates.extend(read_destination_list(list)?);
		}

		if !self.search_roots.is_empty() {
			let source = self.source()?;
			candidates.extend(discover_destinations(source, &self.search_roots, self.search_depth));
		}

		let mut seen = BTreeSet::new();
		candidates.retain(|p| seen.insert(p.clone()));
		Ok(candidates)
	}
}

/// Read a destination list: one path per line, `#` comments and blank
/// lines skipped
pub fn read_destination_list(path: &Path) -> Result<Vec<PathBuf>, SyncError> {
	let contents = fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
		message: format!("cannot read destination list {}: {}", path.display(), e),
	})?;
	Ok(contents
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(PathBuf::from)
		.collect())
}

/// Find directories below `roots` that share the source's name
///
/// Matches are not descended into. Symlinked directories are not followed.
pub fn discover_destinations(source: &Path, roots: &[PathBuf], max_depth: usize) -> Vec<PathBuf> {
	let wanted = match source.file_name() {
		Some(name) => name.to_os_string(),
		None => return Vec::new(),
	};
	let source_canonical = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());

	let mut found = Vec::new();
	for root in roots {
		let mut in_root = Vec::new();
		let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
		queue.push_back((root.clone(), 0));

		while let Some((dir, depth)) = queue.pop_front() {
			if depth >= max_depth {
				continue;
			}
			let entries = match fs::read_dir(&dir) {
				Ok(e) => e,
				Err(e) => {
					debug!("Cannot search {}: {}", dir.display(), e);
					continue;
				}
			};

			for entry in entries.flatten() {
				let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
				if !is_dir {
					continue;
				}
				let path = entry.path();
				if entry.file_name() == wanted {
					let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
					if canonical != source_canonical {
						in_root.push(path);
					}
					continue;
				}
				queue.push_back((path, depth + 1));
			}
		}

		in_root.sort();
		debug!("Found {} destination candidates below {}", in_root.len(), root.display());
		found.extend(in_root);
	}
	found
}
