//! Public sync API
//!
//! A run processes each destination in order. Every destination gets its
//! own pass: build the source and destination trees, merge them into a
//! plan, then execute the plan. The first failed mutation aborts the run.
//!
//! ```rust,ignore
//! use treesync::sync::SyncBuilder;
//!
//! let report = SyncBuilder::new()
//!     .source("/data/master")
//!     .add_destination("/mnt/usb/master")
//!     .dry_run(true)
//!     .run()?;
//! println!("{} changes", report.total().changes());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SyncError;
use crate::exclusion::Rules;
use crate::executor::{Executor, FileCopier, SyncStats};
use crate::logging::*;
use crate::reconcile::merge;
use crate::tree::{build_destination_tree, build_source_tree, DirEntry};

/// Result of one destination pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationReport {
	pub destination: PathBuf,
	pub stats: SyncStats,
}

/// Result of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub destinations: Vec<DestinationReport>,
}

impl SyncReport {
	/// Stats summed over all destinations
	pub fn total(&self) -> SyncStats {
		self.destinations.iter().fold(SyncStats::default(), |mut acc, d| {
			acc.files_copied += d.stats.files_copied;
			acc.files_skipped += d.stats.files_skipped;
			acc.files_removed += d.stats.files_removed;
			acc.dirs_created += d.stats.dirs_created;
			acc.dirs_removed += d.stats.dirs_removed;
			acc.dirs_preserved += d.stats.dirs_preserved;
			acc
		})
	}
}

/// Build the reconciliation plan for one destination
pub fn plan(source: &Path, destination: &Path, rules: &Rules) -> Result<DirEntry, SyncError> {
	let src_tree = build_source_tree(source, &rules.force_copy, &rules.source_ignore)?;
	let dest_tree = build_destination_tree(destination, &rules.destination_ignore)?;
	Ok(merge(&src_tree, &dest_tree))
}

/// Reconcile one destination with the source
pub fn sync_destination(
	source: &Path,
	destination: &Path,
	rules: &Rules,
	executor: &mut Executor,
) -> Result<(), SyncError> {
	let plan = plan(source, destination, rules)?;
	executor.apply(source, destination, &plan)
}

/// Keep the candidates that are existing directories other than the source
///
/// Dropped candidates are logged, not treated as errors.
pub fn usable_destinations(source: &Path, candidates: &[PathBuf]) -> Vec<PathBuf> {
	let source_canonical = fs::canonicalize(source).ok();

	candidates
		.iter()
		.filter(|candidate| {
			if !candidate.is_dir() {
				warn!("Destination {} does not exist, skipping", candidate.display());
				return false;
			}
			if source_canonical.is_some() && fs::canonicalize(candidate).ok() == source_canonical {
				warn!("Destination {} is the source itself, skipping", candidate.display());
				return false;
			}
			true
		})
		.cloned()
		.collect()
}

/// Builder for a sync run
#[derive(Default)]
pub struct SyncBuilder {
	source: Option<PathBuf>,
	destinations: Vec<PathBuf>,
	rules: Rules,
	dry_run: bool,
	copier: Option<Arc<dyn FileCopier>>,
}

impl SyncBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
		self.source = Some(path.into());
		self
	}

	pub fn add_destination(mut self, path: impl Into<PathBuf>) -> Self {
		self.destinations.push(path.into());
		self
	}

	pub fn destinations<I, P>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		self.destinations.extend(paths.into_iter().map(Into::into));
		self
	}

	pub fn rules(mut self, rules: Rules) -> Self {
		self.rules = rules;
		self
	}

	pub fn dry_run(mut self, dry_run: bool) -> Self {
		self.dry_run = dry_run;
		self
	}

	/// Replace the file copier used by the executor
	pub fn copier(mut self, copier: Arc<dyn FileCopier>) -> Self {
		self.copier = Some(copier);
		self
	}

	/// Validate the inputs and process every destination in order
	pub fn run(self) -> Result<SyncReport, SyncError> {
		let source = self
			.source
			.ok_or_else(|| SyncError::InvalidConfig { message: "no source directory given".into() })?;
		if !source.is_dir() {
			return Err(SyncError::InvalidSource { path: source });
		}

		let destinations = usable_destinations(&source, &self.destinations);
		if destinations.is_empty() {
			return Err(SyncError::NoDestinations);
		}

		let mut report = SyncReport::default();
		for destination in destinations {
			info!("Syncing {} -> {}", source.display(), destination.display());

			let mut executor = Executor::new(self.dry_run);
			if let Some(copier) = &self.copier {
				executor = executor.with_copier(Arc::clone(copier));
			}
			sync_destination(&source, &destination, &self.rules, &mut executor)?;

			let stats = executor.into_stats();
			info!(
				"{}: {} copied, {} skipped, {} removed, {} directories created, {} removed, {} preserved",
				destination.display(),
				stats.files_copied,
				stats.files_skipped,
				stats.files_removed,
				stats.dirs_created,
				stats.dirs_removed,
				stats.dirs_preserved
			);
			report.destinations.push(DestinationReport { destination, stats });
		}
		Ok(report)
	}
}
