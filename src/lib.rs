//! # treesync - One-way directory tree mirroring
//!
//! treesync makes one or more destination trees mirror a source tree.
//! Newer source files are copied over, destination entries with no source
//! counterpart are removed, and three rule sets adjust that behaviour:
//!
//! - **force-copy**: always copy, regardless of timestamps;
//! - **source-ignore**: pretend the source entry does not exist;
//! - **destination-ignore**: never delete the destination entry, and keep
//!   every directory on its path.
//!
//! Every destructive mutation is preceded by a rename-aside backup, so a
//! failure leaves the affected path as it was.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use treesync::exclusion::Rules;
//! use treesync::sync::SyncBuilder;
//!
//! let rules = Rules::load_dir("/etc/treesync".as_ref())?;
//! let report = SyncBuilder::new()
//!     .source("/data/master")
//!     .add_destination("/mnt/usb1/master")
//!     .add_destination("/mnt/usb2/master")
//!     .rules(rules)
//!     .run()?;
//! println!("{} files copied", report.total().files_copied);
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod logging;
pub mod metadata;
pub mod reconcile;
pub mod sync;
pub mod tree;

// Re-export commonly used types and functions
pub use config::SyncConfig;
pub use error::SyncError;
pub use exclusion::{ExclusionError, PatternClass, RuleSet, Rules};
pub use executor::{FileCopier, StdCopier, SyncStats};
pub use sync::{SyncBuilder, SyncReport};
pub use tree::{DirEntry, FileEntry};

// vim: ts=4
