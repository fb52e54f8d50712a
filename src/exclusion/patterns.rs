//! Case-insensitive shell-style wildcard matching

use glob::{MatchOptions, Pattern};

use crate::logging::*;

/// `*` and `?` cross `/` and leading dots, like `fnmatch` without flags.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
	case_sensitive: false,
	require_literal_separator: false,
	require_literal_leading_dot: false,
};

/// A compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct WildcardPattern {
	source: String,
	compiled: Pattern,
}

impl WildcardPattern {
	/// Compile a pattern
	///
	/// A pattern that is not a valid wildcard (e.g. an unclosed `[`) is
	/// matched literally instead.
	pub fn new(pattern: &str) -> Self {
		let compiled = match Pattern::new(pattern) {
			Ok(p) => p,
			Err(e) => {
				warn!("Pattern {:?} is not a valid wildcard ({}), matching it literally", pattern, e);
				// An escaped pattern always compiles
				Pattern::new(&Pattern::escape(pattern)).unwrap_or_default()
			}
		};
		Self { source: pattern.to_string(), compiled }
	}

	/// The pattern as written in the rule file
	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn matches(&self, candidate: &str) -> bool {
		self.compiled.matches_with(candidate, MATCH_OPTIONS)
	}
}

/// Match `candidate` against a single wildcard `pattern`
pub fn wildcard_match(candidate: &str, pattern: &str) -> bool {
	WildcardPattern::new(pattern).matches(candidate)
}
