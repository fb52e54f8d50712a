//! Rule file line classification
//!
//! ```text
//! # comment
//! *.tmp          file, by basename
//! /notes.txt     file, by path relative to the root
//! .git/          directory, by basename
//! /vendor/cache/ directory, by path relative to the root
//! ```

use super::PatternClass;

/// Classify one rule-file line
///
/// Returns `None` for blank lines, comments, and lines that are empty once
/// their marker slashes are stripped.
pub fn classify_line(line: &str) -> Option<(PatternClass, String)> {
	let line = line.trim();
	if line.is_empty() || line.starts_with('#') {
		return None;
	}

	let starts = line.starts_with('/');
	let ends = line.ends_with('/');
	let (class, pattern) = if starts && ends && line.len() >= 2 {
		(PatternClass::DirRelative, &line[1..line.len() - 1])
	} else if ends && !starts {
		(PatternClass::DirBasename, &line[..line.len() - 1])
	} else if starts && !ends {
		(PatternClass::FileRelative, &line[1..])
	} else if !starts {
		(PatternClass::FileBasename, line)
	} else {
		// a lone "/"
		return None;
	};

	if pattern.is_empty() {
		return None;
	}
	Some((class, pattern.to_string()))
}

/// Classify every line of a rule file, keeping file order
pub fn parse_rule_lines(contents: &str) -> Vec<(PatternClass, String)> {
	contents.lines().filter_map(classify_line).collect()
}
