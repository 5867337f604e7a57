//! File name filters of the form `*.txt;*.md`.
//!
//! Matching is a plain case-sensitive suffix comparison. The only
//! metacharacter is the leading `*.`; `*.*` matches every file.

use std::fmt;

use thiserror::Error;

pub const DEFAULT_FILTER: &str = "*.txt";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter '{0}' contains no '*.<ext>' pattern")]
    NoPatterns(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFilter {
    /// `*.*`
    Any,
    /// Dotted suffixes, e.g. `[".txt", ".md"]`.
    Suffixes(Vec<String>),
}

impl FileFilter {
    /// Parse a `;`-separated filter expression. Blank input means `*.txt`.
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        let expr = expr.trim();
        let expr = if expr.is_empty() { DEFAULT_FILTER } else { expr };

        let mut suffixes = Vec::new();
        for pattern in expr.split(';').map(str::trim) {
            if pattern == "*.*" {
                return Ok(Self::Any);
            }
            let Some(ext) = pattern.strip_prefix("*.") else {
                continue;
            };
            if ext.is_empty() {
                continue;
            }
            suffixes.push(format!(".{ext}"));
        }

        if suffixes.is_empty() {
            return Err(FilterError::NoPatterns(expr.to_string()));
        }
        Ok(Self::Suffixes(suffixes))
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.matched_suffix(file_name).is_some()
    }

    /// The suffix that matched `file_name`, or `""` for [`FileFilter::Any`].
    pub fn matched_suffix(&self, file_name: &str) -> Option<&str> {
        match self {
            Self::Any => Some(""),
            Self::Suffixes(suffixes) => suffixes
                .iter()
                .find(|s| file_name.ends_with(s.as_str()))
                .map(String::as_str),
        }
    }
}

impl fmt::Display for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*.*"),
            Self::Suffixes(suffixes) => {
                let patterns: Vec<String> = suffixes.iter().map(|s| format!("*{s}")).collect();
                write!(f, "{}", patterns.join(";"))
            }
        }
    }
}
