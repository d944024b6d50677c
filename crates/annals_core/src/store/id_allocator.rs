//! Sequential `prefix-NNN` identifier allocation.
//!
//! # Responsibility
//! - Derive the next free entity id from the ids currently in the store.
//!
//! # Invariants
//! - The scan runs against the live id set on every call; nothing is cached,
//!   so ids must be requested one at a time, after the previous insert.
//! - Allocated suffixes are strictly greater than every well-formed suffix
//!   present.
//! - Malformed ids are skipped, never fatal.

use log::warn;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_ID_PREFIX: &str = "char";
pub const DEFAULT_ID_WIDTH: usize = 3;

/// Errors raised while parsing identifiers during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    /// Id carries the allocator prefix but not a numeric suffix.
    MalformedIdentifier(String),
    /// Prefix is empty or contains characters outside `[A-Za-z0-9_]`.
    InvalidPrefix(String),
    /// The highest suffix in use is already `u64::MAX`.
    Exhausted(String),
}

impl Display for AllocatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedIdentifier(id) => write!(f, "malformed identifier: {id}"),
            Self::InvalidPrefix(prefix) => write!(f, "invalid id prefix: `{prefix}`"),
            Self::Exhausted(prefix) => write!(f, "no free `{prefix}` ids left"),
        }
    }
}

impl Error for AllocatorError {}

/// Result of scanning a live id set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdScan {
    /// Highest well-formed numeric suffix, if any.
    pub max: Option<u64>,
    /// Widest well-formed suffix seen, in digits.
    pub width: usize,
    /// Ids that carried the prefix but could not be parsed.
    pub malformed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    min_width: usize,
    pattern: Regex,
}

impl IdAllocator {
    /// Creates an allocator for `prefix-NNN` ids zero-padded to at least
    /// `min_width` digits.
    pub fn new(prefix: &str, min_width: usize) -> Result<Self, AllocatorError> {
        let prefix = prefix.trim();
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AllocatorError::InvalidPrefix(prefix.to_string()));
        }
        let pattern = Regex::new(&format!(r"^{}-(\d+)$", regex::escape(prefix)))
            .map_err(|_| AllocatorError::InvalidPrefix(prefix.to_string()))?;
        Ok(Self {
            prefix: prefix.to_string(),
            min_width: min_width.max(1),
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parses the numeric suffix of one id.
    ///
    /// Returns `Ok(None)` for ids belonging to another prefix.
    pub fn parse_sequence(&self, id: &str) -> Result<Option<(u64, usize)>, AllocatorError> {
        if let Some(caps) = self.pattern.captures(id) {
            let digits = &caps[1];
            return digits
                .parse::<u64>()
                .map(|value| Some((value, digits.len())))
                .map_err(|_| AllocatorError::MalformedIdentifier(id.to_string()));
        }
        let owned_prefix = id
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'));
        if owned_prefix {
            return Err(AllocatorError::MalformedIdentifier(id.to_string()));
        }
        Ok(None)
    }

    /// Scans `ids` for the highest well-formed suffix.
    pub fn scan<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> IdScan {
        let mut scan = IdScan::default();
        for id in ids {
            match self.parse_sequence(id) {
                Ok(Some((value, width))) => {
                    scan.max = Some(scan.max.map_or(value, |max| max.max(value)));
                    scan.width = scan.width.max(width);
                }
                Ok(None) => {}
                Err(AllocatorError::MalformedIdentifier(id)) => {
                    warn!("event=id_scan module=allocator status=skipped reason=malformed_identifier id={id}");
                    scan.malformed.push(id);
                }
                Err(_) => {}
            }
        }
        scan
    }

    /// Returns the next unused id for the given live id set.
    ///
    /// # Errors
    /// - `Exhausted` when the highest suffix cannot be incremented.
    pub fn next<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<String, AllocatorError> {
        let scan = self.scan(ids);
        let next = match scan.max {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| AllocatorError::Exhausted(self.prefix.clone()))?,
        };
        let width = self.min_width.max(scan.width);
        Ok(format!("{}-{:0width$}", self.prefix, next, width = width))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX, DEFAULT_ID_WIDTH).expect("default id prefix is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocatorError, IdAllocator};

    #[test]
    fn empty_store_starts_at_one() {
        let allocator = IdAllocator::default();
        assert_eq!(allocator.next(Vec::<&str>::new()).unwrap(), "char-001");
    }

    #[test]
    fn next_uses_max_not_count() {
        let allocator = IdAllocator::default();
        assert_eq!(allocator.next(["char-001", "char-007", "char-003"]).unwrap(), "char-008");
    }

    #[test]
    fn malformed_and_foreign_ids_are_skipped() {
        let allocator = IdAllocator::default();
        let scan = allocator.scan(["char-002", "char-x9", "event-050", "character-9"]);
        assert_eq!(scan.max, Some(2));
        assert_eq!(scan.malformed, vec!["char-x9".to_string()]);
        assert_eq!(
            allocator.next(["char-002", "char-x9", "event-050"]).unwrap(),
            "char-003"
        );
    }

    #[test]
    fn width_follows_existing_ids_and_grows_on_overflow() {
        let allocator = IdAllocator::default();
        assert_eq!(allocator.next(["char-0041"]).unwrap(), "char-0042");
        assert_eq!(allocator.next(["char-999"]).unwrap(), "char-1000");
    }

    #[test]
    fn highest_possible_suffix_exhausts_the_allocator() {
        let allocator = IdAllocator::default();
        assert_eq!(
            allocator.next(["char-18446744073709551615"]).unwrap_err(),
            AllocatorError::Exhausted("char".into())
        );
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        assert_eq!(
            IdAllocator::new("ch ar", 3).unwrap_err(),
            AllocatorError::InvalidPrefix("ch ar".into())
        );
        assert!(IdAllocator::new("", 3).is_err());
    }

    #[test]
    fn overlong_suffix_is_malformed() {
        let allocator = IdAllocator::default();
        let err = allocator
            .parse_sequence("char-99999999999999999999999")
            .unwrap_err();
        assert!(matches!(err, AllocatorError::MalformedIdentifier(_)));
    }
}
