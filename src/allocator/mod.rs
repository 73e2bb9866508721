//! Short-code allocation with collision avoidance and a TTL lifecycle.
//!
//! Codes are drawn from a lowercase-alphanumeric alphabet at a length that
//! grows with the mapping table: `max(4, digits(mapping_count))`. The length
//! is monotonically non-decreasing as the table grows, which keeps the
//! collision probability bounded; codes already issued are never renamed.

use chrono::Duration;
use rand::RngExt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::Mapping;
use crate::storage::{Storage, StorageError};
use crate::timefmt;

/// Code alphabet: lowercase ASCII letters plus digits.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const MIN_CODE_LEN: usize = 4;
const MAX_GENERATE_ATTEMPTS: usize = 64;

const MIN_TARGET_LEN: usize = 6; // exclusive
const MAX_TARGET_LEN: usize = 2048; // inclusive

const DEFAULT_TTL_DAYS: i64 = 7;
const EXPIRY_FLOOR_MINUTES: i64 = 5;
const EXPIRY_CEILING_DAYS: i64 = 365 * 50;

pub struct CodeAllocator {
    storage: Arc<dyn Storage>,
}

impl CodeAllocator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Code length for a table of `count` mappings.
    pub fn code_length(count: i64) -> usize {
        MIN_CODE_LEN.max(count.max(0).to_string().len())
    }

    fn random_code(len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// Draw a random free code, redrawing on collision against the store.
    pub async fn generate(&self) -> Result<String> {
        let count = self.storage.mapping_count().await?;
        let len = Self::code_length(count);

        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let code = Self::random_code(len);
            if !self.storage.code_exists(&code).await? {
                return Ok(code);
            }
        }

        Err(Error::CodeSpaceExhausted)
    }

    /// Shorten a target URL into a new mapping.
    ///
    /// With neither `expires_at` nor `permanent` the mapping receives a
    /// default 7-day expiry. An explicit expiry must be in the strict
    /// `DD-MM-YYYY.hh:mm` format and lie between 5 minutes and 50 years
    /// from now.
    pub async fn shorten(
        &self,
        target: &str,
        expires_at: Option<&str>,
        permanent: bool,
        owner: Option<&str>,
    ) -> Result<Mapping> {
        validate_target(target)?;

        if permanent && expires_at.is_some() {
            return Err(Error::PermanentWithExpiry);
        }

        let now = timefmt::now();
        let expires_at = match expires_at {
            Some(raw) => Some(validate_expiry(raw, now)?),
            None if permanent => None,
            None => Some(timefmt::format_expiry(now + Duration::days(DEFAULT_TTL_DAYS))),
        };

        // Identical targets are shortened independently on purpose:
        // deduplicating would let one short code be shared, and later
        // reassigned, across owners.
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mapping = Mapping {
                code: self.generate().await?,
                target: target.to_string(),
                created_at: timefmt::format_entry(now),
                expires_at: expires_at.clone(),
                permanent,
                owner: owner.map(str::to_string),
            };

            match self.storage.insert_mapping(&mapping).await {
                Ok(()) => return Ok(mapping),
                // Lost the generate/insert race to a concurrent allocation;
                // the unique constraint is the backstop, so just redraw.
                Err(StorageError::Conflict) => continue,
                Err(StorageError::Other(e)) => return Err(Error::Storage(e)),
            }
        }

        Err(Error::CodeSpaceExhausted)
    }

    /// Look up a mapping by code.
    pub async fn resolve(&self, code: &str) -> Result<Option<Mapping>> {
        Ok(self.storage.get_mapping(code).await?)
    }

    /// Overwrite the expiry of a mapping, clearing its permanent flag.
    /// Returns `None` for an unknown code.
    pub async fn update_expiry(&self, code: &str, expires_at: &str) -> Result<Option<Mapping>> {
        let expires_at = validate_expiry(expires_at, timefmt::now())?;

        if !self.storage.set_expiry(code, &expires_at).await? {
            return Ok(None);
        }

        Ok(self.storage.get_mapping(code).await?)
    }

    /// Mark a mapping permanent, clearing any expiry. Returns `None` for an
    /// unknown code.
    pub async fn make_permanent(&self, code: &str) -> Result<Option<Mapping>> {
        if !self.storage.set_permanent(code).await? {
            return Ok(None);
        }

        Ok(self.storage.get_mapping(code).await?)
    }

    /// Delete a mapping row. Visit records are left to the caller (or the
    /// reaper) to clean up. Returns false for an unknown code.
    pub async fn delete(&self, code: &str) -> Result<bool> {
        Ok(self.storage.delete_mapping(code).await?)
    }

    /// All mappings created by one owner, newest first.
    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<Mapping>> {
        let mut mappings = self.storage.mappings_for_owner(owner).await?;
        mappings.sort_by_key(|m| {
            std::cmp::Reverse(timefmt::parse_entry(&m.created_at).unwrap_or_default())
        });
        Ok(mappings)
    }
}

fn validate_target(target: &str) -> Result<()> {
    if target.len() <= MIN_TARGET_LEN || target.len() > MAX_TARGET_LEN {
        return Err(Error::TargetLength(target.len()));
    }
    if !has_url_shape(target) {
        return Err(Error::MalformedTarget);
    }
    Ok(())
}

/// URL-shape check: optional http/https scheme, then dot-separated host
/// labels (alphanumeric with interior hyphen groups) ending in a TLD of two
/// or more letters. Anything after the host (path, query, fragment) is
/// accepted as-is.
fn has_url_shape(target: &str) -> bool {
    let rest = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
        .unwrap_or(target);

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    labels[..labels.len() - 1].iter().all(|l| is_host_label(l))
}

fn is_host_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Validate an explicit expiry string: strict format, then a window of
/// [now + 5 minutes, now + 50 years]. Returns the normalized string.
fn validate_expiry(raw: &str, now: chrono::NaiveDateTime) -> Result<String> {
    if !timefmt::check_expiry_format(raw) {
        return Err(Error::MalformedTimestamp);
    }

    let expiry = timefmt::parse_expiry(raw)?;
    let floor = now + Duration::minutes(EXPIRY_FLOOR_MINUTES);
    let ceiling = now + Duration::days(EXPIRY_CEILING_DAYS);
    if expiry < floor || expiry > ceiling {
        return Err(Error::ExpiryOutOfRange);
    }

    Ok(timefmt::format_expiry(expiry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_length_follows_digit_count() {
        // Floor of 4 until the table reaches five digits.
        for (count, expected) in [(0, 4), (9, 4), (999, 4), (1000, 4), (10000, 5)] {
            assert_eq!(CodeAllocator::code_length(count), expected, "count {count}");
        }
        assert_eq!(CodeAllocator::code_length(123_456), 6);
    }

    #[test]
    fn random_code_uses_alphabet() {
        let code = CodeAllocator::random_code(16);
        assert_eq!(code.len(), 16);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn url_shape_accepts_hosts_with_and_without_scheme() {
        for ok in [
            "example.com",
            "http://example.com",
            "https://example.com",
            "https://example.com/page",
            "https://sub.example-site.co.uk/a/b?q=1#frag",
            "my-host.io",
        ] {
            assert!(has_url_shape(ok), "{ok}");
        }
    }

    #[test]
    fn url_shape_rejects_non_hosts() {
        for bad in [
            "not a url",
            "example",
            "example.c",
            "example.123",
            ".example.com",
            "-bad-.com",
            "bad-.com",
            "ftp://example.com",
            "http://",
        ] {
            assert!(!has_url_shape(bad), "{bad}");
        }
    }

    #[test]
    fn expiry_window_is_five_minutes_to_fifty_years() {
        let now = timefmt::now();

        let too_soon = timefmt::format_expiry(now + Duration::minutes(3));
        assert!(matches!(
            validate_expiry(&too_soon, now),
            Err(Error::ExpiryOutOfRange)
        ));

        let too_far = timefmt::format_expiry(now + Duration::days(365 * 51));
        assert!(matches!(
            validate_expiry(&too_far, now),
            Err(Error::ExpiryOutOfRange)
        ));

        let in_an_hour = timefmt::format_expiry(now + Duration::hours(1));
        assert!(validate_expiry(&in_an_hour, now).is_ok());

        assert!(matches!(
            validate_expiry("2030-01-01T10:00", now),
            Err(Error::MalformedTimestamp)
        ));
    }
}
