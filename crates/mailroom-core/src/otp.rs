//! One-time verification codes.
//!
//! Codes live in memory only and are keyed by whatever the caller
//! authenticates (usually an address). Share one store per process through
//! an `Arc`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;

/// How long an issued code stays valid.
pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(10 * 60);

/// Verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    /// No live code for the key: never issued, already used, or timed out.
    #[error("Verification session expired")]
    Expired,
    /// A live code exists but does not match.
    #[error("Verification code does not match")]
    Mismatch,
}

#[derive(Debug)]
struct Entry {
    code: String,
    issued_at: Instant,
}

/// In-memory store of pending codes with a time-to-live.
#[derive(Debug)]
pub struct OtpStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_OTP_TTL)
    }
}

impl OtpStore {
    /// Store with the default ten-minute lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a custom lifetime.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Code lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // entries stay consistent across a panicking holder
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a fresh six-digit code for `key`, replacing any earlier one.
    #[must_use]
    pub fn issue(&self, key: &str) -> String {
        self.issue_at(key, Instant::now())
    }

    /// [`OtpStore::issue`] with an explicit clock.
    #[must_use]
    pub fn issue_at(&self, key: &str, now: Instant) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        self.entries().insert(
            key.to_string(),
            Entry {
                code: code.clone(),
                issued_at: now,
            },
        );
        tracing::debug!(key, "verification code issued");
        code
    }

    /// Checks `code` against the live code for `key`.
    ///
    /// A match consumes the code. A mismatch keeps it so the user can retry.
    ///
    /// # Errors
    ///
    /// [`OtpError::Expired`] when no live code exists, [`OtpError::Mismatch`]
    /// when the code differs.
    pub fn verify(&self, key: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(key, code, Instant::now())
    }

    /// [`OtpStore::verify`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`OtpStore::verify`].
    pub fn verify_at(&self, key: &str, code: &str, now: Instant) -> Result<(), OtpError> {
        let mut entries = self.entries();
        let Some(entry) = entries.get(key) else {
            return Err(OtpError::Expired);
        };

        if now.saturating_duration_since(entry.issued_at) > self.ttl {
            entries.remove(key);
            tracing::debug!(key, "verification code expired");
            return Err(OtpError::Expired);
        }
        if entry.code != code.trim() {
            tracing::debug!(key, "verification code mismatch");
            return Err(OtpError::Mismatch);
        }

        entries.remove(key);
        tracing::debug!(key, "verification code accepted");
        Ok(())
    }

    /// Drops every expired code. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// [`OtpStore::purge_expired`] with an explicit clock.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.issued_at) <= self.ttl);
        before - entries.len()
    }

    /// Number of codes held, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no codes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const KEY: &str = "ana@example.com";

    #[test]
    fn test_code_shape() {
        let store = OtpStore::new();
        for _ in 0..50 {
            let code = store.issue(KEY);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_match_is_single_use() {
        let store = OtpStore::new();
        let code = store.issue(KEY);

        assert_eq!(store.verify(KEY, &code), Ok(()));
        assert_eq!(store.verify(KEY, &code), Err(OtpError::Expired));
    }

    #[test]
    fn test_mismatch_keeps_code() {
        let store = OtpStore::new();
        let code = store.issue(KEY);
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(store.verify(KEY, wrong), Err(OtpError::Mismatch));
        assert_eq!(store.verify(KEY, &code), Ok(()));
    }

    #[test]
    fn test_unknown_key_is_expired() {
        let store = OtpStore::new();
        assert_eq!(store.verify(KEY, "123456"), Err(OtpError::Expired));
    }

    #[test]
    fn test_reissue_replaces_code() {
        let store = OtpStore::new();
        let start = Instant::now();
        let first = store.issue_at(KEY, start);
        let second = store.issue_at(KEY, start);

        if first != second {
            assert_eq!(store.verify_at(KEY, &first, start), Err(OtpError::Mismatch));
        }
        assert_eq!(store.verify_at(KEY, &second, start), Ok(()));
    }

    #[test]
    fn test_expiry() {
        let store = OtpStore::with_ttl(Duration::from_secs(60));
        let start = Instant::now();
        let code = store.issue_at(KEY, start);

        let late = start + Duration::from_secs(61);
        assert_eq!(store.verify_at(KEY, &code, late), Err(OtpError::Expired));
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = OtpStore::with_ttl(Duration::from_secs(60));
        let start = Instant::now();
        let _ = store.issue_at("old", start);
        let _ = store.issue_at("new", start + Duration::from_secs(50));

        assert_eq!(store.purge_expired_at(start + Duration::from_secs(70)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let store = Arc::new(OtpStore::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.issue(&format!("user-{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 4);
    }
}
