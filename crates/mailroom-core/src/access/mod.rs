//! Access gate.
//!
//! Maps a (primary, secondary) identity pair to a permission verdict and
//! picks the retrieval strategy from it:
//!
//! - **Granted**: the primary may see the secondary's whole cohort
//! - **Not granted**: an explicit `N` record; single correspondent only
//! - **Unknown**: no record at all; treated exactly like not granted
//!
//! Records live in `SQLite`. The store is multi-writer with no application
//! locking; two callers racing to grant the same pair may both insert.
//!
//! # Example
//!
//! ```ignore
//! use mailroom_core::access::{AccessRepository, RetrievalStrategy};
//!
//! let repo = AccessRepository::new("access.db").await?;
//! let verdict = repo.check_access("dr.lee@clinic.org", "9876543210").await?;
//!
//! match RetrievalStrategy::for_verdict(verdict) {
//!     RetrievalStrategy::Cohort => { /* every correspondent of the recipient */ }
//!     RetrievalStrategy::SingleCorrespondent => { /* this sender only */ }
//! }
//! ```

mod model;
mod repository;

pub use model::{AccessFlag, AccessRecord, AccessVerdict, RetrievalStrategy};
pub use repository::AccessRepository;
