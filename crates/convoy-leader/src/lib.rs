//! `convoy-leader`: lease-based leader election.
//!
//! Replicas compete for one named lease. The holder renews it every
//! `retry_period`; a challenger may take it over once it has gone
//! `lease_duration` without renewal. [`LeaderElector::run`] drives the
//! protocol and tells a [`LeadershipHandler`] when leadership starts and stops.
//!
//! Leadership is "almost exclusive": a departing leader may still be
//! finishing work when the next one starts.

pub mod db;
pub mod elector;
pub mod error;
pub mod lease;
pub mod memory;
pub mod sqlite;

pub use elector::{generate_identity, ElectorConfig, LeaderElector, LeadershipHandler};
pub use error::{LeaderError, Result};
pub use lease::{AcquireOutcome, Lease, LeaseRecord};
pub use memory::MemoryLease;
pub use sqlite::SqliteLease;
