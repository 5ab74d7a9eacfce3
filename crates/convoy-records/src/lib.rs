//! `convoy-records`: namespaced, label-indexed record storage.
//!
//! # Overview
//!
//! A record is an opaque JSON document addressed by a deterministic name and
//! tagged with string labels. Backends provide two capabilities:
//!
//! | Capability        | Operations                                  |
//! |-------------------|---------------------------------------------|
//! | [`KeyValueStore`] | create / get / update / delete by name      |
//! | [`LabelIndex`]    | list every record carrying `key=value`      |
//!
//! Anything implementing both is a [`RecordBackend`]. Two implementations
//! ship here: [`MemoryBackend`] (process-local) and [`SqliteBackend`].

pub mod backend;
pub mod db;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use backend::{KeyValueStore, LabelIndex, RecordBackend};
pub use error::{RecordError, Result};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use types::{sanitize_label_value, Record};
