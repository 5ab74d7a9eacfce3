//! `convoy-scheduler`: durable schedules that launch agent sessions.
//!
//! # Overview
//!
//! Schedules live in a [`store::ScheduleStore`]; the reference
//! implementation keeps one JSON record per schedule in a
//! [`convoy_records::RecordBackend`]. A [`worker::Worker`] polls the store
//! every `check_interval` and hands due schedules to the
//! [`executor::ScheduleExecutor`], which creates sessions through a
//! [`convoy_sessions::SessionManager`] and records the outcome.
//! [`leader_worker::LeaderWorker`] ties the worker to leader election so only
//! one replica executes at a time.
//!
//! # Timing
//!
//! | Fields set                   | Behaviour                                     |
//! |------------------------------|-----------------------------------------------|
//! | `scheduled_at`               | Fires once, then `completed`                  |
//! | `cron_expr`                  | Fires on every match in `timezone`            |
//! | both                         | `scheduled_at` anchors the first cron run     |

pub mod cron;
pub mod error;
pub mod executor;
pub mod leader_worker;
pub mod service;
pub mod store;
pub mod types;
pub mod worker;

pub use error::{Result, SchedulerError};
pub use executor::{build_session_request, ScheduleExecutor};
pub use leader_worker::LeaderWorker;
pub use service::ScheduleService;
pub use store::{MigrationReport, RecordScheduleStore, ScheduleStore, StoreLayout};
pub use types::{
    ExecutionRecord, ExecutionStatus, Schedule, ScheduleFilter, ScheduleStatus, Scope,
    SessionConfig, SessionParams,
};
pub use worker::{PassSummary, Worker, WorkerConfig};
