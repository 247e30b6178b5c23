//! Folio: queued document generation and notification delivery.
//!
//! Submitted entries are turned into ordered batches of tasks: documents are
//! rendered into a content-addressed cache, then the notification that
//! carries them is sent. Batches persist across restarts and each task is
//! retried a bounded number of times.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
