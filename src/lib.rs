//! task-relay: a persistent work queue for independent worker agents.
//!
//! Worker agents claim tasks, complete or fail them, and a periodic sweep
//! reclaims claims abandoned past their timeout. Claiming is race-safe: the
//! datastore adjudicates concurrent claimants via conditional writes, so
//! exactly one caller wins and the rest observe a benign miss.

pub mod config;
pub mod db;
pub mod error;
pub mod types;
