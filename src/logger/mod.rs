//! Activity logging: JSONL append-only file with graceful degradation and an
//! in-memory tail.

pub mod activity;
pub mod jsonl;
