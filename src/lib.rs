//! Webhook service that turns merge/pull-request events into persisted
//! business-reasoning records.
//!
//! Deliveries from GitLab, GitHub, and Gitea are normalized into one
//! canonical event shape, deduplicated on request state, enriched with
//! diffs and commits from the platform REST API, summarized by an LLM,
//! and appended to a SQLite log.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod env;
pub mod models;
pub mod orchestrator;
pub mod platforms;
pub mod providers;
pub mod reasoning;
pub mod server;
pub mod storage;
