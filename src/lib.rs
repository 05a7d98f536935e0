//! Candidate evidence verification engine
//!
//! This library queues per-aspect verification jobs for candidate evidence
//! (résumé, transcript, project links and a gated full-profile pass), claims
//! them exclusively from PostgreSQL, scores them through an injected
//! assessment service and maintains each candidate's aggregate trust score.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
