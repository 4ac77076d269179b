// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the webhook endpoints.
//!
//! These tests drive the axum router in-process, without a listener or a
//! Kubernetes cluster.
//!
//! ```bash
//! cargo test --test functional
//! ```

#[path = "../common/mod.rs"]
mod common;

mod envelope_tests;
mod settings_tests;
