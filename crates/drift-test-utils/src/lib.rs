//! Shared test utilities for the drift workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not each
//! grow their own temporary-directory helpers. It is a dev-dependency only,
//! never published, and depends on nothing above `drift-fs` so that
//! `drift-core` can use it without a cycle.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`], a temporary directory standing in for a
//!   monitored directory on a managed resource

pub mod tree;

pub use tree::TestTree;
