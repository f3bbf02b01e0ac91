//! # Yamanaka Testkit
//!
//! Shared fixtures and generators for exercising the sync engine in tests.
//!
//! This crate provides:
//! - A wired-up temporary vault ([`TestVault`])
//! - In-memory tar-gz archive builders
//! - Device-id and event generators

#![deny(unsafe_code)]

pub mod fixtures;
pub mod generators;

pub use fixtures::TestVault;
pub use generators::{device_id, targz_archive};
