//! Shared test utilities for resume-triage integration tests.
//!
//! This module provides:
//! - `FakeMailbox`, a scripted in-memory `MailboxApi`
//! - `TestHarness` for isolated runs with temp output and cache paths
//! - Builders for configs and attachment payloads (PDF, DOCX)

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeMailbox, FixedOcr, SinglePageRasterizer, TestHarness};
