// SPDX-License-Identifier: MIT
//! Chat code-review handoff.
//!
//! Provides:
//! - Pending review context store: the single-slot, expiring record of the
//!   chat agent's last finished run
//! - Affected-package determination: maps modified files onto workspace
//!   packages ahead of the review

pub mod packages;
pub mod store;

pub use packages::{determine_affected_packages, ProjectDescriptor};
pub use store::{ExecutionContext, PendingReviewContext, ReviewStore, DEFAULT_REVIEW_TTL};
