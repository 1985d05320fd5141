//! Company formation records.
//!
//! A company is owned by the user who created it and starts as a `draft`.
//! Founders are stored alongside it with their position so they read back in
//! the order they were submitted.
//!
//! Flow Overview:
//! 1) Authenticate via session token (no store access on failure).
//! 2) Validate the payload.
//! 3) Write the company and founders in one transaction, or read them scoped
//!    to the caller.

pub(crate) mod create;
pub(crate) mod read;
mod storage;
pub(crate) mod types;

const STATUS_DRAFT: &str = "draft";
