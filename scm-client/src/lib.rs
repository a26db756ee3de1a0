//! HTTP client for the source-control server: unified diffs for commits and
//! merge requests, plus best-effort author resolution.

pub mod client;
pub mod errors;

pub use client::{ScmAuthor, ScmClient, ScmConfig};
pub use errors::{ScmError, ScmResult};
