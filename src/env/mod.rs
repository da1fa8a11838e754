//! Environment Module
//!
//! The collaborators the WAL consumes but does not own.
//!
//! ## Responsibilities
//! - File creation/opening/removal (possibly encrypting) via `FileProvider`
//! - Write throttling via `WriteLimiter`
//! - Volume selection and per-file volume bookkeeping via `PathDelegator`
//!
//! Each trait ships with a plain default implementation; callers with
//! their own encryption layer, rate limiter or disk balancer plug theirs
//! in through `Arc<dyn Trait>`.

mod delegator;
mod file_provider;
mod limiter;

pub use delegator::{MultiVolumeDelegator, PathDelegator};
pub use file_provider::{FileProvider, LocalFileProvider, WritableFile};
pub use limiter::{RateLimiter, WriteLimiter};
