//! # pagewal
//!
//! The write-ahead log of a page-oriented storage engine's page directory:
//! - Every directory edit is appended to a checksummed log before it commits
//! - Numbered log files rotate across one or more volumes
//! - Checkpoints fold accumulated logs into one snapshot record
//! - Replay on restart under one of four recovery modes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Page Directory (caller)                      │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ apply / save_snapshot            │ replay on open
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │    WALStore     │                │ WALStoreReader  │
//!   │ (Mutex: writer) │                │ (RecoveryMode)  │
//!   └────────┬────────┘                └────────┬────────┘
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │   LogWriter     │                │   LogReader     │
//!   └────────┬────────┘                └────────┬────────┘
//!            └──────────────┬───────────────────┘
//!                           ▼
//!        FileProvider · PathDelegator · WriteLimiter
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod edit;
pub mod env;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{WalConfig, WalSyncStrategy};
pub use edit::{PageEntriesEdit, PageEntry, PageVersion};
pub use error::{Result, WalError};
pub use wal::{FilesSnapshot, RecoveryMode, WALStore, WALStoreReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pagewal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
