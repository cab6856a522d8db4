//! Paylane DB - Storage layer
//!
//! SQLx-based persistence for the reconciliation engine, exposed through
//! repository traits so the engine never touches a concrete store. The
//! central primitive is the guarded status transition: a single atomic
//! update that only applies when the row's current status is in the
//! caller's expected set. Duplicate webhook deliveries and racing entry
//! points fall out of that guard as no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! use paylane_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/paylane").await?;
//! let repos = Repositories::new(pool);
//!
//! let t = repos
//!     .payments
//!     .transition("ps_ref_1", &[PaymentStatus::Pending], PaymentStatus::Completed, None)
//!     .await?;
//! if t.applied { /* run the completion side effect, exactly once */ }
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::MemoryRepositories;
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool};
pub use repo::*;
