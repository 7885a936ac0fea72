//! roundcast-state — durable round records for roundcast.
//!
//! Backed by [redb](https://docs.rs/redb). Every round that reaches its
//! start time is written here once, then updated once more when it ends:
//! either with its outcome values or with the cancellation sentinel.
//!
//! # Architecture
//!
//! ```text
//! RoundGateway (async trait, consumed by the scheduler)
//!   └── StateStore (redb)
//!       ├── rounds         id        → RoundRecord (JSON)
//!       └── latest_rounds  tenant_id → id of the newest round
//! ```
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod gateway;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use gateway::RoundGateway;
pub use store::StateStore;
pub use types::*;
