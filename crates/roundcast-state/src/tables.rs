//! redb table definitions for the round store.
//!
//! Round records are JSON-serialized into `&[u8]` value columns.

use redb::TableDefinition;

/// Round records keyed by round id.
pub const ROUNDS: TableDefinition<&str, &[u8]> = TableDefinition::new("rounds");

/// Newest round id per tenant, keyed by tenant id.
pub const LATEST_ROUNDS: TableDefinition<i64, &str> = TableDefinition::new("latest_rounds");
