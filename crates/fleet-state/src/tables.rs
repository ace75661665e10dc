//! redb table definitions for the upgrade ledger.
//!
//! A single table with `&str` keys and `&[u8]` values (JSON-serialized
//! records). Keys follow the pattern `{tenant}#{env}/{cluster_name}`.

use redb::TableDefinition;

/// Upgrade records keyed by `{tenant}#{env}/{cluster_name}`.
pub const UPGRADES: TableDefinition<&str, &[u8]> = TableDefinition::new("upgrades");
