//! Row structs for the SQLite tables.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// node_static_data
// ---------------------------------------------------------------------------

/// Static data of one node, stored as a JSON object in `data`.
#[derive(Debug, Clone, FromRow)]
pub struct StaticDataRow {
    pub workflow_id: String,
    pub node_id: String,
    pub data: String,
    pub updated_at: DateTime<Utc>,
}
