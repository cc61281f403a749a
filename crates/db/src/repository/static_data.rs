//! Node static data operations.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{models::StaticDataRow, DbError, DbPool};

/// Fetch the static data row of one node, if any.
pub async fn get_static_data(
    pool: &DbPool,
    workflow_id: Uuid,
    node_id: &str,
) -> Result<Option<StaticDataRow>, DbError> {
    let row = sqlx::query_as::<_, StaticDataRow>(
        r#"
        SELECT workflow_id, node_id, data, updated_at
        FROM node_static_data
        WHERE workflow_id = ?1 AND node_id = ?2
        "#,
    )
    .bind(workflow_id.to_string())
    .bind(node_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert or replace the static data of one node.
pub async fn upsert_static_data(
    pool: &DbPool,
    workflow_id: Uuid,
    node_id: &str,
    data: &Value,
) -> Result<(), DbError> {
    let encoded = serde_json::to_string(data)?;

    sqlx::query(
        r#"
        INSERT INTO node_static_data (workflow_id, node_id, data, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (workflow_id, node_id)
        DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
        "#,
    )
    .bind(workflow_id.to_string())
    .bind(node_id)
    .bind(encoded)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove the static data of one node. Returns whether a row existed.
pub async fn delete_static_data(pool: &DbPool, workflow_id: Uuid, node_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM node_static_data WHERE workflow_id = ?1 AND node_id = ?2")
        .bind(workflow_id.to_string())
        .bind(node_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
