//! `StaticDataStore` backed by the `node_static_data` table.

use async_trait::async_trait;
use nodes::{NodeKey, StaticData, StaticDataStore, StoreError};
use serde_json::Value;
use tracing::debug;

use crate::repository::static_data;
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct SqliteStaticDataStore {
    pool: DbPool,
}

impl SqliteStaticDataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaticDataStore for SqliteStaticDataStore {
    async fn load(&self, key: &NodeKey) -> Result<StaticData, StoreError> {
        let row = static_data::get_static_data(&self.pool, key.workflow_id, &key.node_id).await?;
        match row {
            Some(row) => Ok(serde_json::from_str(&row.data)?),
            None => Ok(StaticData::default()),
        }
    }

    async fn save(&self, key: &NodeKey, data: &StaticData) -> Result<(), StoreError> {
        if data.is_empty() {
            static_data::delete_static_data(&self.pool, key.workflow_id, &key.node_id).await?;
        } else {
            let value = Value::Object(data.as_map().clone());
            static_data::upsert_static_data(&self.pool, key.workflow_id, &key.node_id, &value).await?;
        }
        debug!(node_id = %key.node_id, keys = data.as_map().len(), "static data saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn memory_store() -> SqliteStaticDataStore {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteStaticDataStore::new(pool)
    }

    fn webhook_data(id: &str) -> StaticData {
        let mut data = StaticData::new();
        data.set("webhookId", id);
        data.set("deleteFailures", json!([{"status": 500}]));
        data
    }

    #[tokio::test]
    async fn unknown_key_loads_empty() {
        let store = memory_store().await;
        let data = store.load(&NodeKey::new(Uuid::new_v4(), "n")).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_and_overwrite() {
        let store = memory_store().await;
        let key = NodeKey::new(Uuid::new_v4(), "trigger");

        store.save(&key, &webhook_data("42")).await.unwrap();
        store.save(&key, &webhook_data("43")).await.unwrap();

        let loaded = store.load(&key).await.unwrap();
        assert_eq!(loaded, webhook_data("43"));
    }

    #[tokio::test]
    async fn saving_empty_data_removes_the_row() {
        let store = memory_store().await;
        let key = NodeKey::new(Uuid::new_v4(), "trigger");

        store.save(&key, &webhook_data("42")).await.unwrap();
        store.save(&key, &StaticData::new()).await.unwrap();

        let row = static_data::get_static_data(&store.pool, key.workflow_id, &key.node_id)
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn keys_are_scoped_per_workflow_and_node() {
        let store = memory_store().await;
        let workflow_id = Uuid::new_v4();

        store.save(&NodeKey::new(workflow_id, "a"), &webhook_data("1")).await.unwrap();

        assert!(store.load(&NodeKey::new(workflow_id, "b")).await.unwrap().is_empty());
        assert!(store.load(&NodeKey::new(Uuid::new_v4(), "a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_survives_reconnect() {
        let tmp = TempDir::new().unwrap();
        let url = format!("sqlite://{}", tmp.path().join("static.db").display());
        let key = NodeKey::new(Uuid::new_v4(), "trigger");

        {
            let pool = create_pool(&url, 2).await.unwrap();
            run_migrations(&pool).await.unwrap();
            SqliteStaticDataStore::new(pool.clone()).save(&key, &webhook_data("42")).await.unwrap();
            pool.close().await;
        }

        let pool = create_pool(&url, 2).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let loaded = SqliteStaticDataStore::new(pool).load(&key).await.unwrap();
        assert_eq!(loaded.get_str("webhookId").as_deref(), Some("42"));
    }
}
