use sqlx::sqlite::SqlitePool;

/// Raw key/value rows; values are JSON text.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn load_all(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as::<_, (String, String)>(r#"SELECT key, value FROM settings ORDER BY key"#)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn upsert(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO settings (key, value, updated_at)
                VALUES (?1, ?2, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query(r#"DELETE FROM settings WHERE key = ?1"#)
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn upsert_replaces_existing_value() {
        let repo = SettingsRepository::new(init_memory_pool().await.unwrap());
        repo.upsert("blurAmount", "4").await.unwrap();
        repo.upsert("blurAmount", "8").await.unwrap();
        repo.upsert("enabled", "false").await.unwrap();

        let rows = repo.load_all().await.unwrap();
        assert_eq!(
            rows,
            vec![
                ("blurAmount".to_string(), "8".to_string()),
                ("enabled".to_string(), "false".to_string()),
            ]
        );

        assert!(repo.remove("enabled").await.unwrap());
        assert!(!repo.remove("enabled").await.unwrap());
        assert_eq!(repo.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_backed_pool_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");
        {
            let repo = SettingsRepository::new(crate::db::init_pool(&path).await.unwrap());
            repo.upsert("hideShorts", "false").await.unwrap();
            repo.close().await;
        }
        let repo = SettingsRepository::new(crate::db::init_pool(&path).await.unwrap());
        assert_eq!(
            repo.load_all().await.unwrap(),
            vec![("hideShorts".to_string(), "false".to_string())]
        );
    }
}
