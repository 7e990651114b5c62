//! SQLite user repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_core::config::StoreConfig;
use keyward_core::types::{AuthenticationOrigin, ScopeSet, UserRecord};
use keyward_core::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::traits::UserStore;

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        // password_hash is NULL for shadow users of external origins
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                origin TEXT NOT NULL,
                password_hash TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_scopes (
                username TEXT NOT NULL,
                scope TEXT NOT NULL,
                PRIMARY KEY (username, scope)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        info!("User store initialized");
        Ok(())
    }

    async fn insert_scope<'e, E>(executor: E, username: &str, scope: &str) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("INSERT OR IGNORE INTO user_scopes (username, scope) VALUES (?, ?)")
            .bind(username)
            .bind(scope)
            .execute(executor)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::DatabaseError(format!("Invalid timestamp '{}': {}", value, e)))
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(&self, user: &UserRecord) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO users (username, origin, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(user.origin.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                Error::UserAlreadyExists(user.username.clone())
            } else {
                Error::DatabaseError(e.to_string())
            }
        })?;

        for scope in &user.scopes {
            Self::insert_scope(&mut *tx, &user.username, scope).await?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        debug!(username = %user.username, origin = %user.origin, "Created user");
        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let row: Option<(String, String, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT username, origin, password_hash, created_at
            FROM users WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let Some((username, origin, password_hash, created_at)) = row else {
            return Ok(None);
        };

        let scopes = self.scopes_for(&username).await?;

        Ok(Some(UserRecord {
            username,
            origin: origin.parse()?,
            password_hash,
            scopes,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT username FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let mut users = Vec::with_capacity(rows.len());
        for (username,) in rows {
            if let Some(user) = self.get_user(&username).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn scopes_for(&self, username: &str) -> Result<ScopeSet> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT scope FROM user_scopes WHERE username = ?")
                .bind(username)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|(scope,)| scope).collect())
    }

    async fn grant_scopes(&self, username: &str, scopes: &[String]) -> Result<()> {
        if self.origin_of(username).await?.is_none() {
            return Err(Error::DatabaseError(format!("No such user: {}", username)));
        }

        for scope in scopes {
            Self::insert_scope(&self.pool, username, scope).await?;
        }

        debug!(username, count = scopes.len(), "Granted scopes");
        Ok(())
    }

    async fn origin_of(&self, username: &str) -> Result<Option<AuthenticationOrigin>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT origin FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        row.map(|(origin,)| origin.parse()).transpose()
    }

    async fn provision_shadow_user(
        &self,
        username: &str,
        origin: AuthenticationOrigin,
        default_scopes: &[String],
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (username, origin, password_hash, created_at)
            VALUES (?, ?, NULL, ?)
            "#,
        )
        .bind(username)
        .bind(origin.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
        .rows_affected()
            == 1;

        if inserted {
            for scope in default_scopes {
                Self::insert_scope(&mut *tx, username, scope).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        if inserted {
            info!(username, origin = %origin, "Provisioned shadow user");
        }
        Ok(inserted)
    }
}
