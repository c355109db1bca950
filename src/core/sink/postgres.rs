// src/core/sink/postgres.rs

//! PostgreSQL sink writing into the `wiretaps` table.

use super::{IngestSink, SinkConnection};
use crate::config::DatabaseConfig;
use crate::core::errors::IngestError;
use crate::core::record::Record;
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{info, warn};

// `source_ip` goes through text so the column may be declared `inet` or `text`.
const INSERT_SQL: &str = "INSERT INTO wiretaps (event_type, user_id, source_ip, props) \
                          VALUES ($1, $2, $3::text::inet, $4)";

pub struct PostgresSink {
    config: tokio_postgres::Config,
}

impl PostgresSink {
    pub fn new(db: &DatabaseConfig) -> Self {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&db.host)
            .port(db.port)
            .dbname(&db.name)
            .user(&db.user)
            .password(&db.password)
            .application_name("watergate")
            .connect_timeout(db.connect_timeout);
        Self { config }
    }

    async fn open_client(&self) -> Result<Client, IngestError> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection closed with error: {}", e);
            }
        });
        Ok(client)
    }

    /// Runs the SQL script at `path` in a single batch on a dedicated connection.
    pub async fn apply_migrations(&self, path: &Path) -> anyhow::Result<()> {
        let sql = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read migrations from '{}'", path.display()))?;
        let client = self
            .open_client()
            .await
            .context("Failed to connect to PostgreSQL for migrations")?;
        client
            .batch_execute(&sql)
            .await
            .with_context(|| format!("Failed to apply migrations from '{}'", path.display()))?;
        info!("Applied migrations from '{}'.", path.display());
        Ok(())
    }
}

#[async_trait]
impl IngestSink for PostgresSink {
    type Connection = PostgresConnection;

    async fn connect(&self) -> Result<Self::Connection, IngestError> {
        let client = self.open_client().await?;
        let insert = client.prepare(INSERT_SQL).await?;
        Ok(PostgresConnection { client, insert })
    }
}

pub struct PostgresConnection {
    client: Client,
    insert: Statement,
}

#[async_trait]
impl SinkConnection for PostgresConnection {
    async fn insert(&mut self, record: &Record) -> Result<(), IngestError> {
        let event_type = record.event_type();
        let user_id = record.user_id();
        let source_ip = record.source_ip();
        let props = Json(record.props());
        let params: [&(dyn ToSql + Sync); 4] = [&event_type, &user_id, &source_ip, &props];
        self.client.execute(&self.insert, &params).await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
