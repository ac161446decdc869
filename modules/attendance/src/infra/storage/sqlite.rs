use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;

use crate::domain::store::{Condition, DocumentStore, Filter};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT    NOT NULL,
        body       TEXT    NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection, seq)",
    "CREATE INDEX IF NOT EXISTS documents_id_idx
        ON documents (collection, json_extract(body, '$.id'))",
    "CREATE INDEX IF NOT EXISTS documents_email_idx
        ON documents (collection, json_extract(body, '$.email'))",
    "CREATE INDEX IF NOT EXISTS documents_class_date_idx
        ON documents (collection, json_extract(body, '$.class_id'), json_extract(body, '$.date'))",
];

/// Document store over a single SQLite table of JSON bodies. Filters compile
/// to `json_extract` predicates; multi-row writes run in one transaction.
pub struct SqliteStore {
    pool: SqlitePool,
    // One writer at a time: read-then-write transactions would otherwise
    // race for the SQLite write lock.
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub async fn connect(
        dsn: &str,
        max_conns: Option<u32>,
        busy_timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");
        if !in_memory {
            create_parent_dir(dsn)?;
        }

        let options = SqliteConnectOptions::from_str(dsn)
            .with_context(|| format!("invalid SQLite DSN '{dsn}'"))?
            .create_if_missing(true);

        let mut pool_opts = SqlitePoolOptions::new();
        if in_memory {
            // Every connection to ":memory:" is a separate database; pin to one.
            pool_opts = pool_opts
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else if let Some(n) = max_conns {
            pool_opts = pool_opts.max_connections(n);
        }

        pool_opts = pool_opts.after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL")
                    .execute(&mut *conn)
                    .await?;
                if let Some(t) = busy_timeout {
                    // PRAGMA can't use bind parameters; use a numeric literal.
                    let ms = std::cmp::min(t.as_millis(), i64::MAX as u128) as i64;
                    let stmt = format!("PRAGMA busy_timeout = {ms}");
                    sqlx::query(&stmt).execute(&mut *conn).await?;
                }
                Ok(())
            })
        });

        let pool = pool_opts
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open SQLite database '{dsn}'"))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        tracing::debug!("document table ready");
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn create_parent_dir(dsn: &str) -> anyhow::Result<()> {
    let raw = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    if raw.starts_with("file:") || raw.contains('?') {
        return Ok(());
    }
    if let Some(parent) = std::path::Path::new(raw).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// `json_extract` over a top-level field. Field names are spliced into the
/// SQL text so expression indexes can match, hence the strict charset.
fn field_expr(field: &str) -> anyhow::Result<String> {
    let plain = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !plain {
        bail!("unsupported filter field '{field}'");
    }
    Ok(format!("json_extract(body, '$.{field}')"))
}

fn push_scalar(qb: &mut QueryBuilder<'static, Sqlite>, value: &Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => {
                qb.push_bind(i);
            }
            (None, Some(f)) => {
                qb.push_bind(f);
            }
            (None, None) => bail!("unsupported numeric filter value {n}"),
        },
        other => bail!("unsupported filter value {other}"),
    }
    Ok(())
}

/// `head` followed by a WHERE clause selecting `filter` within `collection`.
/// Strings compare with BINARY collation and numbers numerically, as in
/// [`Filter::matches`]; a missing field yields NULL and never matches.
fn filtered(
    head: &str,
    collection: &str,
    filter: &Filter,
) -> anyhow::Result<QueryBuilder<'static, Sqlite>> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE collection = ").push_bind(collection.to_owned());
    for cond in filter.conditions() {
        match cond {
            Condition::Eq { field, value } => {
                qb.push(" AND ").push(field_expr(field)?).push(" = ");
                push_scalar(&mut qb, value)?;
            }
            Condition::Between { field, lo, hi } => {
                qb.push(" AND ").push(field_expr(field)?).push(" BETWEEN ");
                push_scalar(&mut qb, lo)?;
                qb.push(" AND ");
                push_scalar(&mut qb, hi)?;
            }
        }
    }
    Ok(qb)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

async fn insert_all(
    conn: &mut SqliteConnection,
    collection: &str,
    docs: &[Value],
) -> anyhow::Result<()> {
    for doc in docs {
        sqlx::query("INSERT INTO documents (collection, body) VALUES (?, ?)")
            .bind(collection)
            .bind(serde_json::to_string(doc)?)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn delete_matching(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> anyhow::Result<u64> {
    let mut qb = filtered("DELETE FROM documents", collection, filter)?;
    let done = qb.build().execute(&mut *conn).await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> anyhow::Result<Vec<Value>> {
        let mut qb = filtered("SELECT seq, body FROM documents", collection, filter)?;
        qb.push(" ORDER BY seq LIMIT ").push_bind(sql_limit(limit));
        let rows: Vec<(i64, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(seq, body)| {
                serde_json::from_str(&body)
                    .with_context(|| format!("corrupt JSON in {collection}#{seq}"))
            })
            .collect()
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<()> {
        let _w = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        insert_all(&mut tx, collection, &docs).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Value,
    ) -> anyhow::Result<bool> {
        let _w = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut target = filtered("SELECT seq FROM documents", collection, filter)?;
        target.push(" ORDER BY seq LIMIT 1");
        let seq: Option<i64> = target.build_query_scalar().fetch_optional(&mut *tx).await?;
        let Some(seq) = seq else {
            return Ok(false);
        };
        sqlx::query("UPDATE documents SET body = ? WHERE seq = ?")
            .bind(serde_json::to_string(&doc)?)
            .bind(seq)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64> {
        let _w = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let removed = delete_matching(&mut tx, collection, filter).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn replace_where(
        &self,
        collection: &str,
        filter: &Filter,
        docs: Vec<Value>,
    ) -> anyhow::Result<u64> {
        let _w = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let removed = delete_matching(&mut tx, collection, filter).await?;
        insert_all(&mut tx, collection, &docs).await?;
        tx.commit().await?;
        Ok(removed)
    }
}
