use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use signalfire_core::Result;
use signalfire_domain::ports::EventStore;
use signalfire_domain::records::{EventFilter, EventPage, NewLogEvent, StoredLogEvent};

/// PostgreSQL事件存储
///
/// 每个事件一行一事务：公共字段落在可索引的标量列上，
/// 变体特有字段整体放进payload(jsonb)列。
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert(&self, row: &NewLogEvent) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO log_events (timestamp, source, status_type, log_level, message, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(row.timestamp)
        .bind(&row.source)
        .bind(row.status_type.as_str())
        .bind(row.log_level.as_str())
        .bind(&row.message)
        .bind(&row.payload)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("事件已持久化: id={id}, source={}", row.source);
        Ok(id)
    }

    async fn query(&self, filter: &EventFilter) -> Result<EventPage> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM log_events");
        push_filters(&mut count_builder, filter);
        let total_count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let limit = filter.effective_limit();
        let offset = filter.offset.max(0);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, timestamp, source, status_type, log_level, message, payload FROM log_events",
        );
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY timestamp DESC");
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let logs: Vec<StoredLogEvent> = rows
            .iter()
            .map(row_to_stored)
            .collect::<std::result::Result<_, sqlx::Error>>()?;

        let has_more = offset + (logs.len() as i64) < total_count;

        Ok(EventPage {
            logs,
            total_count,
            has_more,
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<Postgres>, filter: &EventFilter) {
    builder.push(" WHERE 1=1");

    if let Some(source) = &filter.source {
        builder.push(" AND source = ");
        builder.push_bind(source.clone());
    }
    if let Some(log_level) = filter.log_level {
        builder.push(" AND log_level = ");
        builder.push_bind(log_level.as_str());
    }
    if let Some(start_date) = filter.start_date {
        builder.push(" AND timestamp >= ");
        builder.push_bind(start_date);
    }
    if let Some(end_date) = filter.end_date {
        builder.push(" AND timestamp <= ");
        builder.push_bind(end_date);
    }
}

fn row_to_stored(row: &PgRow) -> std::result::Result<StoredLogEvent, sqlx::Error> {
    Ok(StoredLogEvent {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        source: row.try_get("source")?,
        status_type: row.try_get("status_type")?,
        log_level: row.try_get("log_level")?,
        message: row.try_get("message")?,
        payload: row.try_get("payload")?,
    })
}
