//! PostgreSQL implementation of the persistence layer.
//!
//! Mutating post operations open a transaction and take
//! `LOCK TABLE posts IN SHARE ROW EXCLUSIVE MODE` first. The mode conflicts
//! with itself, so position allocation, the transition, and renumbering of
//! concurrent writers never interleave, while plain reads stay unblocked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{AdminLogEntry, NewAdminLog, PostRow, StateColumns};
use super::{AdminLogStore, PostRepository, StatusCounts};
use crate::domain::{
    ChannelRef, CreateTarget, NewPost, Payment, PaymentStatus, PaymentType, Post, PostFilter,
    PostId, PostState, PostStatus, Transition,
};
use crate::error::SchedulerError;
use crate::settings::{SettingEntry, SettingsStore, keys};

macro_rules! select_posts {
    ($tail:literal) => {
        concat!(
            "SELECT id, owner_id, status, queue_position, scheduled_time, published_at, \
             published_lane, channel_message_id, channel_post_url, payment_type, \
             payment_status, payment_amount, content, created_at, updated_at FROM posts ",
            $tail
        )
    };
}

const RETURNING_POST: &str = " RETURNING id, owner_id, status, queue_position, scheduled_time, \
     published_at, published_lane, channel_message_id, channel_post_url, payment_type, \
     payment_status, payment_amount, content, created_at, updated_at";

fn db_err(err: sqlx::Error) -> SchedulerError {
    SchedulerError::PersistenceError(err.to_string())
}

type Tx = Transaction<'static, Postgres>;

/// PostgreSQL-backed post repository using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Creates a repository over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_locked(&self) -> Result<Tx, SchedulerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("LOCK TABLE posts IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        Ok(tx)
    }

    async fn fetch_for_update(tx: &mut Tx, id: PostId) -> Result<Post, SchedulerError> {
        sqlx::query_as::<_, PostRow>(select_posts!("WHERE id = $1 FOR UPDATE"))
            .bind(id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?
            .ok_or(SchedulerError::PostNotFound(id))?
            .into_post()
    }

    async fn next_position_in(tx: &mut Tx) -> Result<u32, SchedulerError> {
        let next = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(queue_position), 0) + 1 FROM posts WHERE status = 'queue'",
        )
        .fetch_one(&mut **tx)
        .await
        .map_err(db_err)?;
        u32::try_from(next).map_err(|e| SchedulerError::Internal(e.to_string()))
    }

    async fn write_state(
        tx: &mut Tx,
        id: PostId,
        state: &PostState,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let cols = StateColumns::from_state(state);
        let sql = format!(
            "UPDATE posts SET status = $2, queue_position = $3, scheduled_time = $4, \
             published_at = $5, published_lane = $6, channel_message_id = $7, \
             channel_post_url = $8, updated_at = $9 WHERE id = $1{RETURNING_POST}"
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.get())
            .bind(cols.status)
            .bind(cols.queue_position)
            .bind(cols.scheduled_time)
            .bind(cols.published_at)
            .bind(cols.published_lane)
            .bind(cols.channel_message_id)
            .bind(cols.channel_post_url)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_err)?
            .into_post()
    }

    async fn renumber_in(tx: &mut Tx, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        sqlx::query(
            "UPDATE posts p SET queue_position = r.rn::int, updated_at = $1 \
             FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY queue_position, id) AS rn \
                   FROM posts WHERE status = 'queue') r \
             WHERE p.id = r.id AND p.queue_position IS DISTINCT FROM r.rn::int",
        )
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        let len =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE status = 'queue'")
                .fetch_one(&mut **tx)
                .await
                .map_err(db_err)?;
        usize::try_from(len).map_err(|e| SchedulerError::Internal(e.to_string()))
    }

    async fn transition(
        &self,
        id: PostId,
        transition: impl FnOnce(u32) -> Transition + Send,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut tx = self.begin_locked().await?;
        let current = Self::fetch_for_update(&mut tx, id).await?;
        let position = Self::next_position_in(&mut tx).await?;
        let next = current.state.apply(transition(position))?;
        let post = Self::write_state(&mut tx, id, &next, now).await?;
        if current.status() == PostStatus::Queue {
            Self::renumber_in(&mut tx, now).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(post)
    }
}

fn rows_into_posts(rows: Vec<PostRow>) -> Result<Vec<Post>, SchedulerError> {
    rows.into_iter().map(PostRow::into_post).collect()
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(
        &self,
        new: NewPost,
        target: CreateTarget,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut tx = self.begin_locked().await?;
        let state = match target {
            CreateTarget::Draft => PostState::Draft,
            CreateTarget::Queue => PostState::Draft.apply(Transition::Enqueue {
                position: Self::next_position_in(&mut tx).await?,
            })?,
            CreateTarget::Scheduled { at } => {
                PostState::Draft.apply(Transition::Schedule { at })?
            }
        };
        let cols = StateColumns::from_state(&state);
        let sql = format!(
            "INSERT INTO posts (owner_id, status, queue_position, scheduled_time, payment_type, \
             payment_status, payment_amount, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9){RETURNING_POST}"
        );
        let post = sqlx::query_as::<_, PostRow>(&sql)
            .bind(new.owner_id)
            .bind(cols.status)
            .bind(cols.queue_position)
            .bind(cols.scheduled_time)
            .bind(new.payment.payment_type.map(PaymentType::as_str))
            .bind(new.payment.status.map(PaymentStatus::as_str))
            .bind(new.payment.amount)
            .bind(sqlx::types::Json(new.content))
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?
            .into_post()?;
        tx.commit().await.map_err(db_err)?;
        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Post, SchedulerError> {
        sqlx::query_as::<_, PostRow>(select_posts!("WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(SchedulerError::PostNotFound(id))?
            .into_post()
    }

    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, SchedulerError> {
        let sql = match filter.status {
            Some(PostStatus::Queue) => select_posts!(
                "WHERE ($1::text IS NULL OR status = $1) \
                 AND ($2::bigint IS NULL OR owner_id = $2) ORDER BY queue_position, id"
            ),
            Some(PostStatus::Scheduled) => select_posts!(
                "WHERE ($1::text IS NULL OR status = $1) \
                 AND ($2::bigint IS NULL OR owner_id = $2) ORDER BY scheduled_time, id"
            ),
            _ => select_posts!(
                "WHERE ($1::text IS NULL OR status = $1) \
                 AND ($2::bigint IS NULL OR owner_id = $2) ORDER BY created_at DESC, id DESC"
            ),
        };
        let rows = sqlx::query_as::<_, PostRow>(sql)
            .bind(filter.status.map(PostStatus::as_str))
            .bind(filter.owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows_into_posts(rows)
    }

    async fn promote_to_queue(
        &self,
        id: PostId,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        self.transition(id, |position| Transition::Enqueue { position }, now)
            .await
    }

    async fn promote_to_scheduled(
        &self,
        id: PostId,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        self.transition(id, move |_| Transition::Schedule { at }, now)
            .await
    }

    async fn mark_published(
        &self,
        id: PostId,
        channel_ref: ChannelRef,
        at: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        self.transition(id, move |_| Transition::Publish { at, channel_ref }, at)
            .await
    }

    async fn delete(&self, id: PostId, now: DateTime<Utc>) -> Result<Post, SchedulerError> {
        let mut tx = self.begin_locked().await?;
        let mut post = Self::fetch_for_update(&mut tx, id).await?;
        let rejected = post.state.apply(Transition::Reject)?;
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if post.status() == PostStatus::Queue {
            Self::renumber_in(&mut tx, now).await?;
        }
        tx.commit().await.map_err(db_err)?;
        post.state = rejected;
        Ok(post)
    }

    async fn set_payment(
        &self,
        id: PostId,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let current = Self::fetch_for_update(&mut tx, id).await?;
        if current.status().is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                from: current.status(),
                action: "set_payment",
            });
        }
        let sql = format!(
            "UPDATE posts SET payment_type = $2, payment_status = $3, payment_amount = $4, \
             updated_at = $5 WHERE id = $1{RETURNING_POST}"
        );
        let post = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.get())
            .bind(payment.payment_type.map(PaymentType::as_str))
            .bind(payment.status.map(PaymentStatus::as_str))
            .bind(payment.amount)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?
            .into_post()?;
        tx.commit().await.map_err(db_err)?;
        Ok(post)
    }

    async fn next_position(&self) -> Result<u32, SchedulerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let next = Self::next_position_in(&mut tx).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(next)
    }

    async fn renumber(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let mut tx = self.begin_locked().await?;
        let len = Self::renumber_in(&mut tx, now).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(len)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
        let rows = sqlx::query_as::<_, PostRow>(select_posts!(
            "WHERE status = 'scheduled' AND scheduled_time <= $1 ORDER BY scheduled_time, id"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows_into_posts(rows)
    }

    async fn queue_front(&self) -> Result<Option<Post>, SchedulerError> {
        sqlx::query_as::<_, PostRow>(select_posts!(
            "WHERE status = 'queue' ORDER BY queue_position, id LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(PostRow::into_post)
        .transpose()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, SchedulerError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM posts GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            let n = u64::try_from(n).unwrap_or(0);
            match status.parse::<PostStatus>()? {
                PostStatus::Draft => counts.draft = n,
                PostStatus::Queue => counts.queue = n,
                PostStatus::Scheduled => counts.scheduled = n,
                PostStatus::Published => counts.published = n,
                PostStatus::Rejected => {}
            }
        }
        Ok(counts)
    }

    async fn published_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
        let rows = sqlx::query_as::<_, PostRow>(select_posts!(
            "WHERE status = 'published' AND published_at >= $1 \
             ORDER BY published_at DESC, id DESC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows_into_posts(rows)
    }
}

/// Settings table (`key`, `value`, `description`, `updated_at`).
#[derive(Debug, Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SchedulerError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SchedulerError> {
        sqlx::query(
            "INSERT INTO settings (key, value, description, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .bind(keys::description(key))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<SettingEntry>, SchedulerError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, DateTime<Utc>)>(
            "SELECT key, value, description, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(key, value, description, updated_at)| SettingEntry {
                key,
                value,
                description,
                updated_at,
            })
            .collect())
    }
}

/// `admin_logs` table.
#[derive(Debug, Clone)]
pub struct PgAdminLog {
    pool: PgPool,
}

impl PgAdminLog {
    /// Creates a log over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminLogStore for PgAdminLog {
    async fn append(&self, entry: NewAdminLog) -> Result<AdminLogEntry, SchedulerError> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO admin_logs (admin_id, action, details) VALUES ($1, $2, $3) \
             RETURNING id, created_at",
        )
        .bind(entry.admin_id)
        .bind(&entry.action)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(AdminLogEntry {
            id,
            admin_id: entry.admin_id,
            action: entry.action,
            details: entry.details,
            created_at,
        })
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AdminLogEntry>, SchedulerError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, admin_id, action, details, created_at FROM admin_logs \
             ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, admin_id, action, details, created_at)| AdminLogEntry {
                    id,
                    admin_id,
                    action,
                    details,
                    created_at,
                },
            )
            .collect())
    }
}
