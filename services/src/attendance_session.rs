//! Attendance session lifecycle: create, extend, deactivate, expire, purge.

use chrono::{DateTime, Duration, Utc};
use db::models::{
    attendance_session::{ActiveModel, Column, Entity},
    class,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, info};
use util::config::AppConfig;

use crate::error::AttendanceError;

pub use db::models::attendance_session::Model as AttendanceSession;

/// Bounds applied to session durations and retention.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub min_minutes: i64,
    pub max_minutes: i64,
    /// How long an expired session is kept before it is purged.
    pub retention: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            min_minutes: 5,
            max_minutes: 180,
            retention: Duration::days(7),
        }
    }
}

impl SessionPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            min_minutes: cfg.session_min_minutes,
            max_minutes: cfg.session_max_minutes,
            retention: Duration::hours(cfg.session_retention_hours),
        }
    }

    fn check_duration(&self, minutes: i64) -> Result<(), AttendanceError> {
        if (self.min_minutes..=self.max_minutes).contains(&minutes) {
            Ok(())
        } else {
            Err(AttendanceError::InvalidDuration {
                got: minutes,
                min: self.min_minutes,
                max: self.max_minutes,
            })
        }
    }

    fn check_extension(&self, minutes: i64) -> Result<(), AttendanceError> {
        if (1..=self.max_minutes).contains(&minutes) {
            Ok(())
        } else {
            Err(AttendanceError::InvalidDuration {
                got: minutes,
                min: 1,
                max: self.max_minutes,
            })
        }
    }
}

pub struct AttendanceSessionService;

impl AttendanceSessionService {
    /// Opens a new window for `class_id`, superseding whatever was active.
    ///
    /// Deactivation and insert share one transaction so no reader sees two
    /// active sessions for the class.
    pub async fn create<C>(
        db: &C,
        policy: &SessionPolicy,
        class_id: i64,
        created_by: i64,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        policy.check_duration(duration_minutes)?;

        if class::Model::find(db, class_id).await?.is_none() {
            return Err(AttendanceError::ClassNotFound);
        }

        let txn = db.begin().await?;

        let superseded = Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::Active.eq(true))
            .exec(&txn)
            .await?
            .rows_affected;

        let expires_at = now + Duration::minutes(duration_minutes);
        let session =
            AttendanceSession::insert_active(&txn, class_id, created_by, now, expires_at).await?;

        txn.commit().await?;

        info!(
            class_id,
            session_id = session.id,
            created_by,
            duration_minutes,
            superseded,
            "Attendance session opened"
        );
        Ok(session)
    }

    /// Pushes the expiry of a still-valid session forward.
    pub async fn extend<C>(
        db: &C,
        policy: &SessionPolicy,
        session: &AttendanceSession,
        additional_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError>
    where
        C: ConnectionTrait,
    {
        policy.check_extension(additional_minutes)?;

        if session.is_expired(now) {
            return Err(AttendanceError::SessionExpired);
        }
        if !session.active {
            return Err(AttendanceError::SessionEnded);
        }

        let mut am: ActiveModel = session.clone().into();
        am.expires_at = Set(session.expires_at + Duration::minutes(additional_minutes));
        am.updated_at = Set(now);
        let updated = am.update(db).await?;

        info!(
            session_id = updated.id,
            additional_minutes,
            expires_at = %updated.expires_at,
            "Attendance session extended"
        );
        Ok(updated)
    }

    /// Ends a session early. The flag flip is conditional on `active = true`,
    /// so two concurrent calls cannot both succeed.
    pub async fn deactivate<C>(
        db: &C,
        session: &AttendanceSession,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError>
    where
        C: ConnectionTrait,
    {
        if !session.active {
            return Err(AttendanceError::AlreadyInactive);
        }

        let res = Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(session.id))
            .filter(Column::Active.eq(true))
            .exec(db)
            .await?;

        if res.rows_affected == 0 {
            return Err(AttendanceError::AlreadyInactive);
        }

        info!(session_id = session.id, "Attendance session deactivated");
        Ok(AttendanceSession {
            active: false,
            updated_at: now,
            ..session.clone()
        })
    }

    /// Flips `active` off for every session past its expiry. Idempotent.
    pub async fn cleanup_expired<C>(db: &C, now: DateTime<Utc>) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Active.eq(true))
            .filter(Column::ExpiresAt.lte(now))
            .exec(db)
            .await?;

        if res.rows_affected > 0 {
            info!(count = res.rows_affected, "Expired attendance sessions deactivated");
        }
        Ok(res.rows_affected)
    }

    /// Deletes sessions that expired more than `policy.retention` ago.
    /// Their records go with them through the foreign key cascade.
    pub async fn purge_stale<C>(
        db: &C,
        policy: &SessionPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let cutoff = now - policy.retention;
        let res = Entity::delete_many()
            .filter(Column::ExpiresAt.lt(cutoff))
            .exec(db)
            .await?;

        debug!(count = res.rows_affected, %cutoff, "Purged stale attendance sessions");
        Ok(res.rows_affected)
    }

    pub async fn find_by_token<C>(
        db: &C,
        token: &str,
    ) -> Result<AttendanceSession, AttendanceError>
    where
        C: ConnectionTrait,
    {
        AttendanceSession::find_by_token(db, token)
            .await?
            .ok_or(AttendanceError::SessionNotFound)
    }

    pub async fn active_for_class<C>(
        db: &C,
        class_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, DbErr>
    where
        C: ConnectionTrait,
    {
        AttendanceSession::active_for_class(db, class_id, now).await
    }
}
