use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Bytes of entropy behind each session token (hex encoded, so twice as many chars).
pub const TOKEN_BYTES: usize = 32;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub token: String,
    pub class_id: i64,
    pub created_by: i64,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id",
        on_delete = "Cascade"
    )]
    Class,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fresh opaque session token from the thread-local CSPRNG.
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

impl Model {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[inline]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }

    /// Inactive because the expiry sweep flipped it, not because its owner
    /// or a newer session ended it early.
    pub fn lapsed(&self) -> bool {
        !self.active && self.updated_at >= self.expires_at
    }

    /// Time left before expiry, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Inserts a new active session. Supersession of older sessions is the
    /// caller's job and must run on the same connection or transaction.
    pub async fn insert_active<C>(
        db: &C,
        class_id: i64,
        created_by: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            token: Set(generate_token()),
            class_id: Set(class_id),
            created_by: Set(created_by),
            active: Set(true),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_token<C>(db: &C, token: &str) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().filter(Column::Token.eq(token)).one(db).await
    }

    /// The session currently flagged active and unexpired for `class_id`, if any.
    pub async fn active_for_class<C>(
        db: &C,
        class_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::Active.eq(true))
            .filter(Column::ExpiresAt.gt(now))
            .one(db)
            .await
    }
}
