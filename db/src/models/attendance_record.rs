use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One confirmed presence. `(session_id, attendee_id)` is UNIQUE in the schema.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub attendee_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub client_ip: Option<String>,
    pub marked_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Values for a record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub session_id: i64,
    pub attendee_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub client_ip: Option<String>,
    pub marked_at: DateTime<Utc>,
}

impl Model {
    /// Plain insert. A duplicate `(session_id, attendee_id)` surfaces as a
    /// unique-constraint `DbErr`; callers decide what that means.
    pub async fn insert_new<C>(db: &C, new: NewRecord) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            session_id: Set(new.session_id),
            attendee_id: Set(new.attendee_id),
            latitude: Set(new.latitude),
            longitude: Set(new.longitude),
            distance_meters: Set(new.distance_meters),
            client_ip: Set(new.client_ip),
            marked_at: Set(new.marked_at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn exists_for<C>(db: &C, session_id: i64, attendee_id: i64) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let count = Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::AttendeeId.eq(attendee_id))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn count_for_session<C>(db: &C, session_id: i64) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .count(db)
            .await
    }
}
