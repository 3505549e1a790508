use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Attendee-to-class (or instructor-to-class) relationship.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub class_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "instructor")]
    Instructor,

    #[sea_orm(string_value = "attendee")]
    Attendee,
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
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn enroll<C>(db: &C, class_id: i64, user_id: i64, role: Role) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            class_id: Set(class_id),
            user_id: Set(user_id),
            role: Set(role),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn set_active<C>(db: &C, class_id: i64, user_id: i64, active: bool) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::update_many()
            .col_expr(Column::Active, Expr::value(active))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn has_active_role<C>(db: &C, user_id: i64, class_id: i64, role: Role) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let count = Entity::find()
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Role.eq(role))
            .filter(Column::Active.eq(true))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// True when `user_id` holds an active attendee enrollment in `class_id`.
    pub async fn is_enrolled<C>(db: &C, user_id: i64, class_id: i64) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::has_active_role(db, user_id, class_id, Role::Attendee).await
    }

    pub async fn is_instructor<C>(db: &C, user_id: i64, class_id: i64) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::has_active_role(db, user_id, class_id, Role::Instructor).await
    }
}
