use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "security_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub severity: Severity,
    /// JSON object serialized as text.
    pub details: String,
    pub actor_id: Option<i64>,
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ordered low → critical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn append<C>(
        db: &C,
        event_type: &str,
        severity: Severity,
        details: &serde_json::Value,
        actor_id: Option<i64>,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            event_type: Set(event_type.to_owned()),
            severity: Set(severity),
            details: Set(details.to_string()),
            actor_id: Set(actor_id),
            client_id: Set(client_id.map(str::to_owned)),
            created_at: Set(now),
        }
        .insert(db)
        .await
    }

    pub async fn since<C>(db: &C, since: DateTime<Utc>) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CreatedAt.gte(since))
            .all(db)
            .await
    }

    pub async fn delete_before<C>(db: &C, cutoff: DateTime<Utc>) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    pub fn details_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.details).unwrap_or(serde_json::Value::Null)
    }
}
