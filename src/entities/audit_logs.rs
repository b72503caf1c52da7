use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Append-only security event log. Rows are never updated or deleted,
/// so there is no `updated_at` column.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: Option<i32>,

    pub action_type: String,

    pub table_name: Option<String>,

    pub record_id: Option<i32>,

    pub ip_address: Option<String>,

    /// JSON payload; schema varies by `action_type`.
    pub details: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
