use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::roles;

#[derive(Debug, Clone)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

impl From<roles::Model> for Role {
    fn from(model: roles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

pub struct RoleRepository {
    conn: DatabaseConnection,
}

impl RoleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<Role>> {
        let role = roles::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query role by ID")?;

        Ok(role.map(Role::from))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = roles::Entity::find()
            .filter(roles::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query role by name")?;

        Ok(role.map(Role::from))
    }
}
