use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::role::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub role: Role,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Role implied by the flag columns, regardless of what is stored.
    pub fn derived_role(&self) -> Role {
        Role::from_flags(self.is_admin, self.is_moderator)
    }

    pub fn role_is_consistent(&self) -> bool {
        self.role == self.derived_role()
    }
}
