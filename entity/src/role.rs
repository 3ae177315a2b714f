use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::users;

/// Access level of a user, derived from the `is_admin` / `is_moderator` flags.
///
/// Stored as a lowercase string in `users.role`. Admin has strict priority
/// over moderator: a user carrying both flags is an admin.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[default]
    #[sea_orm(string_value = "user")]
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Priority order, highest first.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Moderator, Role::User];

    pub fn from_flags(is_admin: bool, is_moderator: bool) -> Self {
        if is_admin {
            Role::Admin
        } else if is_moderator {
            Role::Moderator
        } else {
            Role::User
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    /// Predicate over the flag columns matching exactly the rows whose
    /// derived role is `self`. The three conditions are pairwise disjoint,
    /// and together cover every row with non-null flags.
    pub fn flags_condition(self) -> Condition {
        match self {
            Role::Admin => Condition::all().add(users::Column::IsAdmin.eq(true)),
            Role::Moderator => Condition::all()
                .add(users::Column::IsAdmin.eq(false))
                .add(users::Column::IsModerator.eq(true)),
            Role::User => Condition::all()
                .add(users::Column::IsAdmin.eq(false))
                .add(users::Column::IsModerator.eq(false)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    // Case-insensitive: older rows may carry "User".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}
