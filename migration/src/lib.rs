pub use sea_orm_migration::prelude::*;

mod m20240101_000000_create_users_table;
mod m20250709_000000_add_user_role;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000000_create_users_table::Migration),
            Box::new(m20250709_000000_add_user_role::Migration),
        ]
    }
}
