use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

const DEFAULT_ROLE: &str = "user";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Add role column to users table
        manager
            .alter_table(
                Table::alter()
                    .table(Users::Table)
                    .add_column(
                        ColumnDef::new(Users::Role)
                            .string_len(50)
                            .not_null()
                            .default(DEFAULT_ROLE),
                    )
                    .to_owned(),
            )
            .await?;

        // Backfill existing users from their flags
        let db = manager.get_connection();
        let backend = manager.get_database_backend();
        for (role, stmt) in backfill_statements() {
            let result = db.execute(backend.build(&stmt)).await?;
            log::info!(
                "Backfilled role '{}' for {} users",
                role,
                result.rows_affected()
            );
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop role column from users table
        manager
            .alter_table(
                Table::alter()
                    .table(Users::Table)
                    .drop_column(Users::Role)
                    .to_owned(),
            )
            .await
    }
}

/// One conditional update per role. The predicates are disjoint, so the
/// statements can run in any order; rows with a NULL flag match none of them
/// and keep the column default.
fn backfill_statements() -> Vec<(&'static str, UpdateStatement)> {
    vec![
        (
            "admin",
            set_role("admin", [Expr::col(Users::IsAdmin).eq(true)]),
        ),
        (
            "moderator",
            set_role(
                "moderator",
                [
                    Expr::col(Users::IsAdmin).eq(false),
                    Expr::col(Users::IsModerator).eq(true),
                ],
            ),
        ),
        (
            "user",
            set_role(
                "user",
                [
                    Expr::col(Users::IsAdmin).eq(false),
                    Expr::col(Users::IsModerator).eq(false),
                ],
            ),
        ),
    ]
}

fn set_role<I>(role: &str, predicates: I) -> UpdateStatement
where
    I: IntoIterator<Item = SimpleExpr>,
{
    let mut stmt = Query::update();
    stmt.table(Users::Table).value(Users::Role, role);
    for predicate in predicates {
        stmt.and_where(predicate);
    }
    stmt.to_owned()
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Role,
    IsAdmin,
    IsModerator,
}
