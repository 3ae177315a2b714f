use entity::role::Role;
use entity::users;
use migration::Migrator;
use role_backfill::backfill::{BackfillError, BackfillStrategy, RoleBackfiller};
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm_migration::MigratorTrait;

const SCENARIO: [(bool, bool); 4] = [(true, true), (true, false), (false, true), (false, false)];

async fn connect() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    Database::connect(opts).await.unwrap()
}

/// Creates `users`, inserts rows before the role column exists, then applies
/// the role migration on top of them.
async fn migrate_with_existing_users(flags: &[(bool, bool)]) -> DatabaseConnection {
    let db = connect().await;
    Migrator::up(&db, Some(1)).await.unwrap();

    for (i, (is_admin, is_moderator)) in flags.iter().enumerate() {
        let stmt = Query::insert()
            .into_table(Alias::new("users"))
            .columns([
                users::Column::Username,
                users::Column::Email,
                users::Column::IsAdmin,
                users::Column::IsModerator,
            ])
            .values_panic([
                format!("user{i}").into(),
                format!("user{i}@example.com").into(),
                (*is_admin).into(),
                (*is_moderator).into(),
            ])
            .to_owned();
        db.execute(db.get_database_backend().build(&stmt))
            .await
            .unwrap();
    }

    Migrator::up(&db, None).await.unwrap();
    db
}

async fn roles(db: &DatabaseConnection) -> Vec<Role> {
    users::Entity::find()
        .order_by_asc(users::Column::Id)
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.role)
        .collect()
}

async fn set_stored_role(db: &DatabaseConnection, id: i32, role: &str) {
    users::Entity::update_many()
        .col_expr(users::Column::Role, Expr::value(role))
        .filter(users::Column::Id.eq(id))
        .exec(db)
        .await
        .unwrap();
}

#[tokio::test]
async fn migration_backfills_roles_from_flags() {
    let db = migrate_with_existing_users(&SCENARIO).await;

    assert_eq!(
        roles(&db).await,
        vec![Role::Admin, Role::Admin, Role::Moderator, Role::User]
    );

    let verification = RoleBackfiller::new(db, BackfillStrategy::Bulk)
        .verify()
        .await
        .unwrap();
    assert_eq!(verification.total_rows, 4);
    assert_eq!(verification.derived.admin, 2);
    assert_eq!(verification.derived.moderator, 1);
    assert_eq!(verification.derived.user, 1);
    assert_eq!(verification.unclassified, 0);
    assert!(verification.is_consistent());
}

#[tokio::test]
async fn new_users_get_default_role() {
    let db = migrate_with_existing_users(&[]).await;

    let user = users::ActiveModel {
        username: Set("bob".to_string()),
        email: Set("bob@example.com".to_string()),
        is_admin: Set(true),
        is_moderator: Set(false),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    assert_eq!(user.role, Role::User);
    assert!(!user.role_is_consistent());
}

#[tokio::test]
async fn bulk_backfill_repairs_and_is_idempotent() {
    let db = migrate_with_existing_users(&SCENARIO).await;
    set_stored_role(&db, 1, "user").await;
    set_stored_role(&db, 3, "admin").await;

    let backfiller = RoleBackfiller::new(db.clone(), BackfillStrategy::Bulk);
    assert_eq!(backfiller.verify().await.unwrap().mismatched, 2);

    let first = backfiller.run().await.unwrap();
    assert_eq!(first.rows_scanned, 4);
    assert_eq!(first.rows_updated.admin, 2);
    assert_eq!(first.rows_updated.moderator, 1);
    assert_eq!(first.rows_updated.user, 1);
    assert_eq!(first.rows_skipped, 0);
    let after_first = roles(&db).await;

    backfiller.run().await.unwrap();
    assert_eq!(roles(&db).await, after_first);
    assert_eq!(
        after_first,
        vec![Role::Admin, Role::Admin, Role::Moderator, Role::User]
    );
}

#[tokio::test]
async fn row_scan_only_touches_stale_rows() {
    let flags = [
        (true, true),
        (false, false),
        (false, true),
        (false, false),
        (true, false),
    ];
    let db = migrate_with_existing_users(&flags).await;
    set_stored_role(&db, 2, "User").await;
    set_stored_role(&db, 3, "user").await;

    let backfiller = RoleBackfiller::new(db.clone(), BackfillStrategy::RowScan { batch_size: 2 });

    let first = backfiller.run().await.unwrap();
    assert_eq!(first.rows_scanned, 5);
    assert_eq!(first.rows_updated.user, 1);
    assert_eq!(first.rows_updated.moderator, 1);
    assert_eq!(first.rows_updated.admin, 0);
    assert_eq!(first.rows_unrecognized, 0);
    assert_eq!(first.batches.map(|b| b.total_batches), Some(3));

    let second = backfiller.run().await.unwrap();
    assert_eq!(second.rows_scanned, 5);
    assert_eq!(second.rows_updated.total(), 0);

    assert_eq!(
        roles(&db).await,
        vec![Role::Admin, Role::User, Role::Moderator, Role::User, Role::Admin]
    );
}

#[tokio::test]
async fn row_scan_reports_and_replaces_unknown_roles() {
    let db = migrate_with_existing_users(&SCENARIO).await;
    set_stored_role(&db, 3, "owner").await;

    let report = RoleBackfiller::new(db.clone(), BackfillStrategy::RowScan { batch_size: 10 })
        .run()
        .await
        .unwrap();

    assert_eq!(report.rows_unrecognized, 1);
    assert_eq!(report.rows_updated.total(), 1);
    assert_eq!(report.rows_updated.moderator, 1);
    assert_eq!(
        roles(&db).await,
        vec![Role::Admin, Role::Admin, Role::Moderator, Role::User]
    );
}

/// `users` with nullable flags, which the migrations never produce.
async fn nullable_flags_table() -> DatabaseConnection {
    let db = connect().await;
    db.execute_unprepared(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username VARCHAR(50) NOT NULL UNIQUE,
            email VARCHAR(255) NOT NULL UNIQUE,
            is_admin BOOLEAN NULL,
            is_moderator BOOLEAN NULL,
            role VARCHAR(50) NOT NULL DEFAULT 'user',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        INSERT INTO users (username, email, is_admin, is_moderator, role)
        VALUES ('carol', 'carol@example.com', NULL, 1, 'moderator');

        INSERT INTO users (username, email, is_admin, is_moderator, role)
        VALUES ('dave', 'dave@example.com', 1, 0, 'user');
        "#,
    )
    .await
    .unwrap();
    db
}

async fn stored_role(db: &DatabaseConnection, id: i32) -> String {
    users::Entity::find()
        .select_only()
        .column(users::Column::Role)
        .filter(users::Column::Id.eq(id))
        .into_tuple::<String>()
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn null_flags_keep_their_stored_role() {
    let db = nullable_flags_table().await;

    for strategy in [
        BackfillStrategy::Bulk,
        BackfillStrategy::RowScan { batch_size: 1 },
    ] {
        let backfiller = RoleBackfiller::new(db.clone(), strategy);

        let report = backfiller.run().await.unwrap();
        assert_eq!(report.rows_scanned, 2);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(stored_role(&db, 1).await, "moderator");
        assert_eq!(stored_role(&db, 2).await, "admin");

        let verification = backfiller.verify().await.unwrap();
        assert_eq!(verification.total_rows, 2);
        assert_eq!(verification.unclassified, 1);
        assert_eq!(verification.derived.admin, 1);
        assert!(verification.is_consistent());
    }
}

#[tokio::test]
async fn run_and_verify_leaves_every_row_consistent() {
    let db = migrate_with_existing_users(&SCENARIO).await;
    for id in 1..=4 {
        set_stored_role(&db, id, "moderator").await;
    }

    for strategy in [
        BackfillStrategy::Bulk,
        BackfillStrategy::RowScan { batch_size: 3 },
    ] {
        let backfiller = RoleBackfiller::new(db.clone(), strategy);
        let (_, verification) = backfiller.run_and_verify().await.unwrap();
        assert!(verification.is_consistent());
        assert_eq!(verification.derived.total(), 4);
    }

    let users = users::Entity::find().all(&db).await.unwrap();
    assert!(users.iter().all(|user| user.role_is_consistent()));
}

#[test]
fn inconsistent_error_reports_count() {
    let err = BackfillError::Inconsistent { mismatched: 3 };
    assert_eq!(
        err.to_string(),
        "3 users still have a role that does not match their flags"
    );
}
