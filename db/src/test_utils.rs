use migration::Migrator;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

/// Fresh in-memory database with the attendance schema applied.
///
/// Every call returns an isolated database, so tests may run in parallel.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");

    Migrator::up(&db, None)
        .await
        .expect("attendance schema migrations");

    db
}
