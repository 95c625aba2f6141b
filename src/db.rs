use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("club_db")]
pub struct ClubDb(sqlx::PgPool);

/// Schema migrations, applied at ignition and by the test harness.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
