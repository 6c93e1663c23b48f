use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod history;
pub mod rules;

/// Async access layer over the panel database.
///
/// All methods are `async fn` over SeaORM. Pending migrations run at
/// connect time, so a fresh database file is usable immediately.
pub struct PanelStore {
    pub(crate) db: DatabaseConnection,
}

impl PanelStore {
    /// Connects and initializes the panel database.
    ///
    /// `db_url` is a full connection URL, e.g.
    /// `sqlite:///var/lib/opsdeck/panel.db?mode=rwc`. WAL mode is
    /// enabled for SQLite so reads do not block the evaluation loop's
    /// writes.
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized panel store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
