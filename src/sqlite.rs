use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel::QueryResult;

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection. SQLite leaves foreign keys off by
/// default and fails writers immediately on a locked database.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

impl ConnectionOptions {
    pub fn apply(&self, conn: &SqliteConnection) -> QueryResult<()> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        self.apply(conn).map_err(r2d2::Error::QueryError)
    }
}

pub fn connect_pool(database_url: &str) -> Result<Pool, r2d2::PoolError> {
    Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(ConnectionManager::new(database_url))
}

/// Creates any missing tables. Safe to run on every start.
pub fn run_migrations(conn: &SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(include_str!("../migrations/schema.sql"))
}
