use std::path::Path;

use rusqlite::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection as _};
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::TradeRecord;
use crate::secrets::DbCredentials;

const MYSQL_INSERT: &str = "
    INSERT IGNORE INTO congressional_holdings
    (name, action, amount, company, date, filing_delay_days)
    VALUES (?, ?, ?, ?, ?, ?)
";

const SQLITE_INSERT: &str = "
    INSERT OR IGNORE INTO congressional_holdings
    (name, action, amount, company, date, filing_delay_days)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

/// What the database did with an insert-or-ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Row already present; the uniqueness constraint swallowed it.
    Duplicate,
}

impl InsertOutcome {
    fn from_rows(rows: u64) -> Self {
        if rows == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        }
    }
}

/// One open connection to the `congressional_holdings` table, held for a whole run.
///
/// Both backends run with autocommit off: inserts accumulate until [`TradeStore::commit`].
pub enum TradeStore {
    MySql(MySqlConnection),
    Sqlite(Connection),
}

impl TradeStore {
    pub async fn connect_mysql(creds: &DbCredentials) -> Result<Self> {
        let mut conn = MySqlConnectOptions::new()
            .host(&creds.host)
            .port(creds.port)
            .username(&creds.username)
            .password(&creds.password)
            .database(&creds.database)
            .connect()
            .await?;
        sqlx::raw_sql("SET autocommit = 0").execute(&mut conn).await?;
        info!("Connected to MySQL {}:{}/{}", creds.host, creds.port, creds.database);
        Ok(Self::MySql(conn))
    }

    pub fn open_sqlite(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        info!("Opened SQLite database {:?}", path);
        Ok(Self::Sqlite(conn))
    }

    #[cfg(test)]
    pub fn open_sqlite_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::Sqlite(conn))
    }

    pub async fn insert_ignore(&mut self, r: &TradeRecord) -> Result<InsertOutcome> {
        let rows = match self {
            Self::MySql(conn) => sqlx::query(MYSQL_INSERT)
                .bind(&r.name)
                .bind(r.action.as_str())
                .bind(r.amount)
                .bind(&r.company)
                .bind(r.date)
                .bind(r.filing_delay_days)
                .execute(&mut *conn)
                .await?
                .rows_affected(),
            Self::Sqlite(conn) => {
                if conn.is_autocommit() {
                    conn.execute_batch("BEGIN")?;
                }
                conn.execute(
                    SQLITE_INSERT,
                    rusqlite::params![
                        r.name,
                        r.action.as_str(),
                        r.amount,
                        r.company,
                        r.date,
                        r.filing_delay_days,
                    ],
                )? as u64
            }
        };
        Ok(InsertOutcome::from_rows(rows))
    }

    /// Commit whatever the current transaction holds (possibly nothing).
    pub async fn commit(&mut self) -> Result<()> {
        match self {
            Self::MySql(conn) => {
                sqlx::raw_sql("COMMIT").execute(&mut *conn).await?;
            }
            Self::Sqlite(conn) => {
                if !conn.is_autocommit() {
                    conn.execute_batch("COMMIT")?;
                }
            }
        }
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Self::MySql(conn) => conn.close().await?,
            Self::Sqlite(conn) => conn.close().map_err(|(_, e)| e)?,
        }
        debug!("database connection closed");
        Ok(())
    }

    #[cfg(test)]
    pub fn sqlite_rows(&self) -> Result<Vec<TradeRecord>> {
        let Self::Sqlite(conn) = self else {
            panic!("sqlite_rows on a MySQL store");
        };
        let mut stmt = conn.prepare(
            "SELECT name, action, amount, company, date, filing_delay_days
             FROM congressional_holdings ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let action: String = row.get(1)?;
                Ok(TradeRecord {
                    name: row.get(0)?,
                    action: if action == "bought" {
                        crate::parser::Action::Bought
                    } else {
                        crate::parser::Action::Sold
                    },
                    amount: row.get(2)?,
                    company: row.get(3)?,
                    date: row.get(4)?,
                    filing_delay_days: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[cfg(test)]
    pub fn in_transaction(&self) -> bool {
        match self {
            Self::Sqlite(conn) => !conn.is_autocommit(),
            Self::MySql(_) => false,
        }
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS congressional_holdings (
            id                INTEGER PRIMARY KEY,
            name              TEXT NOT NULL,
            action            TEXT NOT NULL CHECK(action IN ('bought','sold')),
            amount            INTEGER NOT NULL,
            company           TEXT NOT NULL,
            date              TEXT NOT NULL,
            filing_delay_days INTEGER NOT NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(name, action, amount, company, date, filing_delay_days)
        );
        CREATE INDEX IF NOT EXISTS idx_holdings_date ON congressional_holdings(date);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_description;

    fn jane() -> TradeRecord {
        parse_description(
            "Jane Doe bought $1,000 of Acme Corp on 2024-03-01. She filed the trade after 37 days.",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_duplicate() {
        let mut store = TradeStore::open_sqlite_in_memory().unwrap();
        assert_eq!(store.insert_ignore(&jane()).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_ignore(&jane()).await.unwrap(), InsertOutcome::Duplicate);
        store.commit().await.unwrap();
        assert_eq!(store.sqlite_rows().unwrap(), vec![jane()]);
    }

    #[tokio::test]
    async fn insert_opens_transaction_commit_closes_it() {
        let mut store = TradeStore::open_sqlite_in_memory().unwrap();
        assert!(!store.in_transaction());
        store.insert_ignore(&jane()).await.unwrap();
        assert!(store.in_transaction());
        store.commit().await.unwrap();
        assert!(!store.in_transaction());
        // committing with nothing pending is fine
        store.commit().await.unwrap();
    }

    #[tokio::test]
    async fn file_backed_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/holdings.sqlite");

        let mut store = TradeStore::open_sqlite(&path).unwrap();
        store.insert_ignore(&jane()).await.unwrap();
        store.commit().await.unwrap();
        store.close().await.unwrap();

        let store = TradeStore::open_sqlite(&path).unwrap();
        assert_eq!(store.sqlite_rows().unwrap().len(), 1);
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
