//! SQLite-backed queue store.
//!
//! Every operation opens its own connection; nothing in this process guards
//! the database. Writers take SQLite's write lock up front with
//! `BEGIN IMMEDIATE`, so concurrent issuers and advancers serialize on the
//! database itself. A busy or locked database is treated as a conflict: the
//! transaction is rolled back and its whole body re-run after a short
//! backoff, until the attempt budget runs out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use super::day_state::STATE_KEY;
use super::{
    advancer, issuer, AdvanceOutcome, QueueDayState, QueueError, QueueStore, QueueTransaction,
    ResetOutcome, Ticket,
};
use crate::config::QueueConfig;
use crate::metrics::{TRANSACTIONS_EXHAUSTED, TRANSACTION_RETRIES};

const TICKET_COLUMNS: &str = "id, number, service_date, completed, created_at";

/// How conflicting transactions are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff grows linearly: `backoff * attempt`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// SQLite-backed queue store.
pub struct SqliteQueueStore {
    path: PathBuf,
    busy_timeout: Duration,
    retry: RetryPolicy,
}

impl SqliteQueueStore {
    /// Open (creating if needed) the database at `path` with default queue settings.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        Self::with_config(path, &QueueConfig::default())
    }

    pub fn with_config(path: &Path, config: &QueueConfig) -> Result<Self, QueueError> {
        let store = Self {
            path: path.to_path_buf(),
            busy_timeout: config.busy_timeout(),
            retry: RetryPolicy::from(config),
        };

        let conn = store.open()?;
        // WAL lets readers proceed while a writer holds the lock.
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(db_error)?;
        Self::initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_state (
                key TEXT PRIMARY KEY,
                service_date TEXT NOT NULL,
                next_number INTEGER NOT NULL,
                current_number INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS queue_tickets (
                id TEXT PRIMARY KEY,
                number INTEGER NOT NULL,
                service_date TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Not unique: a same-day reset hands numbers out again.
            CREATE INDEX IF NOT EXISTS idx_queue_tickets_date_number
                ON queue_tickets(service_date, number);
            "#,
        )
        .map_err(db_error)
    }

    fn open(&self) -> Result<Connection, QueueError> {
        let conn = Connection::open(&self.path).map_err(db_error)?;
        conn.busy_timeout(self.busy_timeout).map_err(db_error)?;
        Ok(conn)
    }

    /// Run `body` atomically, re-running it from scratch on conflict.
    fn transact<T>(
        &self,
        operation: &'static str,
        mut body: impl FnMut(&mut dyn QueueTransaction) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let mut attempt = 1;
        loop {
            match self.attempt(&mut body) {
                Err(QueueError::Conflict) if attempt < self.retry.max_attempts => {
                    TRANSACTION_RETRIES.with_label_values(&[operation]).inc();
                    debug!(operation, attempt, "Transaction conflict, retrying");
                    std::thread::sleep(self.retry.backoff * attempt);
                    attempt += 1;
                }
                Err(QueueError::Conflict) => {
                    TRANSACTIONS_EXHAUSTED.with_label_values(&[operation]).inc();
                    warn!(operation, attempts = attempt, "Transaction retries exhausted");
                    return Err(QueueError::Transient { attempts: attempt });
                }
                result => return result,
            }
        }
    }

    fn attempt<T>(
        &self,
        body: &mut impl FnMut(&mut dyn QueueTransaction) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;

        // Dropping `tx` on an early return rolls everything back.
        let value = body(&mut SqliteTransaction { conn: &tx })?;
        tx.commit().map_err(db_error)?;

        Ok(value)
    }

    /// Plain read outside any transaction.
    fn read<T>(
        &self,
        query: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, QueueError> {
        let conn = self.open()?;
        query(&conn).map_err(|e| match db_error(e) {
            QueueError::Conflict => QueueError::Transient { attempts: 1 },
            other => other,
        })
    }
}

impl QueueStore for SqliteQueueStore {
    fn issue(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<Ticket, QueueError> {
        self.transact("issue", |tx| issuer::issue(tx, today, now))
    }

    fn advance(
        &self,
        today: NaiveDate,
        mark_completed: bool,
    ) -> Result<AdvanceOutcome, QueueError> {
        self.transact("advance", |tx| advancer::advance(tx, today, mark_completed))
    }

    fn reset(&self, today: NaiveDate) -> Result<ResetOutcome, QueueError> {
        self.transact("reset", |tx| advancer::reset(tx, today))
    }

    fn day_state(&self) -> Result<Option<QueueDayState>, QueueError> {
        self.read(load_state)
    }

    fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE id = ?1"),
                params![id],
                row_to_ticket,
            )
            .optional()
        })
    }

    fn tickets_for_date(&self, service_date: NaiveDate) -> Result<Vec<Ticket>, QueueError> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE service_date = ?1 ORDER BY number ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![service_date.to_string()], row_to_ticket)?;
            rows.collect()
        })
    }
}

/// A queue transaction on an open SQLite transaction.
struct SqliteTransaction<'c> {
    conn: &'c Connection,
}

impl QueueTransaction for SqliteTransaction<'_> {
    fn load_state(&mut self) -> Result<Option<QueueDayState>, QueueError> {
        load_state(self.conn).map_err(db_error)
    }

    fn save_state(&mut self, state: &QueueDayState) -> Result<(), QueueError> {
        self.conn
            .execute(
                "INSERT INTO queue_state (key, service_date, next_number, current_number, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    service_date = excluded.service_date,
                    next_number = excluded.next_number,
                    current_number = excluded.current_number,
                    updated_at = excluded.updated_at",
                params![
                    STATE_KEY,
                    state.service_date.to_string(),
                    state.next_number,
                    state.current_number,
                    timestamp(Utc::now()),
                ],
            )
            .map(|_| ())
            .map_err(db_error)
    }

    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), QueueError> {
        self.conn
            .execute(
                &format!("INSERT INTO queue_tickets ({TICKET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    ticket.id,
                    ticket.number,
                    ticket.service_date.to_string(),
                    ticket.completed,
                    timestamp(ticket.created_at),
                ],
            )
            .map(|_| ())
            .map_err(db_error)
    }

    fn find_ticket(
        &mut self,
        service_date: NaiveDate,
        number: u32,
    ) -> Result<Option<Ticket>, QueueError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {TICKET_COLUMNS} FROM queue_tickets
                     WHERE service_date = ?1 AND number = ?2
                     ORDER BY rowid DESC LIMIT 1"
                ),
                params![service_date.to_string(), number],
                row_to_ticket,
            )
            .optional()
            .map_err(db_error)
    }

    fn mark_completed(&mut self, ticket_id: &str) -> Result<(), QueueError> {
        let updated = self
            .conn
            .execute(
                "UPDATE queue_tickets SET completed = 1 WHERE id = ?1",
                params![ticket_id],
            )
            .map_err(db_error)?;

        if updated == 0 {
            return Err(QueueError::TicketNotFound(ticket_id.to_string()));
        }
        Ok(())
    }
}

fn load_state(conn: &Connection) -> rusqlite::Result<Option<QueueDayState>> {
    conn.query_row(
        "SELECT service_date, next_number, current_number FROM queue_state WHERE key = ?1",
        params![STATE_KEY],
        |row| {
            Ok(QueueDayState {
                service_date: parse_date(0, &row.get::<_, String>(0)?)?,
                next_number: row.get(1)?,
                current_number: row.get(2)?,
            })
        },
    )
    .optional()
}

fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
    let created_at: String = row.get(4)?;
    Ok(Ticket {
        id: row.get(0)?,
        number: row.get(1)?,
        service_date: parse_date(2, &row.get::<_, String>(2)?)?,
        completed: row.get(3)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
    })
}

fn parse_date(column: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Fixed-width UTC timestamps so stored values also sort lexically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_error(err: rusqlite::Error) -> QueueError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => QueueError::Conflict,
        _ => QueueError::Database(err.to_string()),
    }
}
