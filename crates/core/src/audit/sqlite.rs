use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        event_type TEXT NOT NULL,
        ticket_id TEXT,
        user_id TEXT,
        data TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_audit_events_ticket_id ON audit_events(ticket_id);
    CREATE INDEX IF NOT EXISTS idx_audit_events_event_type ON audit_events(event_type);
"#;

/// Audit inserts may wait behind a queue transaction holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed audit store. Shares the database file with the queue tables.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        Self::from_connection(Connection::open(path).map_err(db_error)?)
    }

    pub fn in_memory() -> Result<Self, AuditError> {
        Self::from_connection(Connection::open_in_memory().map_err(db_error)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("audit connection poisoned".to_string()))
    }

    fn where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        let columns = [
            ("ticket_id", &filter.ticket_id),
            ("event_type", &filter.event_type),
            ("user_id", &filter.user_id),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                conditions.push(format!("{} = ?", column));
                values.push(Box::new(value.clone()));
            }
        }
        if let Some(from) = filter.from {
            conditions.push("timestamp >= ?".to_string());
            values.push(Box::new(timestamp(from)));
        }
        if let Some(to) = filter.to {
            conditions.push("timestamp <= ?".to_string());
            values.push(Box::new(timestamp(to)));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, ticket_id, user_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                timestamp(record.timestamp),
                record.event_type,
                record.ticket_id,
                record.user_id,
                data,
            ],
        )
        .map_err(db_error)?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let (where_clause, mut values) = Self::where_clause(filter);
        values.push(Box::new(filter.limit));
        values.push(Box::new(filter.offset));
        let values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, timestamp, event_type, ticket_id, user_id, data
                 FROM audit_events {} ORDER BY id DESC LIMIT ? OFFSET ?",
                where_clause
            ))
            .map_err(db_error)?;

        let rows = stmt
            .query_map(values.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(db_error)?;

        let records = rows.map(|row| {
            let (id, at, event_type, ticket_id, user_id, data) = row.map_err(db_error)?;
            Ok(AuditRecord {
                id,
                timestamp: DateTime::parse_from_rfc3339(&at)
                    .map_err(|e| AuditError::Database(format!("Invalid timestamp {}: {}", at, e)))?
                    .with_timezone(&Utc),
                event_type,
                ticket_id,
                user_id,
                data: serde_json::from_str::<AuditEvent>(&data)
                    .map_err(|e| AuditError::Serialization(e.to_string()))?,
            })
        });
        records.collect()
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let (where_clause, values) = Self::where_clause(filter);
        let values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        self.conn()?
            .query_row(
                &format!("SELECT COUNT(*) FROM audit_events {}", where_clause),
                values.as_slice(),
                |row| row.get(0),
            )
            .map_err(db_error)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_error(e: rusqlite::Error) -> AuditError {
    AuditError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn record(event: AuditEvent) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            ticket_id: event.ticket_id().map(String::from),
            user_id: event.user_id().map(String::from),
            data: event,
        }
    }

    fn started() -> AuditRecord {
        record(AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        })
    }

    fn issued(ticket_id: &str, number: u32, user_id: &str) -> AuditRecord {
        record(AuditEvent::TicketIssued {
            ticket_id: ticket_id.to_string(),
            number,
            service_date: date(),
            user_id: user_id.to_string(),
        })
    }

    fn reset() -> AuditRecord {
        record(AuditEvent::QueueReset {
            service_date: date(),
            replaced_service_date: Some(date()),
            replaced_next_number: Some(8),
            replaced_current_number: Some(5),
            user_id: "operator".to_string(),
        })
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let id = store.insert(&reset()).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].event_type, "queue_reset");
        assert_eq!(results[0].data, reset().data);
    }

    #[test]
    fn test_newest_first() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&issued("t-1", 1, "anonymous")).unwrap();
        store.insert(&issued("t-2", 2, "anonymous")).unwrap();

        let results = store.query(&AuditFilter::new()).unwrap();
        let ids: Vec<_> = results.iter().filter_map(|r| r.ticket_id.clone()).collect();
        assert_eq!(ids, vec!["t-2", "t-1"]);
    }

    #[test]
    fn test_filters() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&started()).unwrap();
        store.insert(&issued("t-1", 1, "anonymous")).unwrap();
        store.insert(&issued("t-2", 2, "kiosk")).unwrap();
        store.insert(&reset()).unwrap();

        let by_type = AuditFilter::new().with_event_type("ticket_issued");
        assert_eq!(store.query(&by_type).unwrap().len(), 2);

        let by_ticket = AuditFilter::new().with_ticket_id("t-2");
        let results = store.query(&by_ticket).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id.as_deref(), Some("kiosk"));

        let by_user = AuditFilter::new().with_user_id("operator");
        assert_eq!(store.query(&by_user).unwrap().len(), 1);

        let combined = AuditFilter::new()
            .with_event_type("ticket_issued")
            .with_user_id("anonymous");
        assert_eq!(store.count(&combined).unwrap(), 1);
    }

    #[test]
    fn test_time_range() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let now = Utc::now();

        let mut old = started();
        old.timestamp = now - Duration::hours(2);
        store.insert(&old).unwrap();
        store.insert(&started()).unwrap();

        let recent = AuditFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        assert_eq!(store.query(&recent).unwrap().len(), 1);

        let before = AuditFilter::new().with_time_range(None, Some(now - Duration::hours(1)));
        assert_eq!(store.query(&before).unwrap().len(), 1);
    }

    #[test]
    fn test_pagination_and_count() {
        let store = SqliteAuditStore::in_memory().unwrap();
        for n in 1..=5 {
            store.insert(&issued(&format!("t-{}", n), n, "anonymous")).unwrap();
        }

        let page = |offset| {
            store
                .query(&AuditFilter::new().with_limit(2).with_offset(offset))
                .unwrap()
                .len()
        };
        assert_eq!(page(0), 2);
        assert_eq!(page(2), 2);
        assert_eq!(page(4), 1);

        let filter = AuditFilter::new().with_limit(1);
        assert_eq!(store.count(&filter).unwrap(), 5);
    }

    #[test]
    fn test_file_based_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        {
            let store = SqliteAuditStore::new(&path).unwrap();
            store.insert(&started()).unwrap();
        }

        let store = SqliteAuditStore::new(&path).unwrap();
        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 1);
    }
}
