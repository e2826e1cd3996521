use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::Result;
use crate::models::{Property, Transaction};

const DB_PREFIX: &str = "jc_taxcollector";

/// Where the run's database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Disk(PathBuf),
    Memory,
}

impl Storage {
    /// A fresh timestamp-named file under `dir`, down to the millisecond.
    pub fn timestamped(dir: &Path) -> Self {
        let now = Local::now().format("%Y-%m-%d_%H-%M-%S-%3f");
        Storage::Disk(dir.join(format!("{}_{}.sqlite3", DB_PREFIX, now)))
    }
}

pub fn connect(storage: &Storage) -> Result<Connection> {
    let conn = match storage {
        Storage::Disk(path) => {
            info!("Opening database {}", path.display());
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn
        }
        Storage::Memory => Connection::open_in_memory()?,
    };
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Open a saved database for inspection. Never creates the file, the tables,
/// or changes its journal mode.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    info!("Opening database {} (read-only)", path.display());
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    // Money columns are TEXT so SQLite keeps the exact decimal string.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS properties (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            AccountNumber    INTEGER,
            Block            TEXT,
            Lot              TEXT,
            Qualifier        TEXT,
            OwnersName       TEXT,
            PropertyLocation TEXT,
            ViewPayLink      TEXT
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            Year         INTEGER,
            Qtr          INTEGER,
            TrDueDate    DATE,
            Description  TEXT,
            Billed       TEXT,
            Paid         TEXT,
            OpenBalance  TEXT,
            Days         INTEGER,
            InterestDue  TEXT,
            PaidBy       TEXT,
            property_id  INTEGER NOT NULL REFERENCES properties(id)
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_property ON transactions(property_id);
        ",
    )?;
    Ok(())
}

/// Persistence boundary for parsed records. Each call is all-or-nothing.
pub trait RecordSink {
    /// Persist a batch and write the generated ids back into `properties`.
    fn save_properties(&mut self, properties: &mut [Property]) -> Result<()>;

    /// Persist a batch; every `property_id` must name a saved property.
    fn save_transactions(&mut self, transactions: &mut [Transaction]) -> Result<()>;
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(storage: &Storage) -> Result<Self> {
        let conn = connect(storage)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::open(&Storage::Memory)
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for SqliteSink {
    fn save_properties(&mut self, properties: &mut [Property]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(properties.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO properties
                 (AccountNumber, Block, Lot, Qualifier, OwnersName, PropertyLocation, ViewPayLink)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for p in properties.iter() {
                let id = stmt.insert(params![
                    p.account_number, p.block, p.lot, p.qualifier, p.owners_name,
                    p.property_location, p.view_pay_link,
                ])?;
                ids.push(id);
            }
        }
        tx.commit()?;

        for (p, id) in properties.iter_mut().zip(ids) {
            p.id = Some(id);
        }
        Ok(())
    }

    fn save_transactions(&mut self, transactions: &mut [Transaction]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(transactions.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions
                 (Year, Qtr, TrDueDate, Description, Billed, Paid, OpenBalance, Days,
                  InterestDue, PaidBy, property_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for t in transactions.iter() {
                let id = stmt.insert(params![
                    t.year,
                    t.qtr,
                    t.due_date,
                    t.description,
                    decimal_text(&t.billed),
                    decimal_text(&t.paid),
                    decimal_text(&t.open_balance),
                    t.days,
                    decimal_text(&t.interest_due),
                    t.paid_by,
                    t.property_id,
                ])?;
                ids.push(id);
            }
        }
        tx.commit()?;

        for (t, id) in transactions.iter_mut().zip(ids) {
            t.id = Some(id);
        }
        Ok(())
    }
}

fn decimal_text(d: &Option<Decimal>) -> Option<String> {
    d.map(|v| v.to_string())
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|s| {
        Decimal::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

// ── Lookups ──

pub fn property_by_account(conn: &Connection, account_number: i64) -> Result<Option<Property>> {
    let property = conn
        .query_row(
            "SELECT id, AccountNumber, Block, Lot, Qualifier, OwnersName, PropertyLocation, ViewPayLink
             FROM properties WHERE AccountNumber = ?1 ORDER BY id LIMIT 1",
            params![account_number],
            |row| {
                Ok(Property {
                    id: row.get(0)?,
                    account_number: row.get(1)?,
                    block: row.get(2)?,
                    lot: row.get(3)?,
                    qualifier: row.get(4)?,
                    owners_name: row.get(5)?,
                    property_location: row.get(6)?,
                    view_pay_link: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(property)
}

/// All transactions recorded for one property, in insertion order.
pub fn transactions_for(conn: &Connection, property_id: i64) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, property_id, Year, Qtr, TrDueDate, Description, Billed, Paid,
                OpenBalance, Days, InterestDue, PaidBy
         FROM transactions WHERE property_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![property_id], |row| {
            Ok(Transaction {
                id: row.get(0)?,
                property_id: row.get(1)?,
                year: row.get(2)?,
                qtr: row.get(3)?,
                due_date: row.get(4)?,
                description: row.get(5)?,
                billed: decimal_column(row, 6)?,
                paid: decimal_column(row, 7)?,
                open_balance: decimal_column(row, 8)?,
                days: row.get(9)?,
                interest_due: decimal_column(row, 10)?,
                paid_by: row.get(11)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub properties: usize,
    pub transactions: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let properties: usize = conn.query_row("SELECT COUNT(*) FROM properties", [], |r| r.get(0))?;
    let transactions: usize =
        conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
    Ok(Stats {
        properties,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::ScrapeError;

    fn property(account_number: i64) -> Property {
        Property {
            id: None,
            account_number,
            block: "10701".into(),
            lot: "00021".into(),
            qualifier: String::new(),
            owners_name: "DOE, JANE".into(),
            property_location: "7 MONTGOMERY ST.".into(),
            view_pay_link: format!("/ViewPay?accountNumber={}", account_number),
        }
    }

    fn transaction(property_id: i64, billed: &str) -> Transaction {
        Transaction {
            id: None,
            property_id,
            year: 2019,
            qtr: 1,
            due_date: NaiveDate::from_ymd_opt(2019, 2, 1).unwrap(),
            description: "Billed".into(),
            billed: Some(Decimal::from_str(billed).unwrap()),
            paid: None,
            open_balance: Some(Decimal::from_str("0.10").unwrap()),
            days: Some(3),
            interest_due: None,
            paid_by: String::new(),
        }
    }

    #[test]
    fn property_ids_are_assigned() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let mut batch = vec![property(1), property(2), property(3)];
        sink.save_properties(&mut batch).unwrap();
        let ids: Vec<_> = batch.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

        let mut more = vec![property(4)];
        sink.save_properties(&mut more).unwrap();
        assert_eq!(more[0].id, Some(4));
    }

    #[test]
    fn transactions_round_trip_exactly() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let mut props = vec![property(2162)];
        sink.save_properties(&mut props).unwrap();
        let pid = props[0].id.unwrap();

        let mut txs = vec![transaction(pid, "1234.56"), transaction(pid, "0.20")];
        sink.save_transactions(&mut txs).unwrap();
        assert!(txs.iter().all(|t| t.id.is_some()));

        let stored = transactions_for(sink.conn(), pid).unwrap();
        assert_eq!(stored, txs);
        assert_eq!(stored[0].billed.unwrap().to_string(), "1234.56");
    }

    #[test]
    fn unknown_property_fails_whole_batch() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let mut props = vec![property(1)];
        sink.save_properties(&mut props).unwrap();
        let pid = props[0].id.unwrap();

        let mut txs = vec![transaction(pid, "1.00"), transaction(999, "2.00")];
        let err = sink.save_transactions(&mut txs).unwrap_err();
        assert!(matches!(err, ScrapeError::Persistence(_)), "{}", err);
        assert!(txs.iter().all(|t| t.id.is_none()));
        assert_eq!(get_stats(sink.conn()).unwrap().transactions, 0);
    }

    #[test]
    fn lookup_by_account() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let mut props = vec![property(10), property(20)];
        sink.save_properties(&mut props).unwrap();

        let found = property_by_account(sink.conn(), 20).unwrap().unwrap();
        assert_eq!(found, props[1]);
        assert!(property_by_account(sink.conn(), 30).unwrap().is_none());
    }

    #[test]
    fn stats_count_rows() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let mut props = vec![property(1), property(2)];
        sink.save_properties(&mut props).unwrap();
        let mut txs = vec![transaction(props[1].id.unwrap(), "5.00")];
        sink.save_transactions(&mut txs).unwrap();

        let s = get_stats(sink.conn()).unwrap();
        assert_eq!((s.properties, s.transactions), (2, 1));
    }

    #[test]
    fn timestamped_file_name() {
        let Storage::Disk(path) = Storage::timestamped(Path::new("/tmp")) else {
            panic!("expected disk storage");
        };
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("jc_taxcollector_") && name.ends_with(".sqlite3"), "{}", name);
        assert!(!name.contains(':'));
        let re = regex::Regex::new(
            r"^jc_taxcollector_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}-\d{3}\.sqlite3$",
        )
        .unwrap();
        assert!(re.is_match(&name), "{}", name);
    }

    #[test]
    fn read_only_open_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.sqlite3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE other (x INTEGER);").unwrap();
        }

        let conn = open_read_only(&path).unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
        assert_eq!(mode, "delete");
        // No schema is created on inspection.
        assert!(matches!(get_stats(&conn), Err(ScrapeError::Persistence(_))));
        assert!(conn.execute("INSERT INTO other (x) VALUES (1)", []).is_err());
    }

    #[test]
    fn read_only_open_reads_saved_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::timestamped(dir.path());
        {
            let mut sink = SqliteSink::open(&storage).unwrap();
            let mut props = vec![property(2162)];
            sink.save_properties(&mut props).unwrap();
            let mut txs = vec![transaction(props[0].id.unwrap(), "12.50")];
            sink.save_transactions(&mut txs).unwrap();
        }

        let Storage::Disk(path) = storage else {
            panic!("expected disk storage");
        };
        let conn = open_read_only(&path).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!((s.properties, s.transactions), (1, 1));
        let found = property_by_account(&conn, 2162).unwrap().unwrap();
        assert_eq!(transactions_for(&conn, found.id.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn read_only_open_never_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sqlite3");
        assert!(open_read_only(&path).is_err());
        assert!(!path.exists());
    }
}
