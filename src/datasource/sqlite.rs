//! `SQLite`-backed chunk catalog.
//!
//! The catalog database holds one table:
//!
//! ```sql
//! CREATE TABLE bgp_data (
//!     path TEXT NOT NULL,
//!     project TEXT NOT NULL,
//!     collector TEXT NOT NULL,
//!     type TEXT NOT NULL,      -- 'ribs' or 'updates'
//!     file_time INTEGER NOT NULL,
//!     time_span INTEGER NOT NULL,
//!     ts INTEGER NOT NULL      -- time the row was published
//! );
//! ```

use crate::datasource::{
    select_published, set_option_value, CatalogRow, Cursor, DataInterface, DataInterfaceOption,
};
use crate::error::StreamError;
use crate::filter::FilterSet;
use crate::models::{ChunkDescriptor, DumpType};
use log::warn;
use rusqlite::{Connection, OpenFlags};
use std::str::FromStr;

/// Rows published after the cursor that may overlap the interval.
const SELECT_ROWS: &str = "\
SELECT path, project, collector, type, file_time, time_span, ts FROM bgp_data \
WHERE ts > ?1 AND file_time <= ?2 AND file_time + time_span >= ?3 \
ORDER BY file_time, ts";

pub struct SqliteInterface {
    options: Vec<DataInterfaceOption>,
    conn: Option<Connection>,
}

impl Default for SqliteInterface {
    fn default() -> Self {
        SqliteInterface::new()
    }
}

impl SqliteInterface {
    pub fn new() -> Self {
        SqliteInterface {
            options: vec![DataInterfaceOption::new("db-file", "sqlite database file").required()],
            conn: None,
        }
    }

    fn unavailable(e: rusqlite::Error) -> StreamError {
        StreamError::BackendUnavailable(format!("sqlite error: {}", e))
    }
}

impl DataInterface for SqliteInterface {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn description(&self) -> &'static str {
        "Retrieve metadata information from a sqlite database"
    }

    fn options(&self) -> &[DataInterfaceOption] {
        &self.options
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), StreamError> {
        set_option_value(self.name(), &mut self.options, name, value)
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let path = super::option_value(&self.options, "db-file").ok_or_else(|| {
            StreamError::MissingOption {
                interface: self.name().to_string(),
                option: "db-file".to_string(),
            }
        })?;
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(
            |e| StreamError::BackendMisconfigured(format!("cannot open {}: {}", path, e)),
        )?;
        self.conn = Some(conn);
        Ok(())
    }

    fn query(
        &mut self,
        filters: &FilterSet,
        cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            StreamError::BackendMisconfigured("sqlite data interface not started".to_string())
        })?;
        let after = cursor.as_timestamp()?.unwrap_or(i64::MIN);
        let (start, end) = match &filters.interval {
            Some(i) => (i.start, i.end.unwrap_or(i64::MAX)),
            None => (i64::MIN, i64::MAX),
        };

        let mut stmt = conn.prepare(SELECT_ROWS).map_err(Self::unavailable)?;
        let rows = stmt
            .query_map(rusqlite::params![after, end, start], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(Self::unavailable)?;

        let mut catalog = vec![];
        for row in rows {
            let (path, project, collector, dump_type, file_time, time_span, ts) =
                row.map_err(Self::unavailable)?;
            match DumpType::from_str(&dump_type) {
                Ok(dump_type) => catalog.push(CatalogRow {
                    chunk: ChunkDescriptor::new(
                        &project, &collector, dump_type, &path, file_time, time_span,
                    ),
                    published: ts,
                }),
                Err(_) => warn!("sqlite: skipping {} with unknown type {}", path, dump_type),
            }
        }
        select_published(catalog, filters, cursor)
    }
}
