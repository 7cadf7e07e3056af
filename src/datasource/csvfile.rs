/*!
Data interface reading a chunk catalog from a CSV file.

The file starts with a header naming at least the following columns, in any order:

```text
path,project,collector,type,file_time,time_span,ts
```

- `path`: locator of the dump, local path or URL
- `type`: `ribs` or `updates`
- `file_time`: nominal dump time, unix seconds
- `time_span`: seconds covered by the dump
- `ts`: time the row was published, used as the query cursor

The catalog is re-read on every query, so rows appended later are picked up in live mode.
*/
use crate::datasource::{
    select_published, set_option_value, CatalogRow, Cursor, DataInterface, DataInterfaceOption,
};
use crate::error::StreamError;
use crate::filter::FilterSet;
use crate::models::{ChunkDescriptor, DumpType};
use log::warn;
use std::str::FromStr;

const COLUMNS: [&str; 7] = [
    "path",
    "project",
    "collector",
    "type",
    "file_time",
    "time_span",
    "ts",
];

pub struct CsvFileInterface {
    options: Vec<DataInterfaceOption>,
}

impl Default for CsvFileInterface {
    fn default() -> Self {
        CsvFileInterface::new()
    }
}

impl CsvFileInterface {
    pub fn new() -> Self {
        CsvFileInterface {
            options: vec![DataInterfaceOption::new(
                "csv-file",
                "csv file listing the mrt data to read",
            )
            .required()],
        }
    }

    fn read_rows(&self, path: &str) -> Result<Vec<CatalogRow>, StreamError> {
        let reader = oneio::get_reader(path).map_err(|e| {
            StreamError::BackendUnavailable(format!("cannot read csv file {}: {}", path, e))
        })?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let headers = csv_reader.headers().map_err(|e| {
            StreamError::BackendUnavailable(format!("cannot read csv header of {}: {}", path, e))
        })?;
        let mut index = [0usize; COLUMNS.len()];
        for (i, column) in COLUMNS.iter().enumerate() {
            index[i] = headers.iter().position(|h| h == *column).ok_or_else(|| {
                StreamError::BackendMisconfigured(format!(
                    "csv file {} has no {} column",
                    path, column
                ))
            })?;
        }

        let mut rows = vec![];
        for (line, record) in csv_reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!("{}: skipping unreadable row {}: {}", path, line + 1, e);
                    continue;
                }
            };
            let field = |i: usize| record.get(index[i]).unwrap_or_default();
            match parse_row(
                field(0),
                field(1),
                field(2),
                field(3),
                field(4),
                field(5),
                field(6),
            ) {
                Some(row) => rows.push(row),
                None => warn!("{}: skipping malformed row {}", path, line + 1),
            }
        }
        Ok(rows)
    }
}

fn parse_row(
    path: &str,
    project: &str,
    collector: &str,
    dump_type: &str,
    file_time: &str,
    time_span: &str,
    ts: &str,
) -> Option<CatalogRow> {
    if path.is_empty() {
        return None;
    }
    let dump_type = DumpType::from_str(dump_type).ok()?;
    let chunk = ChunkDescriptor::new(
        project,
        collector,
        dump_type,
        path,
        i64::from_str(file_time).ok()?,
        i64::from_str(time_span).ok()?,
    );
    Some(CatalogRow {
        chunk,
        published: i64::from_str(ts).ok()?,
    })
}

impl DataInterface for CsvFileInterface {
    fn name(&self) -> &'static str {
        "csvfile"
    }

    fn description(&self) -> &'static str {
        "Retrieve metadata information from a csv file"
    }

    fn options(&self) -> &[DataInterfaceOption] {
        &self.options
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), StreamError> {
        set_option_value(self.name(), &mut self.options, name, value)
    }

    fn query(
        &mut self,
        filters: &FilterSet,
        cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
        let path = super::option_value(&self.options, "csv-file").ok_or_else(|| {
            StreamError::MissingOption {
                interface: self.name().to_string(),
                option: "csv-file".to_string(),
            }
        })?;
        let rows = self.read_rows(path)?;
        select_published(rows, filters, cursor)
    }
}
