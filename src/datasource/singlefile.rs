//! Data interface that streams one RIB file and/or one updates file.

use crate::datasource::{set_option_value, Cursor, DataInterface, DataInterfaceOption};
use crate::error::StreamError;
use crate::filter::FilterSet;
use crate::models::{ChunkDescriptor, DumpType};

const SINGLEFILE_PROJECT: &str = "singlefile";
const SINGLEFILE_COLLECTOR: &str = "singlefile";
/// Cursor value once the configured files have been handed out.
const DELIVERED: &str = "delivered";

/// Hands out the configured files once, ignoring all filters except the interval start, which
/// becomes the nominal file time.
pub struct SingleFileInterface {
    options: Vec<DataInterfaceOption>,
}

impl Default for SingleFileInterface {
    fn default() -> Self {
        SingleFileInterface::new()
    }
}

impl SingleFileInterface {
    pub fn new() -> Self {
        SingleFileInterface {
            options: vec![
                DataInterfaceOption::new("rib-file", "rib mrt file to read"),
                DataInterfaceOption::new("upd-file", "updates mrt file to read"),
            ],
        }
    }

    fn file(&self, name: &str) -> Option<&str> {
        super::option_value(&self.options, name)
    }
}

impl DataInterface for SingleFileInterface {
    fn name(&self) -> &'static str {
        "singlefile"
    }

    fn description(&self) -> &'static str {
        "Read a single mrt data file (a RIB and/or an update)"
    }

    fn options(&self) -> &[DataInterfaceOption] {
        &self.options
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), StreamError> {
        set_option_value(self.name(), &mut self.options, name, value)
    }

    fn validate(&self) -> Result<(), StreamError> {
        match (self.file("rib-file"), self.file("upd-file")) {
            (None, None) => Err(StreamError::MissingOption {
                interface: self.name().to_string(),
                option: "rib-file or upd-file".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn query(
        &mut self,
        filters: &FilterSet,
        cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
        if !cursor.is_start() {
            return Ok((vec![], cursor.clone()));
        }
        let file_time = filters.interval.map(|i| i.start).unwrap_or_default();
        let mut chunks = vec![];
        for (option, dump_type) in [("rib-file", DumpType::Rib), ("upd-file", DumpType::Update)] {
            if let Some(path) = self.file(option) {
                chunks.push(ChunkDescriptor::new(
                    SINGLEFILE_PROJECT,
                    SINGLEFILE_COLLECTOR,
                    dump_type,
                    path,
                    file_time,
                    0,
                ));
            }
        }
        Ok((chunks, Cursor::new(DELIVERED)))
    }
}
