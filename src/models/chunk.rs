use crate::error::StreamError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Kind of dump a chunk holds.
///
/// - `Rib`: full routing table snapshot
/// - `Update`: incremental BGP updates
///
/// RIBs order before updates, so a RIB dump and an update dump sharing a file time are opened
/// RIB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DumpType {
    Rib,
    Update,
}

impl FromStr for DumpType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rib" | "ribs" => Ok(DumpType::Rib),
            "update" | "updates" => Ok(DumpType::Update),
            _ => Err(StreamError::InvalidFilter(format!(
                "cannot parse dump type from {}",
                s
            ))),
        }
    }
}

impl Display for DumpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DumpType::Rib => write!(f, "ribs"),
            DumpType::Update => write!(f, "updates"),
        }
    }
}

/// Binary format of a chunk's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DumpFormat {
    #[default]
    Mrt,
}

/// One discoverable unit of dump data, usually one file, covering a bounded time window for one
/// collector.
///
/// Descriptors are produced by a [DataInterface][crate::datasource::DataInterface] query and
/// moved through the input queue into the reader manager, which consumes them when opening the
/// chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkDescriptor {
    pub project: String,
    pub collector: String,
    pub dump_type: DumpType,
    pub format: DumpFormat,
    /// Where the chunk lives: a local path or a remote URL.
    pub locator: String,
    /// Nominal dump time in unix seconds.
    pub file_time: i64,
    /// Number of seconds of routing activity the dump covers, starting at `file_time`.
    pub time_span: i64,
}

/// Identity of a chunk for duplicate suppression: collector, locator and file time.
pub type ChunkKey = (String, String, i64);

impl ChunkDescriptor {
    pub fn new(
        project: &str,
        collector: &str,
        dump_type: DumpType,
        locator: &str,
        file_time: i64,
        time_span: i64,
    ) -> ChunkDescriptor {
        ChunkDescriptor {
            project: project.to_string(),
            collector: collector.to_string(),
            dump_type,
            format: DumpFormat::Mrt,
            locator: locator.to_string(),
            file_time,
            time_span,
        }
    }

    pub fn key(&self) -> ChunkKey {
        (self.collector.clone(), self.locator.clone(), self.file_time)
    }

    /// Last second covered by this chunk.
    pub fn end_time(&self) -> i64 {
        self.file_time.saturating_add(self.time_span)
    }
}

/// Sort descriptors in discovery order: file time, RIBs before updates, collector, locator.
pub(crate) fn sort_chunks(chunks: &mut [ChunkDescriptor]) {
    chunks.sort_by(|a, b| {
        a.file_time
            .cmp(&b.file_time)
            .then(a.dump_type.cmp(&b.dump_type))
            .then_with(|| a.collector.cmp(&b.collector))
            .then_with(|| a.locator.cmp(&b.locator))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_type() {
        assert_eq!(DumpType::from_str("ribs").unwrap(), DumpType::Rib);
        assert_eq!(DumpType::from_str("RIB").unwrap(), DumpType::Rib);
        assert_eq!(DumpType::from_str("updates").unwrap(), DumpType::Update);
        assert!(DumpType::from_str("bmp").is_err());
        assert_eq!(DumpType::Update.to_string(), "updates");
    }

    #[test]
    fn test_sort_chunks() {
        let mut chunks = vec![
            ChunkDescriptor::new("ris", "rrc01", DumpType::Update, "c", 900, 300),
            ChunkDescriptor::new("ris", "rrc00", DumpType::Update, "b", 0, 300),
            ChunkDescriptor::new("ris", "rrc01", DumpType::Rib, "a", 0, 120),
        ];
        sort_chunks(&mut chunks);
        let locators: Vec<&str> = chunks.iter().map(|c| c.locator.as_str()).collect();
        assert_eq!(locators, vec!["a", "b", "c"]);
        assert_eq!(chunks[2].end_time(), 1200);
    }
}
