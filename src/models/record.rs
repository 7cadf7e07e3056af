use crate::models::{ChunkDescriptor, DumpType};
use bgpkit_parser::models::BgpElem;

/// Where a record sits inside the dump it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DumpPosition {
    Start,
    Middle,
    /// Last record of the dump. A dump with a single matching record reports `End`.
    End,
}

/// A record as produced by a chunk decoder, before it is stamped with chunk metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Record time in seconds, microsecond precision when the dump provides it.
    pub timestamp: f64,
    pub elems: Vec<BgpElem>,
}

/// The unit returned to stream consumers.
///
/// A record carries the metadata of the chunk it was decoded from together with the BGP
/// elements that passed the stream's element filters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BgpStreamRecord {
    pub project: String,
    pub collector: String,
    pub dump_type: DumpType,
    /// Nominal time of the dump this record belongs to.
    pub dump_time: i64,
    pub timestamp: f64,
    pub position: DumpPosition,
    /// Locator of the dump this record was read from.
    pub locator: String,
    pub elems: Vec<BgpElem>,
}

impl BgpStreamRecord {
    pub(crate) fn from_decoded(
        chunk: &ChunkDescriptor,
        decoded: DecodedRecord,
        position: DumpPosition,
    ) -> BgpStreamRecord {
        BgpStreamRecord {
            project: chunk.project.clone(),
            collector: chunk.collector.clone(),
            dump_type: chunk.dump_type,
            dump_time: chunk.file_time,
            timestamp: decoded.timestamp,
            position,
            locator: chunk.locator.clone(),
            elems: decoded.elems,
        }
    }
}
