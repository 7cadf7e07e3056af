//! In-memory data interface and decoder shared by the integration tests.
#![allow(dead_code)]

use bgpkit_parser::models::{Asn, BgpElem};
use bgpkit_stream::datasource::Cursor;
use bgpkit_stream::{
    BgpStream, ChunkDecoder, ChunkDescriptor, DataInterface, DataInterfaceOption, DecodedRecord,
    DecoderFactory, DumpType, FilterSet, StreamError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Replays a script of query results, then keeps answering with no chunks.
pub struct ScriptedInterface {
    options: Vec<DataInterfaceOption>,
    script: VecDeque<Result<Vec<ChunkDescriptor>, StreamError>>,
    queries: Arc<AtomicUsize>,
}

impl ScriptedInterface {
    pub fn new(script: Vec<Result<Vec<ChunkDescriptor>, StreamError>>) -> (Self, Arc<AtomicUsize>) {
        let queries = Arc::new(AtomicUsize::new(0));
        let interface = ScriptedInterface {
            options: vec![],
            script: script.into(),
            queries: queries.clone(),
        };
        (interface, queries)
    }
}

impl DataInterface for ScriptedInterface {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn description(&self) -> &'static str {
        "replays scripted query results"
    }

    fn options(&self) -> &[DataInterfaceOption] {
        &self.options
    }

    fn set_option(&mut self, name: &str, _value: &str) -> Result<(), StreamError> {
        Err(StreamError::UnknownOption {
            interface: self.name().to_string(),
            option: name.to_string(),
        })
    }

    fn query(
        &mut self,
        _filters: &FilterSet,
        _cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        let chunks = self.script.pop_front().unwrap_or(Ok(vec![]))?;
        Ok((chunks, Cursor::from_timestamp(n as i64)))
    }
}

/// One entry of an in-memory chunk.
#[derive(Clone)]
pub enum Entry {
    Record(DecodedRecord),
    Corrupted,
}

/// A record at `ts` with one element per peer ASN.
pub fn record(ts: f64, peer_asns: &[u32]) -> Entry {
    Entry::Record(DecodedRecord {
        timestamp: ts,
        elems: peer_asns
            .iter()
            .map(|asn| BgpElem {
                timestamp: ts,
                peer_asn: Asn::from(*asn),
                ..Default::default()
            })
            .collect(),
    })
}

/// Records at each of `timestamps`, all from peer AS64500.
pub fn records(timestamps: &[f64]) -> Vec<Entry> {
    timestamps.iter().map(|ts| record(*ts, &[64500])).collect()
}

struct MemoryDecoder {
    locator: String,
    entries: VecDeque<Entry>,
}

impl ChunkDecoder for MemoryDecoder {
    fn decode_next(&mut self) -> Result<Option<DecodedRecord>, StreamError> {
        match self.entries.pop_front() {
            None => Ok(None),
            Some(Entry::Record(r)) => Ok(Some(r)),
            Some(Entry::Corrupted) => Err(StreamError::Decode {
                locator: self.locator.clone(),
                reason: "corrupted record".to_string(),
            }),
        }
    }
}

/// Opens chunks by locator from a fixed table.
#[derive(Default)]
pub struct MemoryDecoderFactory {
    chunks: HashMap<String, Vec<Entry>>,
}

impl MemoryDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(mut self, locator: &str, entries: Vec<Entry>) -> Self {
        self.chunks.insert(locator.to_string(), entries);
        self
    }
}

impl DecoderFactory for MemoryDecoderFactory {
    fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn ChunkDecoder>, StreamError> {
        match self.chunks.get(&chunk.locator) {
            Some(entries) => Ok(Box::new(MemoryDecoder {
                locator: chunk.locator.clone(),
                entries: entries.iter().cloned().collect(),
            })),
            None => Err(StreamError::ChunkOpen {
                locator: chunk.locator.clone(),
                reason: "no such chunk".to_string(),
            }),
        }
    }
}

pub fn updates(collector: &str, locator: &str, file_time: i64) -> ChunkDescriptor {
    ChunkDescriptor::new("test", collector, DumpType::Update, locator, file_time, 300)
}

/// A stream reading from `interface` through `factory`.
pub fn stream_with(interface: ScriptedInterface, factory: MemoryDecoderFactory) -> BgpStream {
    let mut stream = BgpStream::new().with_decoder_factory(factory);
    let id = stream.register_data_interface(Box::new(interface)).unwrap();
    stream.set_data_interface(id).unwrap();
    stream
}

pub fn timestamps(stream: &mut BgpStream) -> Vec<f64> {
    let mut timestamps = vec![];
    while let Some(record) = stream.get_next_record().unwrap() {
        timestamps.push(record.timestamp);
    }
    timestamps
}
