/*!
The reader manager keeps several chunks open and merges their records in time order.

Each open chunk is a slot holding its decoder and the next record that passed fine filtering (the
"peek"). Slots live in a min-heap keyed by the peek timestamp, with ties broken by collector name
and then by the order in which chunks were opened, so a call to
[get_next_record][ReaderManager::get_next_record] costs one heap pop, one decode and one push.

Ordering only holds among chunks that are open at the same time: a chunk added later may carry
records older than ones already returned.
*/
pub mod decoder;

pub use decoder::{ChunkDecoder, DecoderFactory, MrtDecoder, MrtDecoderFactory};

use crate::error::StreamError;
use crate::filter::FilterSet;
use crate::models::{BgpStreamRecord, ChunkDescriptor, DecodedRecord, DumpPosition};
use log::{debug, error};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

struct ReaderSlot {
    chunk: ChunkDescriptor,
    decoder: Box<dyn ChunkDecoder>,
    peek: DecodedRecord,
    seq: u64,
    emitted: u64,
}

impl ReaderSlot {
    fn merge_order(&self, other: &Self) -> Ordering {
        self.peek
            .timestamp
            .total_cmp(&other.peek.timestamp)
            .then_with(|| self.chunk.collector.cmp(&other.chunk.collector))
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialEq for ReaderSlot {
    fn eq(&self, other: &Self) -> bool {
        self.merge_order(other) == Ordering::Equal
    }
}

impl Eq for ReaderSlot {}

impl PartialOrd for ReaderSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// reversed: BinaryHeap pops the greatest element
impl Ord for ReaderSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        other.merge_order(self)
    }
}

/// Pull records from `decoder` until one passes `filters`.
fn next_matching(
    decoder: &mut dyn ChunkDecoder,
    filters: &FilterSet,
) -> Result<Option<DecodedRecord>, StreamError> {
    while let Some(record) = decoder.decode_next()? {
        if let Some(record) = filters.filter_record(record) {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

pub struct ReaderManager {
    factory: Box<dyn DecoderFactory>,
    slots: BinaryHeap<ReaderSlot>,
    pending_errors: VecDeque<StreamError>,
    next_seq: u64,
}

impl Default for ReaderManager {
    fn default() -> Self {
        ReaderManager::new(Box::new(MrtDecoderFactory))
    }
}

impl ReaderManager {
    pub fn new(factory: Box<dyn DecoderFactory>) -> ReaderManager {
        ReaderManager {
            factory,
            slots: BinaryHeap::new(),
            pending_errors: VecDeque::new(),
            next_seq: 0,
        }
    }

    pub fn set_factory(&mut self, factory: Box<dyn DecoderFactory>) {
        self.factory = factory;
    }

    /// No open chunk and no error left to report.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.pending_errors.is_empty()
    }

    /// Number of chunks currently open.
    pub fn open_chunks(&self) -> usize {
        self.slots.len()
    }

    /// Open `chunks` and add them to the merge.
    ///
    /// Chunks that cannot be opened are logged and dropped. Chunks without any record passing
    /// `filters` are closed right away. A chunk failing to decode is dropped and its error is
    /// reported by the next call to [get_next_record][ReaderManager::get_next_record].
    pub fn add(&mut self, chunks: Vec<ChunkDescriptor>, filters: &FilterSet) {
        for chunk in chunks {
            let mut decoder = match self.factory.open(&chunk) {
                Ok(d) => d,
                Err(e) => {
                    error!("dropping chunk: {}", e);
                    continue;
                }
            };
            match next_matching(decoder.as_mut(), filters) {
                Ok(Some(peek)) => {
                    debug!("opened chunk {} (seq {})", chunk.locator, self.next_seq);
                    self.slots.push(ReaderSlot {
                        chunk,
                        decoder,
                        peek,
                        seq: self.next_seq,
                        emitted: 0,
                    });
                    self.next_seq += 1;
                }
                Ok(None) => debug!("no matching record in chunk {}", chunk.locator),
                Err(e) => {
                    error!("dropping chunk: {}", e);
                    self.pending_errors.push_back(e);
                }
            }
        }
    }

    /// Return the oldest record among the open chunks.
    ///
    /// `Ok(None)` means no chunk is open. A queued decode error is returned once, ahead of any
    /// record.
    pub fn get_next_record(
        &mut self,
        filters: &FilterSet,
    ) -> Result<Option<BgpStreamRecord>, StreamError> {
        if let Some(e) = self.pending_errors.pop_front() {
            return Err(e);
        }
        let mut slot = match self.slots.pop() {
            None => return Ok(None),
            Some(slot) => slot,
        };
        let first = slot.emitted == 0;
        slot.emitted += 1;

        match next_matching(slot.decoder.as_mut(), filters) {
            Ok(Some(next)) => {
                let record = std::mem::replace(&mut slot.peek, next);
                let position = match first {
                    true => DumpPosition::Start,
                    false => DumpPosition::Middle,
                };
                let record = BgpStreamRecord::from_decoded(&slot.chunk, record, position);
                self.slots.push(slot);
                Ok(Some(record))
            }
            Ok(None) => {
                debug!(
                    "finished chunk {} after {} records",
                    slot.chunk.locator, slot.emitted
                );
                Ok(Some(BgpStreamRecord::from_decoded(
                    &slot.chunk,
                    slot.peek,
                    DumpPosition::End,
                )))
            }
            Err(e) => {
                error!("dropping chunk: {}", e);
                self.pending_errors.push_back(e);
                Ok(Some(BgpStreamRecord::from_decoded(
                    &slot.chunk,
                    slot.peek,
                    DumpPosition::End,
                )))
            }
        }
    }

    /// Close every open chunk and forget queued errors.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.pending_errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DumpType;
    use bgpkit_parser::models::{Asn, BgpElem};
    use std::collections::HashMap;

    /// Decodes chunks from in-memory record timestamps. A negative timestamp is a decode error.
    struct MemoryDecoder {
        locator: String,
        timestamps: VecDeque<f64>,
    }

    impl ChunkDecoder for MemoryDecoder {
        fn decode_next(&mut self) -> Result<Option<DecodedRecord>, StreamError> {
            match self.timestamps.pop_front() {
                None => Ok(None),
                Some(ts) if ts < 0.0 => Err(StreamError::Decode {
                    locator: self.locator.clone(),
                    reason: "bad record".to_string(),
                }),
                Some(ts) => Ok(Some(DecodedRecord {
                    timestamp: ts,
                    elems: vec![BgpElem {
                        timestamp: ts,
                        peer_asn: Asn::from(ts as u32),
                        ..Default::default()
                    }],
                })),
            }
        }
    }

    struct MemoryFactory {
        chunks: HashMap<String, Vec<f64>>,
    }

    impl DecoderFactory for MemoryFactory {
        fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn ChunkDecoder>, StreamError> {
            match self.chunks.get(&chunk.locator) {
                Some(ts) => Ok(Box::new(MemoryDecoder {
                    locator: chunk.locator.clone(),
                    timestamps: ts.iter().copied().collect(),
                })),
                None => Err(StreamError::ChunkOpen {
                    locator: chunk.locator.clone(),
                    reason: "no such chunk".to_string(),
                }),
            }
        }
    }

    fn manager(chunks: &[(&str, &[f64])]) -> ReaderManager {
        ReaderManager::new(Box::new(MemoryFactory {
            chunks: chunks
                .iter()
                .map(|(l, ts)| (l.to_string(), ts.to_vec()))
                .collect(),
        }))
    }

    fn chunk(collector: &str, locator: &str) -> ChunkDescriptor {
        ChunkDescriptor::new("test", collector, DumpType::Update, locator, 0, 300)
    }

    fn all_filters() -> FilterSet {
        let mut filters = FilterSet::new();
        filters.add_interval(0, None);
        filters
    }

    fn drain(mgr: &mut ReaderManager, filters: &FilterSet) -> Vec<f64> {
        let mut timestamps = vec![];
        while let Some(record) = mgr.get_next_record(filters).unwrap() {
            timestamps.push(record.timestamp);
        }
        timestamps
    }

    #[test]
    fn test_merge_order() {
        let mut mgr = manager(&[
            ("a", &[10.0, 20.0, 30.0]),
            ("b", &[15.0, 25.0]),
            ("c", &[5.0, 40.0]),
        ]);
        let filters = all_filters();
        mgr.add(
            vec![chunk("rrc00", "a"), chunk("rrc01", "b"), chunk("rrc02", "c")],
            &filters,
        );
        assert_eq!(mgr.open_chunks(), 3);
        assert_eq!(
            drain(&mut mgr, &filters),
            vec![5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 40.0]
        );
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_tie_break() {
        let mut mgr = manager(&[("x", &[10.0]), ("y", &[10.0]), ("z", &[10.0])]);
        let filters = all_filters();
        mgr.add(
            vec![chunk("rrc01", "x"), chunk("rrc00", "y"), chunk("rrc01", "z")],
            &filters,
        );
        let mut locators = vec![];
        while let Some(record) = mgr.get_next_record(&filters).unwrap() {
            locators.push(record.locator);
        }
        assert_eq!(locators, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_dump_position() {
        let mut mgr = manager(&[("a", &[1.0, 2.0, 3.0]), ("b", &[10.0])]);
        let filters = all_filters();
        mgr.add(vec![chunk("rrc00", "a"), chunk("rrc00", "b")], &filters);
        let mut positions = vec![];
        while let Some(record) = mgr.get_next_record(&filters).unwrap() {
            positions.push(record.position);
        }
        assert_eq!(
            positions,
            vec![
                DumpPosition::Start,
                DumpPosition::Middle,
                DumpPosition::End,
                DumpPosition::End
            ]
        );
    }

    #[test]
    fn test_fault_isolation() {
        let mut mgr = manager(&[("a", &[10.0, 20.0, -1.0, 30.0]), ("b", &[15.0, 25.0, 35.0])]);
        let filters = all_filters();
        mgr.add(vec![chunk("rrc00", "a"), chunk("rrc01", "b")], &filters);

        let mut timestamps = vec![];
        let mut errors = 0;
        loop {
            match mgr.get_next_record(&filters) {
                Ok(Some(record)) => timestamps.push(record.timestamp),
                Ok(None) => break,
                Err(e) => {
                    assert!(e.is_soft());
                    errors += 1;
                }
            }
        }
        assert_eq!(errors, 1);
        assert_eq!(timestamps, vec![10.0, 15.0, 20.0, 25.0, 35.0]);
    }

    #[test]
    fn test_open_failures() {
        let mut mgr = manager(&[("a", &[10.0]), ("empty", &[]), ("bad", &[-1.0])]);
        let filters = all_filters();
        mgr.add(
            vec![
                chunk("rrc00", "missing"),
                chunk("rrc00", "empty"),
                chunk("rrc00", "bad"),
                chunk("rrc00", "a"),
            ],
            &filters,
        );
        assert_eq!(mgr.open_chunks(), 1);
        assert!(matches!(
            mgr.get_next_record(&filters),
            Err(StreamError::Decode { .. })
        ));
        assert_eq!(drain(&mut mgr, &filters), vec![10.0]);
    }

    #[test]
    fn test_fine_filtering() {
        let mut mgr = manager(&[("a", &[5.0, 10.0, 20.0, 30.0])]);
        let mut filters = FilterSet::new();
        filters.add_interval(10, Some(25));
        mgr.add(vec![chunk("rrc00", "a")], &filters);
        assert_eq!(drain(&mut mgr, &filters), vec![10.0, 20.0]);

        let mut mgr = manager(&[("a", &[5.0, 10.0, 20.0, 30.0])]);
        filters.add_interval(0, None);
        filters.add_filter("peer_asn", "20").unwrap();
        mgr.add(vec![chunk("rrc00", "a")], &filters);
        assert_eq!(drain(&mut mgr, &filters), vec![20.0]);
    }

    #[test]
    fn test_clear() {
        let mut mgr = manager(&[("a", &[1.0, 2.0])]);
        let filters = all_filters();
        mgr.add(vec![chunk("rrc00", "a")], &filters);
        assert!(!mgr.is_empty());
        mgr.clear();
        assert!(mgr.is_empty());
        assert!(mgr.get_next_record(&filters).unwrap().is_none());
    }
}
