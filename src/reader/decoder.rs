/*!
Decoder boundary: turning one chunk into a sequence of [DecodedRecord]s.

The reader manager never parses dump bytes itself. It asks a [DecoderFactory] to open each chunk
and pulls records from the returned [ChunkDecoder] until it reports the end of the chunk. Closing
a decoder is dropping it.
*/
use crate::error::StreamError;
use crate::models::{ChunkDescriptor, DecodedRecord};
use bgpkit_parser::error::ParserErrorWithBytes;
use bgpkit_parser::models::MrtRecord;
use bgpkit_parser::{BgpkitParser, Elementor};
use log::debug;

/// An open chunk.
pub trait ChunkDecoder: Send {
    /// Decode the next record, `Ok(None)` at the end of the chunk.
    ///
    /// After an error the decoder is not used again.
    fn decode_next(&mut self) -> Result<Option<DecodedRecord>, StreamError>;
}

/// Opens chunks for the reader manager.
pub trait DecoderFactory: Send {
    fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn ChunkDecoder>, StreamError>;
}

type MrtRecordIter = Box<dyn Iterator<Item = Result<MrtRecord, ParserErrorWithBytes>> + Send>;

/// Decoder for MRT dumps, backed by [bgpkit_parser].
pub struct MrtDecoder {
    locator: String,
    records: MrtRecordIter,
    elementor: Elementor,
}

impl ChunkDecoder for MrtDecoder {
    fn decode_next(&mut self) -> Result<Option<DecodedRecord>, StreamError> {
        match self.records.next() {
            None => Ok(None),
            Some(Ok(record)) => {
                let timestamp = record.common_header.timestamp as f64
                    + record.common_header.microsecond_timestamp.unwrap_or_default() as f64
                        / 1_000_000.0;
                let elems = self.elementor.record_to_elems(record);
                Ok(Some(DecodedRecord { timestamp, elems }))
            }
            Some(Err(e)) => Err(StreamError::Decode {
                locator: self.locator.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Opens chunk locators, local paths or URLs, compressed or not, with [BgpkitParser].
#[derive(Debug, Default, Clone, Copy)]
pub struct MrtDecoderFactory;

impl DecoderFactory for MrtDecoderFactory {
    fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn ChunkDecoder>, StreamError> {
        debug!("opening {} {} dump {}", chunk.collector, chunk.dump_type, chunk.locator);
        let parser =
            BgpkitParser::new(chunk.locator.as_str()).map_err(|e| StreamError::ChunkOpen {
                locator: chunk.locator.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(MrtDecoder {
            locator: chunk.locator.clone(),
            records: Box::new(parser.into_fallible_record_iter()),
            elementor: Elementor::new(),
        }))
    }
}
