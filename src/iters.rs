/*!
Iterator adapters over a started [BgpStream].

- [RecordIterator]: records, soft errors logged and skipped, stops at the first hard error
- [FallibleRecordIterator]: records and errors, stops after the first hard error
- [ElemIterator]: the BGP elements of each record, in record order

The iterators do not start the stream, call [BgpStream::start] first.
*/
use crate::error::StreamError;
use crate::models::{BgpElem, BgpStreamRecord};
use crate::stream::BgpStream;
use log::{error, warn};

/// Use [RecordIterator] as the default iterator.
impl IntoIterator for BgpStream {
    type Item = BgpStreamRecord;
    type IntoIter = RecordIterator;

    fn into_iter(self) -> Self::IntoIter {
        RecordIterator::new(self)
    }
}

impl BgpStream {
    pub fn into_record_iter(self) -> RecordIterator {
        RecordIterator::new(self)
    }

    pub fn into_fallible_record_iter(self) -> FallibleRecordIterator {
        FallibleRecordIterator::new(self)
    }

    pub fn into_elem_iter(self) -> ElemIterator {
        ElemIterator::new(self)
    }
}

/*********
Record Iterator
**********/

pub struct RecordIterator {
    stream: BgpStream,
    done: bool,
}

impl RecordIterator {
    fn new(stream: BgpStream) -> RecordIterator {
        RecordIterator {
            stream,
            done: false,
        }
    }
}

impl Iterator for RecordIterator {
    type Item = BgpStreamRecord;

    fn next(&mut self) -> Option<BgpStreamRecord> {
        while !self.done {
            match self.stream.get_next_record() {
                Ok(Some(record)) => return Some(record),
                Ok(None) => self.done = true,
                Err(e) if e.is_soft() => {
                    warn!("{}", e);
                }
                Err(e) => {
                    // data interface failure, stop iterating
                    error!("{}", e);
                    self.done = true;
                }
            }
        }
        None
    }
}

/*********
Fallible Record Iterator
**********/

/// Iterator over records that returns stream errors instead of logging them.
pub struct FallibleRecordIterator {
    stream: BgpStream,
    done: bool,
}

impl FallibleRecordIterator {
    fn new(stream: BgpStream) -> FallibleRecordIterator {
        FallibleRecordIterator {
            stream,
            done: false,
        }
    }
}

impl Iterator for FallibleRecordIterator {
    type Item = Result<BgpStreamRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.get_next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                if !e.is_soft() {
                    self.done = true;
                }
                Some(Err(e))
            }
        }
    }
}

/*********
BgpElem Iterator
**********/

pub struct ElemIterator {
    cache_elems: Vec<BgpElem>,
    record_iter: RecordIterator,
}

impl ElemIterator {
    fn new(stream: BgpStream) -> ElemIterator {
        ElemIterator {
            cache_elems: vec![],
            record_iter: RecordIterator::new(stream),
        }
    }
}

impl Iterator for ElemIterator {
    type Item = BgpElem;

    fn next(&mut self) -> Option<BgpElem> {
        while self.cache_elems.is_empty() {
            // refill cache elems
            let mut elems = self.record_iter.next()?.elems;
            elems.reverse();
            self.cache_elems = elems;
        }
        self.cache_elems.pop()
    }
}
