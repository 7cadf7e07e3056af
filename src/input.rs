/*!
Input queue: chunks discovered by the data source manager that have not been opened yet.
*/
use crate::models::ChunkDescriptor;
use std::collections::VecDeque;

/// FIFO buffer of chunk descriptors.
///
/// Chunks discovered earlier are handed to the reader manager earlier, which keeps the merge
/// order deterministic for records with equal timestamps.
#[derive(Debug, Default)]
pub struct InputQueue {
    queue: VecDeque<ChunkDescriptor>,
}

impl InputQueue {
    pub fn new() -> InputQueue {
        InputQueue::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn push_many(&mut self, chunks: impl IntoIterator<Item = ChunkDescriptor>) {
        self.queue.extend(chunks);
    }

    /// Remove the chunks to open in the next refill cycle.
    ///
    /// The batch is the head of the queue plus every directly following chunk that starts inside
    /// the coverage of the chunks already taken, so that chunks covering overlapping periods are
    /// merged together by the reader manager. The window grows with each chunk taken.
    pub fn pop_batch(&mut self) -> Vec<ChunkDescriptor> {
        let window_start = match self.queue.front() {
            None => return vec![],
            Some(head) => head.file_time,
        };
        let mut window_end = window_start;
        let mut count = 0;
        for chunk in &self.queue {
            if count > 0 && (chunk.file_time < window_start || chunk.file_time >= window_end) {
                break;
            }
            window_end = window_end.max(chunk.file_time.saturating_add(chunk.time_span.max(1)));
            count += 1;
        }
        self.queue.drain(..count).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
