use std::collections::VecDeque;

use cafrt_core::{CafError, ImageId};

use crate::token::TokenId;

/// Records in-flight non-blocking puts so `sync_memory`/`sync_all` can flush
/// them in FIFO order (`spec.md` §4.D "Ordering guarantees", §5).
///
/// Mutated only from the main thread, per `spec.md` §5 "Shared resources".
#[derive(Default)]
pub struct PendingPutQueue {
    queue: VecDeque<(TokenId, ImageId)>,
}

impl PendingPutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, token: TokenId, image: ImageId) {
        self.queue.push_back((token, image));
    }

    /// Drains the queue in FIFO order, calling `flush` for each distinct
    /// `(token, image)` pair in the order it was first recorded.
    pub fn flush_all<F>(&mut self, mut flush: F) -> Result<(), CafError>
    where
        F: FnMut(TokenId, ImageId) -> Result<(), CafError>,
    {
        while let Some((token, image)) = self.queue.pop_front() {
            flush(token, image)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_in_fifo_order() {
        let mut q = PendingPutQueue::new();
        q.record(TokenId(1), ImageId(2));
        q.record(TokenId(1), ImageId(3));
        q.record(TokenId(2), ImageId(2));
        let mut seen = Vec::new();
        q.flush_all(|t, i| {
            seen.push((t, i));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (TokenId(1), ImageId(2)),
                (TokenId(1), ImageId(3)),
                (TokenId(2), ImageId(2)),
            ]
        );
        assert!(q.is_empty());
    }
}
