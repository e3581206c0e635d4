//! NETWORK processor ("NETWORK (RPNet)"): root of a
//! distributed local pipeline. Drives the fan-in iterator (`crate::network`)
//! and converts each shard row into a [`SearchResult`].

use super::{RpStatus, SearchResult};
use crate::network::FanIn;
use crate::value::{RLookup, RLookupRow};
use std::time::Instant;

pub struct NetworkProcessor {
    fan_in: FanIn,
    lookup: RLookup,
    next_doc_id: u64,
}

impl NetworkProcessor {
    pub fn new(fan_in: FanIn, lookup: RLookup) -> Self {
        NetworkProcessor { fan_in, lookup, next_doc_id: 1 }
    }

    pub fn next(&mut self) -> (RpStatus, Option<SearchResult>) {
        match self.fan_in.next_row(None) {
            Ok(Some(shard_row)) => {
                let mut row = RLookupRow::new();
                for (name, value) in shard_row {
                    if let Some(key) = self.lookup.get_for_write(&name, true) {
                        row.write_key(&key, value);
                    }
                }
                let doc_id = self.next_doc_id;
                self.next_doc_id += 1;
                (RpStatus::Ok, Some(SearchResult { doc_id, score: 0.0, row }))
            }
            Ok(None) => (RpStatus::Eof, None),
            Err(e) if e.is_tolerable_timeout() => (RpStatus::TimedOut, None),
            Err(_) => (RpStatus::Error, None),
        }
    }

    /// Same as `next` but gives up once `deadline` passes, surfacing
    /// `Paused` so the caller can materialize a cursor.
    pub fn next_before(&mut self, deadline: Instant) -> (RpStatus, Option<SearchResult>) {
        match self.fan_in.next_row(Some(deadline)) {
            Ok(Some(shard_row)) => {
                let mut row = RLookupRow::new();
                for (name, value) in shard_row {
                    if let Some(key) = self.lookup.get_for_write(&name, true) {
                        row.write_key(&key, value);
                    }
                }
                let doc_id = self.next_doc_id;
                self.next_doc_id += 1;
                (RpStatus::Ok, Some(SearchResult { doc_id, score: 0.0, row }))
            }
            Ok(None) => (RpStatus::Paused, None),
            Err(e) if e.is_tolerable_timeout() => (RpStatus::TimedOut, None),
            Err(_) => (RpStatus::Error, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ShardMessage, ShardReply};
    use crate::value::RSValue;

    #[test]
    fn converts_shard_rows_into_search_results() {
        let fan_in = FanIn::new(1, 4, 8);
        let sender = fan_in.sender();
        sender
            .send(ShardMessage::Reply(ShardReply {
                rows: vec![vec![("cat".into(), RSValue::string("a"))]],
                cursor_id: 0,
                warnings: vec![],
            }))
            .unwrap();
        sender.send(ShardMessage::Done).unwrap();
        let mut processor = NetworkProcessor::new(fan_in, RLookup::new());
        let (status, result) = processor.next();
        assert_eq!(status, RpStatus::Ok);
        assert_eq!(result.unwrap().doc_id, 1);
        let (status2, _) = processor.next();
        assert_eq!(status2, RpStatus::Eof);
    }
}
