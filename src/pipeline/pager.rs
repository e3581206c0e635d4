//! PAGER processor: skips `offset`, yields up to `limit`,
//! then EOF.

use super::{RpStatus, SearchResult};

pub struct PagerProcessor {
    remaining_offset: usize,
    remaining_limit: usize,
}

impl PagerProcessor {
    pub fn new(offset: usize, limit: usize) -> Self {
        PagerProcessor {
            remaining_offset: offset,
            remaining_limit: limit,
        }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
    ) -> (RpStatus, Option<SearchResult>) {
        if self.remaining_limit == 0 {
            return (RpStatus::Eof, None);
        }
        let Some((status, result)) = upstream else {
            return (RpStatus::Eof, None);
        };
        let Some(result) = result else {
            return (status, None);
        };
        if self.remaining_offset > 0 {
            self.remaining_offset -= 1;
            return (RpStatus::Ok, None);
        }
        self.remaining_limit -= 1;
        (RpStatus::Ok, Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_offset_then_yields_up_to_limit() {
        let mut pager = PagerProcessor::new(1, 2);
        let mk = |id| {
            Some((
                RpStatus::Ok,
                Some(SearchResult { doc_id: id, score: 0.0, row: Default::default() }),
            ))
        };
        let (_, skipped) = pager.next(mk(1));
        assert!(skipped.is_none());
        let (_, first) = pager.next(mk(2));
        assert_eq!(first.unwrap().doc_id, 2);
        let (_, second) = pager.next(mk(3));
        assert_eq!(second.unwrap().doc_id, 3);
        let (status, _) = pager.next(mk(4));
        assert_eq!(status, RpStatus::Eof);
    }
}
