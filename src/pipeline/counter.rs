//! COUNTER processor: drains upstream, yields exactly one
//! EOF. `parent.total_results` already holds the count by the time it fires.

use super::{PipelineContext, RpStatus, SearchResult};

/// Whether `total_results` should reflect the full matching set or just
/// what was paged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingMode {
    /// Count every row the upstream produced, even past the page limit.
    Full,
    /// Count only what actually made it through to the client.
    PageOnly,
}

pub struct CounterProcessor {
    mode: CountingMode,
    paged_count: u64,
}

impl CounterProcessor {
    pub fn new(mode: CountingMode) -> Self {
        CounterProcessor { mode, paged_count: 0 }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        ctx: &mut PipelineContext,
    ) -> (RpStatus, Option<SearchResult>) {
        match &upstream {
            Some((RpStatus::Ok, Some(_))) => {
                self.paged_count += 1;
                (RpStatus::Ok, None)
            }
            Some((RpStatus::Ok, None)) => (RpStatus::Ok, None),
            Some((RpStatus::Eof, _)) | None => {
                if self.mode == CountingMode::PageOnly {
                    ctx.total_results = self.paged_count;
                }
                (RpStatus::Eof, None)
            }
            Some((other, _)) => (*other, None),
        }
    }
}
