//! PROJECTOR / FILTER processors: evaluate an expression AST
//! against each row. The expression language itself is out of scope (it
//! belongs to the query parser, ); both processors depend on it
//! only through [`Expr`].

use super::{PipelineContext, RpStatus, SearchResult};
use crate::value::{RLookupKey, RSValue};

/// A parsed arithmetic/function expression, evaluated against a row.
pub trait Expr: Send {
    fn eval(&self, result: &SearchResult) -> RSValue;
}

pub struct ProjectorProcessor {
    expr: Box<dyn Expr>,
    output_key: RLookupKey,
}

impl ProjectorProcessor {
    pub fn new(expr: Box<dyn Expr>, output_key: RLookupKey) -> Self {
        ProjectorProcessor { expr, output_key }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
    ) -> (RpStatus, Option<SearchResult>) {
        let Some((status, result)) = upstream else {
            return (RpStatus::Eof, None);
        };
        let Some(mut result) = result else {
            return (status, None);
        };
        let value = self.expr.eval(&result);
        result.row.write_key(&self.output_key, value);
        (status, Some(result))
    }
}

pub struct FilterProcessor {
    expr: Box<dyn Expr>,
}

impl FilterProcessor {
    pub fn new(expr: Box<dyn Expr>) -> Self {
        FilterProcessor { expr }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        ctx: &mut PipelineContext,
    ) -> (RpStatus, Option<SearchResult>) {
        let Some((status, result)) = upstream else {
            return (RpStatus::Eof, None);
        };
        let Some(result) = result else {
            return (status, None);
        };
        if self.expr.eval(&result).is_truthy() {
            (status, Some(result))
        } else {
            ctx.total_results = ctx.total_results.saturating_sub(1);
            (RpStatus::Ok, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RLookup;

    struct AlwaysTrue;
    impl Expr for AlwaysTrue {
        fn eval(&self, _: &SearchResult) -> RSValue {
            RSValue::Number(1.0)
        }
    }

    struct AlwaysFalse;
    impl Expr for AlwaysFalse {
        fn eval(&self, _: &SearchResult) -> RSValue {
            RSValue::Number(0.0)
        }
    }

    #[test]
    fn filter_drops_falsy_rows_and_decrements_total() {
        let mut ctx = PipelineContext::new();
        ctx.total_results = 1;
        let mut filter = FilterProcessor::new(Box::new(AlwaysFalse));
        let (status, result) = filter.next(
            Some((RpStatus::Ok, Some(SearchResult::default()))),
            &mut ctx,
        );
        assert_eq!(status, RpStatus::Ok);
        assert!(result.is_none());
        assert_eq!(ctx.total_results, 0);
    }

    #[test]
    fn projector_writes_value_to_output_key() {
        let mut lookup = RLookup::new();
        let key = lookup.get_for_write("computed", true).unwrap();
        let mut projector = ProjectorProcessor::new(Box::new(AlwaysTrue), key.clone());
        let (_, result) = projector.next(Some((RpStatus::Ok, Some(SearchResult::default()))));
        assert_eq!(result.unwrap().row.read(&key), Some(&RSValue::Number(1.0)));
    }
}
