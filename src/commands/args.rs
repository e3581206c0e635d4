//! Sequential, keyword-driven cursor over a pre-tokenized argument vector.
//!
//! Shaped after the original source's `ArgsCursor`/`ACArgSpec` pattern
//! (`aggregate_debug.c`, `aggregate_plan.c`): walk forward one token at a
//! time, peek before committing to a branch, and treat "ran off the end"
//! as a syntax error rather than a panic.

use crate::error::{AggError, AggResult};

pub struct ArgCursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> ArgCursor<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        ArgCursor { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    pub fn next(&mut self) -> AggResult<&'a str> {
        let tok = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| AggError::Syntax("unexpected end of arguments".into()))?;
        self.pos += 1;
        Ok(tok.as_str())
    }

    pub fn next_n(&mut self, n: usize) -> AggResult<Vec<String>> {
        (0..n).map(|_| self.next().map(str::to_string)).collect()
    }

    pub fn next_usize(&mut self) -> AggResult<usize> {
        let tok = self.next()?;
        tok.parse()
            .map_err(|_| AggError::ParseArgs(format!("expected a non-negative integer, got {tok}")))
    }

    /// Consumes `keyword` (case-insensitive) if it's next; errors otherwise.
    pub fn expect_keyword(&mut self, keyword: &str) -> AggResult<()> {
        match self.peek() {
            Some(tok) if tok.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(AggError::Syntax(format!("expected {keyword}, got {other}"))),
            None => Err(AggError::Syntax(format!("expected {keyword}, got end of arguments"))),
        }
    }

    /// Consumes `keyword` (case-insensitive) if it's next, without erroring
    /// when it isn't there.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(tok) if tok.eq_ignore_ascii_case(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Drains and returns every remaining token.
    pub fn rest(&mut self) -> Vec<String> {
        let rest = self.tokens[self.pos..].to_vec();
        self.pos = self.tokens.len();
        rest
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_advances_and_errors_at_end() {
        let tokens = vec!["a".to_string(), "b".to_string()];
        let mut cursor = ArgCursor::new(&tokens);
        assert_eq!(cursor.next().unwrap(), "a");
        assert_eq!(cursor.next().unwrap(), "b");
        assert!(cursor.next().is_err());
    }

    #[test]
    fn eat_keyword_is_case_insensitive_and_non_consuming_on_miss() {
        let tokens = vec!["Count".to_string(), "5".to_string()];
        let mut cursor = ArgCursor::new(&tokens);
        assert!(cursor.eat_keyword("count"));
        assert_eq!(cursor.next_usize().unwrap(), 5);

        let tokens = vec!["other".to_string()];
        let mut cursor = ArgCursor::new(&tokens);
        assert!(!cursor.eat_keyword("count"));
        assert_eq!(cursor.peek(), Some("other"));
    }
}
