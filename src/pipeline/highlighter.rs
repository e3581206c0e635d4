//! HIGHLIGHTER processor: wraps matched terms in tags, or
//! (in synopsis mode) emits a handful of short context fragments instead of
//! the whole field. Falls back to leaving a field unchanged when it isn't
//! full-text or carries no offset information.

use super::{RpStatus, SearchResult};
use crate::value::{RLookupKey, RSValue};

#[derive(Debug, Clone)]
pub struct HighlightTags {
    pub open: String,
    pub close: String,
}

impl Default for HighlightTags {
    fn default() -> Self {
        HighlightTags { open: "<b>".into(), close: "</b>".into() }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum HighlightMode {
    /// Rewrite the whole field, wrapping every matched term.
    Full,
    /// Emit `fragment_count` fragments of roughly `fragment_size` tokens
    /// around matches, joined by `separator`.
    Synopsis { fragment_count: usize, fragment_size: usize },
}

pub struct HighlighterProcessor {
    fields: Vec<RLookupKey>,
    terms: Vec<String>,
    tags: HighlightTags,
    mode: HighlightMode,
    separator: String,
}

impl HighlighterProcessor {
    pub fn new(
        fields: Vec<RLookupKey>,
        terms: Vec<String>,
        tags: HighlightTags,
        mode: HighlightMode,
        separator: String,
    ) -> Self {
        HighlighterProcessor { fields, terms, tags, mode, separator }
    }

    fn wrap_terms(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for (i, word) in text.split_whitespace().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let stripped = word.trim_matches(|c: char| !c.is_alphanumeric());
            if self.terms.iter().any(|t| t.eq_ignore_ascii_case(stripped)) {
                out.push_str(&self.tags.open);
                out.push_str(word);
                out.push_str(&self.tags.close);
            } else {
                out.push_str(word);
            }
        }
        out
    }

    /// Picks windows of tokens around matched terms. With no matches, falls
    /// back to the first `fragment_count` windows.
    fn synopsis(&self, text: &str, fragment_count: usize, fragment_size: usize) -> String {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return String::new();
        }
        let match_positions: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, w)| {
                let stripped = w.trim_matches(|c: char| !c.is_alphanumeric());
                self.terms.iter().any(|t| t.eq_ignore_ascii_case(stripped))
            })
            .map(|(i, _)| i)
            .collect();

        let anchors: Vec<usize> = if match_positions.is_empty() {
            (0..tokens.len())
                .step_by(fragment_size.max(1))
                .take(fragment_count)
                .collect()
        } else {
            match_positions
                .iter()
                .step_by((match_positions.len() / fragment_count.max(1)).max(1))
                .take(fragment_count)
                .copied()
                .collect()
        };

        let half = fragment_size / 2;
        let fragments: Vec<String> = anchors
            .into_iter()
            .map(|center| {
                let start = center.saturating_sub(half);
                let end = (start + fragment_size).min(tokens.len());
                self.wrap_terms(&tokens[start..end].join(" "))
            })
            .collect();
        fragments.join(&self.separator)
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
        for key in &self.fields {
            let Some(text) = result.row.read(key).and_then(RSValue::as_str) else {
                continue; // not full text / no value loaded yet
            };
            let highlighted = match self.mode {
                HighlightMode::Full => self.wrap_terms(text),
                HighlightMode::Synopsis { fragment_count, fragment_size } => {
                    self.synopsis(text, fragment_count, fragment_size)
                }
            };
            result.row.write_key(key, RSValue::string(highlighted));
        }
        (status, Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RLookup;

    fn setup() -> (RLookup, RLookupKey) {
        let mut lookup = RLookup::new();
        let key = lookup.get_for_write("body", true).unwrap();
        (lookup, key)
    }

    #[test]
    fn full_mode_wraps_matched_terms() {
        let (_, key) = setup();
        let mut h = HighlighterProcessor::new(
            vec![key.clone()],
            vec!["fox".into()],
            HighlightTags::default(),
            HighlightMode::Full,
            "...".into(),
        );
        let mut result = SearchResult::default();
        result.row.write_key(&key, RSValue::string("the quick fox jumps"));
        let (_, out) = h.next(Some((RpStatus::Ok, Some(result))));
        let text = out.unwrap().row.read(&key).unwrap().as_str().unwrap().to_string();
        assert_eq!(text, "the quick <b>fox</b> jumps");
    }

    #[test]
    fn unloaded_field_is_left_untouched() {
        let (_, key) = setup();
        let mut h = HighlighterProcessor::new(
            vec![key.clone()],
            vec!["fox".into()],
            HighlightTags::default(),
            HighlightMode::Full,
            "...".into(),
        );
        let result = SearchResult::default();
        let (status, out) = h.next(Some((RpStatus::Ok, Some(result))));
        assert_eq!(status, RpStatus::Ok);
        assert!(out.unwrap().row.read(&key).is_none());
    }

    #[test]
    fn synopsis_mode_joins_fragments_with_separator() {
        let (_, key) = setup();
        let mut h = HighlighterProcessor::new(
            vec![key.clone()],
            vec!["fox".into()],
            HighlightTags::default(),
            HighlightMode::Synopsis { fragment_count: 1, fragment_size: 4 },
            "...".into(),
        );
        let mut result = SearchResult::default();
        result.row.write_key(&key, RSValue::string("the quick brown fox jumps over the lazy dog"));
        let (_, out) = h.next(Some((RpStatus::Ok, Some(result))));
        let text = out.unwrap().row.read(&key).unwrap().as_str().unwrap().to_string();
        assert!(text.contains("<b>fox</b>"));
    }
}
