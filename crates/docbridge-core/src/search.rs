use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, RangeRef, SearchOptions};
use crate::scope::{self, Scope};
use crate::translate::regex_to_wildcard;

/// Caller-facing match semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub prefix_only: bool,
    pub suffix_only: bool,
    pub ignore_space: bool,
    pub ignore_punctuation: bool,
    pub wildcard: bool,
    pub regex: bool,
}

impl MatchOptions {
    /// Maps the options onto the host search primitive, translating regex
    /// queries into the host wildcard dialect.
    pub fn to_native(&self, query: &str) -> BridgeResult<(String, SearchOptions)> {
        if self.regex && self.wildcard {
            return Err(BridgeError::invalid(
                "'regex' and 'wildcard' cannot be combined",
            ));
        }
        let native_query = if self.regex {
            regex_to_wildcard(query)?
        } else {
            query.to_string()
        };
        let options = SearchOptions {
            match_case: self.case_sensitive,
            match_whole_word: self.whole_word,
            match_prefix: self.prefix_only,
            match_suffix: self.suffix_only,
            ignore_space: self.ignore_space,
            ignore_punct: self.ignore_punctuation,
            match_wildcards: self.wildcard || self.regex,
        };
        Ok((native_query, options))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub handle: Handle,
    /// Text captured when the search ran. The document may have changed since.
    pub text: String,
}

/// Runs a search and registers one handle per hit, up to `max_results`.
pub fn search(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    query: &str,
    options: &MatchOptions,
    max_results: usize,
) -> BridgeResult<Vec<SearchHit>> {
    let mut hits = find(host, registry, scope, query, options)?;
    let total = hits.len();
    if hits.len() > max_results {
        for dropped in hits.split_off(max_results) {
            host.release_range(dropped);
        }
    }

    let mut texts = Vec::with_capacity(hits.len());
    for &hit in &hits {
        match host.range_text(hit) {
            Ok(text) => texts.push(text),
            Err(err) => {
                for &range in &hits {
                    host.release_range(range);
                }
                return Err(err.into());
            }
        }
    }

    debug!(%scope, total, returned = hits.len(), "search completed");
    Ok(hits
        .into_iter()
        .zip(texts)
        .map(|(range, text)| SearchHit {
            handle: registry.register_range(range),
            text,
        })
        .collect())
}

/// Host ranges for every hit in document order. Nothing is registered; the
/// caller owns the ranges and must release them.
pub(crate) fn find(
    host: &mut dyn DocumentHost,
    registry: &HandleRegistry,
    scope: &Scope,
    query: &str,
    options: &MatchOptions,
) -> BridgeResult<Vec<RangeRef>> {
    if query.is_empty() {
        return Err(BridgeError::invalid("search query must not be empty"));
    }
    let (native_query, native_options) = options.to_native(query)?;
    let resolved = scope::resolve(scope, host, registry)?;
    let hits = host.search(resolved.range, &native_query, &native_options);
    resolved.release(host);
    Ok(hits?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryDocument;

    fn texts(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.text.as_str()).collect()
    }

    #[test]
    fn registers_one_handle_per_hit() {
        let mut document = MemoryDocument::from_text("Cat cat CAT");
        let mut registry = HandleRegistry::new();
        let hits = search(
            &mut document,
            &mut registry,
            &Scope::Document,
            "cat",
            &MatchOptions::default(),
            100,
        )
        .unwrap();
        assert_eq!(texts(&hits), vec!["Cat", "cat", "CAT"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn case_sensitive_filters_hits() {
        let mut document = MemoryDocument::from_text("Cat cat CAT");
        let mut registry = HandleRegistry::new();
        let options = MatchOptions {
            case_sensitive: true,
            ..MatchOptions::default()
        };
        let hits = search(&mut document, &mut registry, &Scope::Document, "cat", &options, 100)
            .unwrap();
        assert_eq!(texts(&hits), vec!["cat"]);
    }

    #[test]
    fn truncates_and_untracks_the_rest() {
        let mut document = MemoryDocument::from_text("a a a a a");
        let mut registry = HandleRegistry::new();
        let hits = search(
            &mut document,
            &mut registry,
            &Scope::Document,
            "a",
            &MatchOptions::default(),
            2,
        )
        .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(document.tracked_range_count(), 2);
    }

    #[test]
    fn regex_runs_through_wildcards() {
        let mut document = MemoryDocument::from_text("in 2024 and 1999, not 12");
        let mut registry = HandleRegistry::new();
        let options = MatchOptions {
            regex: true,
            ..MatchOptions::default()
        };
        let hits = search(
            &mut document,
            &mut registry,
            &Scope::Document,
            r"\d{4}",
            &options,
            100,
        )
        .unwrap();
        assert_eq!(texts(&hits), vec!["2024", "1999"]);
    }

    #[test]
    fn regex_with_wildcard_is_invalid() {
        let options = MatchOptions {
            regex: true,
            wildcard: true,
            ..MatchOptions::default()
        };
        let err = options.to_native("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn empty_query_is_invalid() {
        let mut document = MemoryDocument::from_text("text");
        let mut registry = HandleRegistry::new();
        let err = search(
            &mut document,
            &mut registry,
            &Scope::Document,
            "",
            &MatchOptions::default(),
            100,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
