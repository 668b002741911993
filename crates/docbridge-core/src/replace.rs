use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{BridgeResult, Diagnostic};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, Location};
use crate::scope::{self, Scope};
use crate::search::{find, MatchOptions};

/// `target` value that switches replace into search-driven mode.
pub const SEARCH_QUERY_TARGET: &str = "searchQuery";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    First,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceTarget {
    /// Replace the content of one location.
    Scope(Scope),
    /// Search first, then replace hit by hit.
    SearchQuery,
}

impl ReplaceTarget {
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        if raw == SEARCH_QUERY_TARGET {
            Ok(Self::SearchQuery)
        } else {
            Scope::parse(raw).map(Self::Scope)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub replaced_count: usize,
    /// Range holding the replacement text, for direct replacements.
    pub handle: Option<Handle>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Replaces the content of `scope` with `replacement`.
pub fn replace_at(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    replacement: &str,
) -> BridgeResult<ReplaceOutcome> {
    let resolved = scope::resolve(scope, host, registry)?;
    let inserted = host.insert_text(resolved.range, replacement, Location::Replace);
    resolved.release(host);
    let inserted = inserted?;

    if let Err(err) = host.sync() {
        host.release_range(inserted);
        return Err(err.into());
    }

    debug!(%scope, "direct replacement applied");
    Ok(ReplaceOutcome {
        replaced_count: 1,
        handle: Some(registry.register_range(inserted)),
        diagnostics: Vec::new(),
    })
}

/// Searches `scope` without a result cap and replaces the hits in document
/// order. Failed hits are reported as diagnostics and do not stop the rest.
pub fn replace_matches(
    host: &mut dyn DocumentHost,
    registry: &HandleRegistry,
    scope: &Scope,
    query: &str,
    options: &MatchOptions,
    replacement: &str,
    mode: ReplaceMode,
) -> BridgeResult<ReplaceOutcome> {
    let mut hits = find(host, registry, scope, query, options)?;
    if mode == ReplaceMode::First && hits.len() > 1 {
        for extra in hits.split_off(1) {
            host.release_range(extra);
        }
    }

    let mut outcome = ReplaceOutcome::default();
    for (index, hit) in hits.iter().copied().enumerate() {
        match host.insert_text(hit, replacement, Location::Replace) {
            Ok(inserted) => {
                host.release_range(inserted);
                outcome.replaced_count += 1;
            }
            Err(err) => {
                warn!(hit = index, error = %err, "replacement failed");
                outcome.diagnostics.push(Diagnostic::error(format!(
                    "hit {index}: {}",
                    err.message
                )));
            }
        }
        host.release_range(hit);
    }

    if outcome.replaced_count > 0 {
        host.sync()?;
    }

    debug!(
        %scope,
        hits = hits.len(),
        replaced = outcome.replaced_count,
        "search-driven replacement finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryDocument;

    #[test]
    fn parses_targets() {
        assert_eq!(
            ReplaceTarget::parse("searchQuery").unwrap(),
            ReplaceTarget::SearchQuery
        );
        assert_eq!(
            ReplaceTarget::parse("selection").unwrap(),
            ReplaceTarget::Scope(Scope::Selection)
        );
        assert_eq!(
            ReplaceTarget::parse("everywhere").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn first_mode_replaces_a_single_hit() {
        let mut document = MemoryDocument::from_text("x x x");
        let registry = HandleRegistry::new();
        let outcome = replace_matches(
            &mut document,
            &registry,
            &Scope::Document,
            "x",
            &MatchOptions::default(),
            "y",
            ReplaceMode::First,
        )
        .unwrap();
        assert_eq!(outcome.replaced_count, 1);
        assert_eq!(document.text(), "y x x");
        assert_eq!(document.tracked_range_count(), 0);
    }

    #[test]
    fn growing_replacements_keep_later_hits_aligned() {
        let mut document = MemoryDocument::from_text("a-a-a");
        let registry = HandleRegistry::new();
        let outcome = replace_matches(
            &mut document,
            &registry,
            &Scope::Document,
            "a",
            &MatchOptions::default(),
            "abc",
            ReplaceMode::All,
        )
        .unwrap();
        assert_eq!(outcome.replaced_count, 3);
        assert_eq!(document.text(), "abc-abc-abc");
    }

    #[test]
    fn direct_replacement_returns_handle() {
        let mut document = MemoryDocument::from_text("hello world");
        document.set_selection(6, 11).unwrap();
        let mut registry = HandleRegistry::new();
        let outcome =
            replace_at(&mut document, &mut registry, &Scope::Selection, "there").unwrap();
        assert_eq!(document.text(), "hello there");
        let handle = outcome.handle.unwrap();
        let range = registry.resolve_range(&handle).unwrap();
        assert_eq!(document.range_text(range).unwrap(), "there");
    }
}
