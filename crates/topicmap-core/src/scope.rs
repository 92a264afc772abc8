//! # Scope Resolver
//!
//! Canonicalizes theme sets into reusable scope values and answers scoped
//! retrieval queries with match-any / match-all semantics.
//!
//! A scope is identified by the exact set of its themes: the resolver
//! guarantees that no two scopes with equal theme sets coexist, so scope-id
//! equality is scope equality everywhere else in the engine.

use crate::graph::TopicMapGraph;
use crate::types::{
    AssociationId, ConstructRef, NameId, OccurrenceId, ScopeId, TopicId, TopicMapError, Variant,
    VariantId,
};
use std::collections::BTreeSet;
use tracing::debug;

/// The scope resolution engine.
///
/// All operations are associated functions over a graph value; the
/// resolver itself holds no state.
pub struct ScopeResolver;

impl ScopeResolver {
    /// Resolve a theme set to its canonical scope, creating one on first
    /// use.
    ///
    /// The empty set resolves to the distinguished singleton empty scope.
    /// Otherwise the candidate set is narrowed by intersecting the
    /// scope-ids associated with each theme, stopping early once empty;
    /// a surviving candidate with matching cardinality is the exact scope.
    ///
    /// Idempotent: equal theme sets always resolve to the same scope.
    pub fn get_or_create_scope(
        graph: &mut TopicMapGraph,
        themes: &BTreeSet<TopicId>,
    ) -> Result<ScopeId, TopicMapError> {
        for theme in themes {
            graph.topic(*theme)?;
        }
        if themes.is_empty() {
            return Ok(graph.ensure_empty_scope());
        }

        let mut iter = themes.iter();
        let Some(first) = iter.next() else {
            return Ok(graph.ensure_empty_scope());
        };
        let mut candidates: BTreeSet<ScopeId> = graph
            .scopes_with_theme(*first)
            .cloned()
            .unwrap_or_default();
        for theme in iter {
            if candidates.is_empty() {
                break;
            }
            let next: BTreeSet<ScopeId> = graph
                .scopes_with_theme(*theme)
                .cloned()
                .unwrap_or_default();
            candidates = candidates.intersection(&next).copied().collect();
        }

        // Every surviving candidate contains all requested themes, so an
        // exact cardinality match is an exact set match. Ties cannot occur:
        // equal theme sets never coexist.
        for candidate in candidates {
            if graph.scope_themes(candidate)?.len() == themes.len() {
                return Ok(candidate);
            }
        }

        let id = graph.register_scope(themes.clone());
        debug!(scope = id.0, themes = themes.len(), "created scope");
        Ok(id)
    }

    /// Scopes matching the given themes.
    ///
    /// Match-any returns every scope containing at least one of the
    /// themes; match-all returns scopes containing every theme (possibly
    /// among others). An empty theme slice is an invalid argument.
    pub fn scopes(
        graph: &TopicMapGraph,
        themes: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<ScopeId>, TopicMapError> {
        let themes = require_themes(graph, themes)?;
        let mut result: Option<BTreeSet<ScopeId>> = None;
        for theme in &themes {
            let set: BTreeSet<ScopeId> = graph
                .scopes_with_theme(*theme)
                .cloned()
                .unwrap_or_default();
            result = Some(match result {
                None => set,
                Some(acc) if match_all => {
                    let narrowed: BTreeSet<ScopeId> =
                        acc.intersection(&set).copied().collect();
                    if narrowed.is_empty() {
                        return Ok(Vec::new());
                    }
                    narrowed
                }
                Some(acc) => acc.union(&set).copied().collect(),
            });
        }
        Ok(result.unwrap_or_default().into_iter().collect())
    }

    // -------------------------------------------------------------------------
    // BY-SCOPE QUERIES (exact scope identity)
    // -------------------------------------------------------------------------

    /// Associations bound to exactly the given scope.
    #[must_use]
    pub fn associations_by_scope(graph: &TopicMapGraph, scope: ScopeId) -> Vec<AssociationId> {
        graph
            .associations()
            .filter(|a| a.scope == scope)
            .map(|a| a.id)
            .collect()
    }

    /// Names bound to exactly the given scope.
    #[must_use]
    pub fn names_by_scope(graph: &TopicMapGraph, scope: ScopeId) -> Vec<NameId> {
        graph
            .names()
            .filter(|n| n.scope == scope)
            .map(|n| n.id)
            .collect()
    }

    /// Occurrences bound to exactly the given scope.
    #[must_use]
    pub fn occurrences_by_scope(graph: &TopicMapGraph, scope: ScopeId) -> Vec<OccurrenceId> {
        graph
            .occurrences()
            .filter(|o| o.scope == scope)
            .map(|o| o.id)
            .collect()
    }

    /// Variants whose explicit scope is exactly the given scope.
    #[must_use]
    pub fn variants_by_scope(graph: &TopicMapGraph, scope: ScopeId) -> Vec<VariantId> {
        graph
            .variants()
            .filter(|v| v.scope == scope)
            .map(|v| v.id)
            .collect()
    }

    // -------------------------------------------------------------------------
    // BY-THEME QUERIES (containment; None denotes the empty scope)
    // -------------------------------------------------------------------------

    /// Associations whose scope contains the theme; `None` selects
    /// unscoped associations (empty scope).
    #[must_use]
    pub fn associations_by_theme(graph: &TopicMapGraph, theme: Option<TopicId>) -> Vec<AssociationId> {
        graph
            .associations()
            .filter(|a| theme_selects(graph, a.scope, theme))
            .map(|a| a.id)
            .collect()
    }

    /// Names whose scope contains the theme; `None` selects unscoped names.
    #[must_use]
    pub fn names_by_theme(graph: &TopicMapGraph, theme: Option<TopicId>) -> Vec<NameId> {
        graph
            .names()
            .filter(|n| theme_selects(graph, n.scope, theme))
            .map(|n| n.id)
            .collect()
    }

    /// Occurrences whose scope contains the theme; `None` selects unscoped
    /// occurrences.
    #[must_use]
    pub fn occurrences_by_theme(graph: &TopicMapGraph, theme: Option<TopicId>) -> Vec<OccurrenceId> {
        graph
            .occurrences()
            .filter(|o| theme_selects(graph, o.scope, theme))
            .map(|o| o.id)
            .collect()
    }

    /// Variants whose effective themes contain the theme.
    ///
    /// A variant's effective themes are the union of its own themes with
    /// its parent name's themes; `None` selects variants whose effective
    /// theme set is empty.
    #[must_use]
    pub fn variants_by_theme(graph: &TopicMapGraph, theme: Option<TopicId>) -> Vec<VariantId> {
        graph
            .variants()
            .filter(|v| {
                let effective = effective_variant_themes(graph, v);
                match theme {
                    Some(t) => effective.contains(&t),
                    None => effective.is_empty(),
                }
            })
            .map(|v| v.id)
            .collect()
    }

    // -------------------------------------------------------------------------
    // BY-THEMES QUERIES (match-any / match-all)
    // -------------------------------------------------------------------------

    /// Associations selected by a theme set under match-any or match-all
    /// semantics. An empty slice is an invalid argument.
    pub fn associations_by_themes(
        graph: &TopicMapGraph,
        themes: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<AssociationId>, TopicMapError> {
        let themes = require_themes(graph, themes)?;
        Ok(graph
            .associations()
            .filter(|a| themes_select(graph, a.scope, &themes, match_all))
            .map(|a| a.id)
            .collect())
    }

    /// Names selected by a theme set.
    pub fn names_by_themes(
        graph: &TopicMapGraph,
        themes: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<NameId>, TopicMapError> {
        let themes = require_themes(graph, themes)?;
        Ok(graph
            .names()
            .filter(|n| themes_select(graph, n.scope, &themes, match_all))
            .map(|n| n.id)
            .collect())
    }

    /// Occurrences selected by a theme set.
    pub fn occurrences_by_themes(
        graph: &TopicMapGraph,
        themes: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<OccurrenceId>, TopicMapError> {
        let themes = require_themes(graph, themes)?;
        Ok(graph
            .occurrences()
            .filter(|o| themes_select(graph, o.scope, &themes, match_all))
            .map(|o| o.id)
            .collect())
    }

    /// Variants selected by a theme set over their effective themes.
    pub fn variants_by_themes(
        graph: &TopicMapGraph,
        themes: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<VariantId>, TopicMapError> {
        let themes = require_themes(graph, themes)?;
        Ok(graph
            .variants()
            .filter(|v| {
                let effective = effective_variant_themes(graph, v);
                if match_all {
                    themes.iter().all(|t| effective.contains(t))
                } else {
                    themes.iter().any(|t| effective.contains(t))
                }
            })
            .map(|v| v.id)
            .collect())
    }

    // -------------------------------------------------------------------------
    // MERGE SUPPORT
    // -------------------------------------------------------------------------

    /// Replace a theme in every scope that contains it.
    ///
    /// Each affected scope is re-resolved through
    /// [`Self::get_or_create_scope`] and every construct bound to it is
    /// rebound; the stale scope is dropped from the registry. Scopes are
    /// never mutated in place.
    pub(crate) fn replace_theme(
        graph: &mut TopicMapGraph,
        old: TopicId,
        new: TopicId,
    ) -> Result<(), TopicMapError> {
        let affected: Vec<ScopeId> = graph
            .scopes_with_theme(old)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for stale in affected {
            let mut themes = graph.scope_themes(stale)?.clone();
            themes.remove(&old);
            themes.insert(new);
            let target = Self::get_or_create_scope(graph, &themes)?;
            if target == stale {
                return Err(TopicMapError::Inconsistent(
                    "theme replacement resolved to the stale scope".to_string(),
                ));
            }
            graph.rebind_scope(stale, target);
            graph.drop_scope(stale);
        }
        Ok(())
    }
}

// =============================================================================
// SELECTION HELPERS
// =============================================================================

fn require_themes(
    graph: &TopicMapGraph,
    themes: &[TopicId],
) -> Result<BTreeSet<TopicId>, TopicMapError> {
    if themes.is_empty() {
        return Err(TopicMapError::InvalidArgument(
            "at least one theme is required".to_string(),
        ));
    }
    for theme in themes {
        if !graph.contains_topic(*theme) {
            return Err(TopicMapError::NotFound(ConstructRef::Topic(*theme)));
        }
    }
    Ok(themes.iter().copied().collect())
}

fn theme_selects(graph: &TopicMapGraph, scope: ScopeId, theme: Option<TopicId>) -> bool {
    match graph.scope_themes(scope) {
        Ok(set) => match theme {
            Some(t) => set.contains(&t),
            None => set.is_empty(),
        },
        Err(_) => false,
    }
}

fn themes_select(
    graph: &TopicMapGraph,
    scope: ScopeId,
    themes: &BTreeSet<TopicId>,
    match_all: bool,
) -> bool {
    match graph.scope_themes(scope) {
        Ok(set) => {
            if match_all {
                themes.iter().all(|t| set.contains(t))
            } else {
                themes.iter().any(|t| set.contains(t))
            }
        }
        Err(_) => false,
    }
}

fn effective_variant_themes(graph: &TopicMapGraph, variant: &Variant) -> BTreeSet<TopicId> {
    let mut themes: BTreeSet<TopicId> = graph
        .scope_themes(variant.scope)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default();
    if let Ok(name) = graph.name(variant.parent) {
        if let Ok(parent_themes) = graph.scope_themes(name.scope) {
            themes.extend(parent_themes.iter().copied());
        }
    }
    themes
}

// =============================================================================
// TESTS
// =============================================================================
