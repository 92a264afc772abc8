//! # Type Hierarchy Index
//!
//! Transitive type/instance and supertype/subtype queries over relations
//! that may legally contain cycles.
//!
//! Both relations are indexed identically: a one-hop edge fetch plus a
//! worklist traversal whose result set doubles as the visited set. A node
//! already in the result is never re-expanded, so self-referencing and
//! mutually-referencing cycles terminate the first time a seen node is
//! revisited, in O(reachable nodes).

use crate::graph::TopicMapGraph;
use crate::types::{AssociationId, NameId, OccurrenceId, RoleId, TopicId, TopicMapError};
use std::collections::{BTreeSet, VecDeque};

/// The type-hierarchy query engine.
///
/// All operations are associated functions over a graph value; the index
/// itself holds no state.
pub struct TypeHierarchy;

// =============================================================================
// SUPERTYPE / SUBTYPE
// =============================================================================

impl TypeHierarchy {
    /// Direct supertypes of a topic; `None` selects topics with no
    /// supertype edge at all.
    pub fn direct_supertypes(
        graph: &TopicMapGraph,
        of: Option<TopicId>,
    ) -> Result<Vec<TopicId>, TopicMapError> {
        match of {
            Some(t) => Ok(graph.topic(t)?.supertypes.iter().copied().collect()),
            None => Ok(graph
                .topics()
                .filter(|t| t.supertypes.is_empty())
                .map(|t| t.id)
                .collect()),
        }
    }

    /// Direct subtypes of a topic; `None` selects topics that are the
    /// supertype of nothing.
    pub fn direct_subtypes(
        graph: &TopicMapGraph,
        of: Option<TopicId>,
    ) -> Result<Vec<TopicId>, TopicMapError> {
        match of {
            Some(t) => {
                graph.topic(t)?;
                Ok(graph
                    .subtypes_index(t)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default())
            }
            None => Ok(graph
                .topics()
                .filter(|t| graph.subtypes_index(t.id).is_none())
                .map(|t| t.id)
                .collect()),
        }
    }

    /// All supertypes reachable from a topic, any number of hops.
    /// Cycle-safe; the seed appears only if a cycle leads back to it.
    pub fn supertypes(
        graph: &TopicMapGraph,
        of: TopicId,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        graph.topic(of)?;
        Ok(closure(graph, of, supertype_edges))
    }

    /// All subtypes reachable from a topic, any number of hops. Cycle-safe.
    pub fn subtypes(
        graph: &TopicMapGraph,
        of: TopicId,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        graph.topic(of)?;
        Ok(closure(graph, of, subtype_edges))
    }

    /// Transitive supertypes of several seed topics, combined by union
    /// (match-any) or intersection (match-all). An empty seed slice is an
    /// invalid argument.
    pub fn supertypes_of_all(
        graph: &TopicMapGraph,
        of: &[TopicId],
        match_all: bool,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        let seeds = require_seeds(graph, of)?;
        let sets = seeds
            .iter()
            .map(|seed| closure(graph, *seed, supertype_edges))
            .collect();
        Ok(combine(sets, match_all))
    }

    /// Transitive subtypes of several seed topics, combined per
    /// `match_all`.
    pub fn subtypes_of_all(
        graph: &TopicMapGraph,
        of: &[TopicId],
        match_all: bool,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        let seeds = require_seeds(graph, of)?;
        let sets = seeds
            .iter()
            .map(|seed| closure(graph, *seed, subtype_edges))
            .collect();
        Ok(combine(sets, match_all))
    }
}

// =============================================================================
// TYPE / INSTANCE
// =============================================================================

impl TypeHierarchy {
    /// Topics in use as a topic type, in deterministic order.
    #[must_use]
    pub fn topic_types(graph: &TopicMapGraph) -> Vec<TopicId> {
        graph.typed_topics().collect()
    }

    /// Topics in use as an association type.
    #[must_use]
    pub fn association_types(graph: &TopicMapGraph) -> Vec<TopicId> {
        distinct(graph.associations().map(|a| a.ty))
    }

    /// Topics in use as a role type.
    #[must_use]
    pub fn role_types(graph: &TopicMapGraph) -> Vec<TopicId> {
        distinct(graph.roles().map(|r| r.ty))
    }

    /// Topics in use as a name type.
    #[must_use]
    pub fn name_types(graph: &TopicMapGraph) -> Vec<TopicId> {
        distinct(graph.names().map(|n| n.ty))
    }

    /// Topics in use as an occurrence type.
    #[must_use]
    pub fn occurrence_types(graph: &TopicMapGraph) -> Vec<TopicId> {
        distinct(graph.occurrences().map(|o| o.ty))
    }

    /// Topics directly typed by `ty`; `None` selects untyped topics.
    pub fn topics_by_type(
        graph: &TopicMapGraph,
        ty: Option<TopicId>,
    ) -> Result<Vec<TopicId>, TopicMapError> {
        match ty {
            Some(t) => {
                graph.topic(t)?;
                Ok(graph
                    .instances_index(t)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default())
            }
            None => Ok(graph
                .topics()
                .filter(|t| t.types.is_empty())
                .map(|t| t.id)
                .collect()),
        }
    }

    /// Topics directly typed by several seed types, combined per
    /// `match_all`.
    pub fn topics_by_types(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let sets = seeds
            .iter()
            .map(|seed| {
                graph
                    .instances_index(*seed)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        Ok(combine(sets, match_all))
    }

    /// Topics typed by `ty` or by any transitive subtype of `ty`.
    pub fn topics_by_type_transitive(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        let types = transitive_type_set(graph, ty)?;
        let mut result = BTreeSet::new();
        for t in types {
            if let Some(instances) = graph.instances_index(t) {
                result.extend(instances.iter().copied());
            }
        }
        Ok(result)
    }

    /// Transitive instances of several seed types, combined per
    /// `match_all`.
    pub fn topics_by_types_transitive(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<BTreeSet<TopicId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let mut sets = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            sets.push(Self::topics_by_type_transitive(graph, *seed)?);
        }
        Ok(combine(sets, match_all))
    }

    /// Associations directly typed by `ty`.
    pub fn associations_by_type(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<AssociationId>, TopicMapError> {
        graph.topic(ty)?;
        Ok(graph
            .associations()
            .filter(|a| a.ty == ty)
            .map(|a| a.id)
            .collect())
    }

    /// Associations typed by `ty` or any transitive subtype of `ty`.
    pub fn associations_by_type_transitive(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<AssociationId>, TopicMapError> {
        let types = transitive_type_set(graph, ty)?;
        Ok(graph
            .associations()
            .filter(|a| types.contains(&a.ty))
            .map(|a| a.id)
            .collect())
    }

    /// Transitive association selection over several seed types.
    pub fn associations_by_types_transitive(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<AssociationId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let mut sets = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            let ids: BTreeSet<AssociationId> = Self::associations_by_type_transitive(graph, *seed)?
                .into_iter()
                .collect();
            sets.push(ids);
        }
        Ok(combine(sets, match_all).into_iter().collect())
    }

    /// Roles directly typed by `ty`.
    pub fn roles_by_type(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<RoleId>, TopicMapError> {
        graph.topic(ty)?;
        Ok(graph.roles().filter(|r| r.ty == ty).map(|r| r.id).collect())
    }

    /// Roles typed by `ty` or any transitive subtype of `ty`.
    pub fn roles_by_type_transitive(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<RoleId>, TopicMapError> {
        let types = transitive_type_set(graph, ty)?;
        Ok(graph
            .roles()
            .filter(|r| types.contains(&r.ty))
            .map(|r| r.id)
            .collect())
    }

    /// Transitive role selection over several seed types.
    pub fn roles_by_types_transitive(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<RoleId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let mut sets = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            let ids: BTreeSet<RoleId> = Self::roles_by_type_transitive(graph, *seed)?
                .into_iter()
                .collect();
            sets.push(ids);
        }
        Ok(combine(sets, match_all).into_iter().collect())
    }

    /// Names directly typed by `ty`.
    pub fn names_by_type(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<NameId>, TopicMapError> {
        graph.topic(ty)?;
        Ok(graph.names().filter(|n| n.ty == ty).map(|n| n.id).collect())
    }

    /// Names typed by `ty` or any transitive subtype of `ty`.
    pub fn names_by_type_transitive(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<NameId>, TopicMapError> {
        let types = transitive_type_set(graph, ty)?;
        Ok(graph
            .names()
            .filter(|n| types.contains(&n.ty))
            .map(|n| n.id)
            .collect())
    }

    /// Transitive name selection over several seed types.
    pub fn names_by_types_transitive(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<NameId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let mut sets = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            let ids: BTreeSet<NameId> = Self::names_by_type_transitive(graph, *seed)?
                .into_iter()
                .collect();
            sets.push(ids);
        }
        Ok(combine(sets, match_all).into_iter().collect())
    }

    /// Occurrences directly typed by `ty`.
    pub fn occurrences_by_type(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<OccurrenceId>, TopicMapError> {
        graph.topic(ty)?;
        Ok(graph
            .occurrences()
            .filter(|o| o.ty == ty)
            .map(|o| o.id)
            .collect())
    }

    /// Occurrences typed by `ty` or any transitive subtype of `ty`.
    pub fn occurrences_by_type_transitive(
        graph: &TopicMapGraph,
        ty: TopicId,
    ) -> Result<Vec<OccurrenceId>, TopicMapError> {
        let types = transitive_type_set(graph, ty)?;
        Ok(graph
            .occurrences()
            .filter(|o| types.contains(&o.ty))
            .map(|o| o.id)
            .collect())
    }

    /// Transitive occurrence selection over several seed types.
    pub fn occurrences_by_types_transitive(
        graph: &TopicMapGraph,
        types: &[TopicId],
        match_all: bool,
    ) -> Result<Vec<OccurrenceId>, TopicMapError> {
        let seeds = require_seeds(graph, types)?;
        let mut sets = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            let ids: BTreeSet<OccurrenceId> = Self::occurrences_by_type_transitive(graph, *seed)?
                .into_iter()
                .collect();
            sets.push(ids);
        }
        Ok(combine(sets, match_all).into_iter().collect())
    }
}

// =============================================================================
// TRAVERSAL HELPERS
// =============================================================================

/// Worklist traversal of a one-hop relation. The result set is also the
/// visited set: a node already present is never re-expanded, which is the
/// entire cycle-safety mechanism.
fn closure<F>(graph: &TopicMapGraph, seed: TopicId, edges: F) -> BTreeSet<TopicId>
where
    F: Fn(&TopicMapGraph, TopicId) -> Vec<TopicId>,
{
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<TopicId> = edges(graph, seed).into();
    while let Some(current) = queue.pop_front() {
        if visited.insert(current) {
            queue.extend(edges(graph, current));
        }
    }
    visited
}

fn supertype_edges(graph: &TopicMapGraph, of: TopicId) -> Vec<TopicId> {
    graph
        .topic(of)
        .map(|t| t.supertypes.iter().copied().collect())
        .unwrap_or_default()
}

fn subtype_edges(graph: &TopicMapGraph, of: TopicId) -> Vec<TopicId> {
    graph
        .subtypes_index(of)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default()
}

/// The seed type together with its transitive subtypes: the set of types
/// whose direct instances a transitive-instance query must union.
fn transitive_type_set(
    graph: &TopicMapGraph,
    ty: TopicId,
) -> Result<BTreeSet<TopicId>, TopicMapError> {
    graph.topic(ty)?;
    let mut types = closure(graph, ty, subtype_edges);
    types.insert(ty);
    Ok(types)
}

/// Combine per-seed result sets: union for match-any, intersection with an
/// empty short-circuit for match-all.
fn combine<T: Ord + Copy>(sets: Vec<BTreeSet<T>>, match_all: bool) -> BTreeSet<T> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    let mut result = first;
    for set in iter {
        if match_all {
            result = result.intersection(&set).copied().collect();
            if result.is_empty() {
                return result;
            }
        } else {
            result.extend(set);
        }
    }
    result
}

fn require_seeds(
    graph: &TopicMapGraph,
    seeds: &[TopicId],
) -> Result<Vec<TopicId>, TopicMapError> {
    if seeds.is_empty() {
        return Err(TopicMapError::InvalidArgument(
            "at least one seed type is required".to_string(),
        ));
    }
    for seed in seeds {
        graph.topic(*seed)?;
    }
    Ok(seeds.to_vec())
}

fn distinct(ids: impl Iterator<Item = TopicId>) -> Vec<TopicId> {
    let set: BTreeSet<TopicId> = ids.collect();
    set.into_iter().collect()
}

// =============================================================================
// TESTS
// =============================================================================
