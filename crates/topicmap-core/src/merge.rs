//! # Merge Engine
//!
//! Unifies two topics into one, consolidating identity, characteristics
//! and graph edges, then eliminates the duplicates the unification exposes.
//!
//! The engine is iterative: an explicit worklist of (kept, absorbed) pairs
//! replaces recursion, and a redirect map resolves ids that were absorbed
//! while a pair was queued. Duplicate elimination can itself discover new
//! pairs (two reifying topics of equal characteristics), which re-enter
//! the same worklist, so arbitrarily deep cascades terminate without
//! growing the stack.

use crate::event::{ChangeEvent, EventSink};
use crate::graph::TopicMapGraph;
use crate::scope::ScopeResolver;
use crate::types::{
    AssociationId, ConstructRef, Locator, NameId, RoleId, ScopeId, TopicId, TopicMapError,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// The topic unification engine.
///
/// All operations are associated functions over a graph value; the engine
/// itself holds no state.
pub struct MergeEngine;

impl MergeEngine {
    /// Merge `other` into `context`.
    ///
    /// `context` survives with the union of both topics' identifiers,
    /// types, supertypes, names, occurrences, played roles and scope
    /// memberships; `other` is removed and its id never again resolves.
    /// Merging a topic with itself is a no-op.
    ///
    /// If both topics reify different constructs the merge is rejected
    /// with an invalid-argument error.
    ///
    /// One [`ChangeEvent`] is published per absorbed topic and per
    /// construct removed by duplicate elimination.
    pub fn merge_topics(
        graph: &mut TopicMapGraph,
        context: TopicId,
        other: TopicId,
        sink: &mut impl EventSink,
    ) -> Result<(), TopicMapError> {
        graph.topic(context)?;
        graph.topic(other)?;
        if context == other {
            return Ok(());
        }

        let mut worklist: Vec<(TopicId, TopicId)> = vec![(context, other)];
        let mut redirect: BTreeMap<TopicId, TopicId> = BTreeMap::new();
        let mut touched: BTreeSet<TopicId> = BTreeSet::new();

        while !worklist.is_empty() {
            while let Some((kept, absorbed)) = worklist.pop() {
                let kept = resolve(&redirect, kept);
                let absorbed = resolve(&redirect, absorbed);
                if kept == absorbed {
                    continue;
                }
                absorb(graph, kept, absorbed)?;
                redirect.insert(absorbed, kept);
                touched.insert(kept);
                debug!(kept = kept.0, absorbed = absorbed.0, "merged topics");
                sink.publish(ChangeEvent::merged(
                    ConstructRef::Topic(kept),
                    ConstructRef::Topic(absorbed),
                ));
            }

            // Duplicate elimination may queue new pairs (reifiers of equal
            // characteristics); re-entering the outer loop re-runs it for
            // the surviving topics after those pairs are absorbed.
            let pending: BTreeSet<TopicId> =
                touched.iter().map(|t| resolve(&redirect, *t)).collect();
            for topic in pending {
                eliminate_duplicates(graph, topic, &mut worklist, sink)?;
            }
        }
        Ok(())
    }

    /// Merging one whole topic map into another is not provided by this
    /// engine.
    pub fn merge_topic_maps(
        _graph: &mut TopicMapGraph,
        _other: &TopicMapGraph,
    ) -> Result<(), TopicMapError> {
        Err(TopicMapError::Unsupported(
            "merging whole topic maps".to_string(),
        ))
    }
}

// =============================================================================
// ABSORPTION
// =============================================================================

/// Follow the redirect chain to the surviving topic. Chains only ever
/// point from absorbed ids to live ones, so the walk terminates.
fn resolve(redirect: &BTreeMap<TopicId, TopicId>, mut id: TopicId) -> TopicId {
    while let Some(&next) = redirect.get(&id) {
        id = next;
    }
    id
}

/// Move everything `absorbed` carries onto `kept` and remove its record.
fn absorb(
    graph: &mut TopicMapGraph,
    kept: TopicId,
    absorbed: TopicId,
) -> Result<(), TopicMapError> {
    // Reification reconciliation comes first: a conflict must abort before
    // any identity has moved.
    let kept_reified = graph.topic(kept)?.reified;
    let absorbed_reified = graph.topic(absorbed)?.reified;
    match (kept_reified, absorbed_reified) {
        (Some(a), Some(b)) if a != b => {
            return Err(TopicMapError::InvalidArgument(
                "merged topics reify different constructs".to_string(),
            ));
        }
        (None, Some(target)) => {
            graph.detach_reifier(target)?;
            graph.set_reifier(target, Some(kept))?;
        }
        _ => {}
    }

    let record = graph.topic(absorbed)?.clone();

    // Identity union. The bindings already passed conflict checks when
    // they were created, so rebinding to the survivor cannot conflict.
    for locator in &record.subject_identifiers {
        graph.rebind_subject_identifier(locator.clone(), kept);
    }
    for locator in &record.subject_locators {
        graph.rebind_subject_locator(locator.clone(), kept);
    }
    for locator in &record.item_identifiers {
        graph.rebind_item_identifier(locator.clone(), ConstructRef::Topic(kept));
    }
    {
        let survivor = graph.topic_mut(kept)?;
        survivor
            .subject_identifiers
            .extend(record.subject_identifiers.iter().cloned());
        survivor
            .subject_locators
            .extend(record.subject_locators.iter().cloned());
        survivor
            .item_identifiers
            .extend(record.item_identifiers.iter().cloned());
    }

    // Outgoing and incoming type edges. An edge to the absorbed topic
    // itself becomes a self-edge on the survivor.
    for ty in &record.types {
        graph.remove_type(absorbed, *ty)?;
        let ty = if *ty == absorbed { kept } else { *ty };
        graph.add_type(kept, ty)?;
    }
    if let Some(instances) = graph.instances_index(absorbed).cloned() {
        for instance in instances {
            graph.remove_type(instance, absorbed)?;
            let instance = if instance == absorbed { kept } else { instance };
            graph.add_type(instance, kept)?;
        }
    }

    // Outgoing and incoming supertype edges, same self-edge rule.
    for supertype in &record.supertypes {
        graph.remove_supertype(absorbed, *supertype)?;
        let supertype = if *supertype == absorbed { kept } else { *supertype };
        graph.add_supertype(kept, supertype)?;
    }
    if let Some(subtypes) = graph.subtypes_index(absorbed).cloned() {
        for subtype in subtypes {
            graph.remove_supertype(subtype, absorbed)?;
            let subtype = if subtype == absorbed { kept } else { subtype };
            graph.add_supertype(subtype, kept)?;
        }
    }

    // Constructs typed by the absorbed topic are retyped to the survivor.
    retype_constructs(graph, absorbed, kept)?;

    // Roles played by the absorbed topic are rewired to the survivor.
    for role in graph.roles_played_by(absorbed) {
        graph.set_role_player(role, kept)?;
    }

    // Characteristics are reparented wholesale; duplicate elimination
    // runs after the worklist drains.
    for name in &record.names {
        graph.name_mut(*name)?.parent = kept;
    }
    for occurrence in &record.occurrences {
        graph.occurrence_mut(*occurrence)?.parent = kept;
    }
    {
        let survivor = graph.topic_mut(kept)?;
        survivor.names.extend(record.names.iter().copied());
        survivor.occurrences.extend(record.occurrences.iter().copied());
    }

    // Every scope theming on the absorbed topic is re-resolved with the
    // survivor substituted.
    ScopeResolver::replace_theme(graph, absorbed, kept)?;

    graph.take_topic(absorbed)?;
    Ok(())
}

fn retype_constructs(
    graph: &mut TopicMapGraph,
    from: TopicId,
    to: TopicId,
) -> Result<(), TopicMapError> {
    let associations: Vec<AssociationId> = graph
        .associations()
        .filter(|a| a.ty == from)
        .map(|a| a.id)
        .collect();
    for id in associations {
        graph.set_association_type(id, to)?;
    }
    let roles: Vec<RoleId> = graph.roles().filter(|r| r.ty == from).map(|r| r.id).collect();
    for id in roles {
        graph.set_role_type(id, to)?;
    }
    let names: Vec<NameId> = graph.names().filter(|n| n.ty == from).map(|n| n.id).collect();
    for id in names {
        graph.set_name_type(id, to)?;
    }
    let occurrences: Vec<_> = graph
        .occurrences()
        .filter(|o| o.ty == from)
        .map(|o| o.id)
        .collect();
    for id in occurrences {
        graph.set_occurrence_type(id, to)?;
    }
    Ok(())
}

// =============================================================================
// DUPLICATE ELIMINATION
// =============================================================================

/// Remove the duplicates unification exposed on a surviving topic: names
/// (with their variants), occurrences, associations the topic plays in,
/// and roles within those associations.
fn eliminate_duplicates(
    graph: &mut TopicMapGraph,
    topic: TopicId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    dedup_names(graph, topic, worklist, sink)?;
    dedup_occurrences(graph, topic, worklist, sink)?;
    dedup_associations(graph, topic, worklist, sink)?;
    dedup_roles(graph, topic, worklist, sink)?;
    Ok(())
}

/// Reconcile the reifiers of a surviving construct and a duplicate about
/// to be removed. Two distinct reifying topics queue a new merge pair.
fn merge_reifiers(
    graph: &mut TopicMapGraph,
    winner: ConstructRef,
    duplicate: ConstructRef,
    worklist: &mut Vec<(TopicId, TopicId)>,
) -> Result<(), TopicMapError> {
    let kept = graph.reifier_of(winner)?;
    let dropped = graph.reifier_of(duplicate)?;
    match (kept, dropped) {
        (None, Some(reifier)) => {
            graph.detach_reifier(duplicate)?;
            graph.set_reifier(winner, Some(reifier))?;
        }
        (Some(a), Some(b)) => {
            graph.detach_reifier(duplicate)?;
            if a != b {
                worklist.push((a, b));
            }
        }
        _ => {}
    }
    Ok(())
}

fn dedup_names(
    graph: &mut TopicMapGraph,
    topic: TopicId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    let names: Vec<NameId> = graph.topic(topic)?.names.iter().copied().collect();
    let mut seen: BTreeMap<(TopicId, String, ScopeId), NameId> = BTreeMap::new();
    for id in names {
        let record = graph.name(id)?.clone();
        let key = (record.ty, record.value.clone(), record.scope);
        let Some(&winner) = seen.get(&key) else {
            seen.insert(key, id);
            continue;
        };
        merge_reifiers(
            graph,
            ConstructRef::Name(winner),
            ConstructRef::Name(id),
            worklist,
        )?;
        graph.move_item_identifiers(ConstructRef::Name(id), ConstructRef::Name(winner))?;
        // Variants survive the duplicate name by transplantation.
        for variant in record.variants.iter().copied() {
            graph.variant_mut(variant)?.parent = winner;
            graph.name_mut(winner)?.variants.insert(variant);
        }
        graph.name_mut(id)?.variants.clear();
        graph.remove_name(id)?;
        sink.publish(ChangeEvent::removed(
            ConstructRef::Topic(topic),
            ConstructRef::Name(id),
        ));
    }
    for name in seen.into_values() {
        dedup_variants(graph, name, worklist, sink)?;
    }
    Ok(())
}

fn dedup_variants(
    graph: &mut TopicMapGraph,
    name: NameId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    let variants: Vec<_> = graph.name(name)?.variants.iter().copied().collect();
    let mut seen: BTreeMap<(String, Locator, ScopeId), _> = BTreeMap::new();
    for id in variants {
        let record = graph.variant(id)?.clone();
        let key = (record.value.clone(), record.datatype.clone(), record.scope);
        let Some(&winner) = seen.get(&key) else {
            seen.insert(key, id);
            continue;
        };
        merge_reifiers(
            graph,
            ConstructRef::Variant(winner),
            ConstructRef::Variant(id),
            worklist,
        )?;
        graph.move_item_identifiers(ConstructRef::Variant(id), ConstructRef::Variant(winner))?;
        graph.remove_variant(id)?;
        sink.publish(ChangeEvent::removed(
            ConstructRef::Name(name),
            ConstructRef::Variant(id),
        ));
    }
    Ok(())
}

fn dedup_occurrences(
    graph: &mut TopicMapGraph,
    topic: TopicId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    let occurrences: Vec<_> = graph.topic(topic)?.occurrences.iter().copied().collect();
    let mut seen: BTreeMap<(TopicId, String, Locator, ScopeId), _> = BTreeMap::new();
    for id in occurrences {
        let record = graph.occurrence(id)?.clone();
        let key = (
            record.ty,
            record.value.clone(),
            record.datatype.clone(),
            record.scope,
        );
        let Some(&winner) = seen.get(&key) else {
            seen.insert(key, id);
            continue;
        };
        merge_reifiers(
            graph,
            ConstructRef::Occurrence(winner),
            ConstructRef::Occurrence(id),
            worklist,
        )?;
        graph.move_item_identifiers(
            ConstructRef::Occurrence(id),
            ConstructRef::Occurrence(winner),
        )?;
        graph.remove_occurrence(id)?;
        sink.publish(ChangeEvent::removed(
            ConstructRef::Topic(topic),
            ConstructRef::Occurrence(id),
        ));
    }
    Ok(())
}

/// Associations the topic plays a role in, in deterministic order.
fn played_associations(
    graph: &TopicMapGraph,
    topic: TopicId,
) -> Result<BTreeSet<AssociationId>, TopicMapError> {
    let mut parents = BTreeSet::new();
    for role in graph.roles_played_by(topic) {
        parents.insert(graph.role(role)?.parent);
    }
    Ok(parents)
}

/// An association's structural signature: type, scope, and the sorted
/// multiset of its (role-type, player) pairs. Two associations with equal
/// signatures are duplicates.
fn association_signature(
    graph: &TopicMapGraph,
    id: AssociationId,
) -> Result<(TopicId, ScopeId, Vec<(TopicId, TopicId)>), TopicMapError> {
    let record = graph.association(id)?;
    let mut pairs = Vec::with_capacity(record.roles.len());
    for role in &record.roles {
        let role = graph.role(*role)?;
        pairs.push((role.ty, role.player));
    }
    pairs.sort_unstable();
    Ok((record.ty, record.scope, pairs))
}

/// Roles of an association sorted by (type, player, id), so duplicate
/// associations pair their roles positionally.
fn sorted_roles(
    graph: &TopicMapGraph,
    id: AssociationId,
) -> Result<Vec<(TopicId, TopicId, RoleId)>, TopicMapError> {
    let record = graph.association(id)?;
    let mut roles = Vec::with_capacity(record.roles.len());
    for role_id in &record.roles {
        let role = graph.role(*role_id)?;
        roles.push((role.ty, role.player, role.id));
    }
    roles.sort_unstable();
    Ok(roles)
}

fn dedup_associations(
    graph: &mut TopicMapGraph,
    topic: TopicId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    let candidates = played_associations(graph, topic)?;
    let mut seen: BTreeMap<(TopicId, ScopeId, Vec<(TopicId, TopicId)>), AssociationId> =
        BTreeMap::new();
    for id in candidates {
        let signature = association_signature(graph, id)?;
        let Some(&winner) = seen.get(&signature) else {
            seen.insert(signature, id);
            continue;
        };
        merge_reifiers(
            graph,
            ConstructRef::Association(winner),
            ConstructRef::Association(id),
            worklist,
        )?;
        graph.move_item_identifiers(
            ConstructRef::Association(id),
            ConstructRef::Association(winner),
        )?;
        // Equal signatures guarantee positionally matching role lists.
        let winner_roles = sorted_roles(graph, winner)?;
        let duplicate_roles = sorted_roles(graph, id)?;
        for (kept, dropped) in winner_roles.iter().zip(duplicate_roles.iter()) {
            merge_reifiers(
                graph,
                ConstructRef::Role(kept.2),
                ConstructRef::Role(dropped.2),
                worklist,
            )?;
            graph.move_item_identifiers(
                ConstructRef::Role(dropped.2),
                ConstructRef::Role(kept.2),
            )?;
        }
        for (_, _, role) in duplicate_roles {
            sink.publish(ChangeEvent::removed(
                ConstructRef::Association(id),
                ConstructRef::Role(role),
            ));
        }
        graph.remove_association(id)?;
        sink.publish(ChangeEvent::removed(
            ConstructRef::TopicMap,
            ConstructRef::Association(id),
        ));
    }
    Ok(())
}

fn dedup_roles(
    graph: &mut TopicMapGraph,
    topic: TopicId,
    worklist: &mut Vec<(TopicId, TopicId)>,
    sink: &mut impl EventSink,
) -> Result<(), TopicMapError> {
    for association in played_associations(graph, topic)? {
        let roles: Vec<RoleId> = graph.association(association)?.roles.iter().copied().collect();
        let mut seen: BTreeMap<(TopicId, TopicId), RoleId> = BTreeMap::new();
        for id in roles {
            let record = graph.role(id)?.clone();
            let key = (record.ty, record.player);
            let Some(&winner) = seen.get(&key) else {
                seen.insert(key, id);
                continue;
            };
            merge_reifiers(
                graph,
                ConstructRef::Role(winner),
                ConstructRef::Role(id),
                worklist,
            )?;
            graph.move_item_identifiers(ConstructRef::Role(id), ConstructRef::Role(winner))?;
            graph.remove_role(id)?;
            sink.publish(ChangeEvent::removed(
                ConstructRef::Association(association),
                ConstructRef::Role(id),
            ));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
