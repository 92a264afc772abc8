//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Identity & Identifier Store
//! - T1: Scope Resolution
//! - T2: Type Hierarchy
//! - T3: Topic Unification

use std::collections::BTreeSet;
use topicmap_core::{
    ConstructRef, IdentifierIndex, Locator, MergeEngine, NullSink, ScopeId, ScopeResolver,
    TopicId, TopicMapError, TopicMapGraph, TypeHierarchy, XSD_STRING,
};

fn scope_of(graph: &mut TopicMapGraph, themes: &[TopicId]) -> ScopeId {
    let set: BTreeSet<TopicId> = themes.iter().copied().collect();
    ScopeResolver::get_or_create_scope(graph, &set).expect("scope")
}

// =============================================================================
// TIER T0: IDENTITY & IDENTIFIER STORE
// =============================================================================

mod t0_identity {
    use super::*;

    /// T0.1: A locator binds to at most one topic per identifier kind.
    #[test]
    fn locator_binding_is_exclusive() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let locator = Locator::new("http://example.org/subject");

        graph.add_subject_identifier(a, locator.clone()).expect("bind");
        let conflict = graph.add_subject_identifier(b, locator.clone());
        assert_eq!(conflict, Err(TopicMapError::IdentityConflict(locator.clone())));

        // The same locator is free as a subject locator: kinds are
        // independent binding spaces.
        graph.add_subject_locator(b, locator).expect("bind");
    }

    /// T0.2: Unbinding frees the locator for another construct.
    #[test]
    fn unbinding_frees_the_locator() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let locator = Locator::new("urn:x");

        graph.add_subject_identifier(a, locator.clone()).expect("bind");
        graph.remove_subject_identifier(a, &locator).expect("unbind");
        graph.add_subject_identifier(b, locator.clone()).expect("rebind");

        let mut index = IdentifierIndex::new();
        index.open();
        assert_eq!(
            index.topic_by_subject_identifier(&graph, &locator).expect("lookup"),
            Some(b)
        );
    }

    /// T0.3: Item identifiers address constructs of every kind.
    #[test]
    fn item_identifiers_address_constructs() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let assoc = graph.create_association(ty, scope).expect("assoc");
        let iid = Locator::new("http://example.org/a1");
        graph
            .add_item_identifier(ConstructRef::Association(assoc), iid.clone())
            .expect("bind");

        let mut index = IdentifierIndex::new();
        index.open();
        assert_eq!(
            index.construct_by_item_identifier(&graph, &iid).expect("lookup"),
            Some(ConstructRef::Association(assoc))
        );
    }

    /// T0.4: Removing a construct unbinds its identifiers.
    #[test]
    fn removal_unbinds_identifiers() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let topic = graph.create_topic().expect("create");
        let occ = graph
            .create_occurrence(topic, ty, "v", Locator::new(XSD_STRING), scope)
            .expect("occurrence");
        let iid = Locator::new("urn:occ");
        graph
            .add_item_identifier(ConstructRef::Occurrence(occ), iid.clone())
            .expect("bind");

        graph.remove_occurrence(occ).expect("remove");

        let mut index = IdentifierIndex::new();
        index.open();
        assert!(!index.exists_item_identifier(&graph, &iid).expect("exists"));
    }

    /// T0.5: A closed index rejects queries, an opened one accepts them.
    #[test]
    fn index_lifecycle_is_enforced() {
        let graph = TopicMapGraph::new();
        let locator = Locator::new("urn:y");
        let mut index = IdentifierIndex::new();

        let result = index.exists_identifier(&graph, &locator);
        assert!(matches!(result, Err(TopicMapError::IllegalState(_))));

        index.open();
        assert!(!index.exists_identifier(&graph, &locator).expect("exists"));

        index.close();
        let result = index.exists_identifier(&graph, &locator);
        assert!(matches!(result, Err(TopicMapError::IllegalState(_))));
    }

    /// T0.6: A reifying topic is reachable from the construct and back.
    #[test]
    fn reification_is_bidirectional() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let reifier = graph.create_topic().expect("create");
        let assoc = graph.create_association(ty, scope).expect("assoc");

        graph
            .set_reifier(ConstructRef::Association(assoc), Some(reifier))
            .expect("reify");
        assert_eq!(
            graph.reifier_of(ConstructRef::Association(assoc)).expect("reifier"),
            Some(reifier)
        );
        assert_eq!(
            graph.topic(reifier).expect("topic").reified,
            Some(ConstructRef::Association(assoc))
        );

        graph
            .set_reifier(ConstructRef::Association(assoc), None)
            .expect("clear");
        assert_eq!(graph.topic(reifier).expect("topic").reified, None);
    }
}

// =============================================================================
// TIER T1: SCOPE RESOLUTION
// =============================================================================

mod t1_scope_resolution {
    use super::*;

    /// T1.1: Equal theme sets resolve to one scope, across insertions.
    #[test]
    fn scope_resolution_is_idempotent() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let c = graph.create_topic().expect("create");

        let first = scope_of(&mut graph, &[a, b, c]);
        scope_of(&mut graph, &[a]);
        scope_of(&mut graph, &[b, c]);
        let second = scope_of(&mut graph, &[c, b, a]);

        assert_eq!(first, second);
        assert_eq!(graph.scope_count(), 3);
    }

    /// T1.2: The unscoped (empty) scope is a singleton.
    #[test]
    fn empty_scope_is_singleton() {
        let mut graph = TopicMapGraph::new();
        let first = scope_of(&mut graph, &[]);
        let second = scope_of(&mut graph, &[]);
        assert_eq!(first, second);
        assert_eq!(graph.empty_scope(), Some(first));
    }

    /// T1.3: Match-any selects supersets of any theme; match-all selects
    /// supersets of the whole set.
    #[test]
    fn match_any_versus_match_all() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let c = graph.create_topic().expect("create");
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");

        let s_a = scope_of(&mut graph, &[a]);
        let s_b = scope_of(&mut graph, &[b]);
        let s_ab = scope_of(&mut graph, &[a, b]);
        let s_abc = scope_of(&mut graph, &[a, b, c]);

        let n_a = graph.create_name(t, ty, "n", s_a).expect("name");
        let n_b = graph.create_name(t, ty, "n", s_b).expect("name");
        let n_ab = graph.create_name(t, ty, "n", s_ab).expect("name");
        let n_abc = graph.create_name(t, ty, "n", s_abc).expect("name");

        let any = ScopeResolver::names_by_themes(&graph, &[a, b], false).expect("any");
        assert_eq!(any, vec![n_a, n_b, n_ab, n_abc]);

        let all = ScopeResolver::names_by_themes(&graph, &[a, b], true).expect("all");
        assert_eq!(all, vec![n_ab, n_abc]);
    }

    /// T1.4: An empty theme collection is rejected; a null single theme
    /// selects unscoped constructs.
    #[test]
    fn null_theme_semantics() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");

        let unscoped = scope_of(&mut graph, &[]);
        let scoped = scope_of(&mut graph, &[a]);
        let plain = graph.create_occurrence(t, ty, "v", Locator::new(XSD_STRING), unscoped)
            .expect("occurrence");
        graph
            .create_occurrence(t, ty, "v", Locator::new(XSD_STRING), scoped)
            .expect("occurrence");

        assert_eq!(ScopeResolver::occurrences_by_theme(&graph, None), vec![plain]);

        let result = ScopeResolver::occurrences_by_themes(&graph, &[], false);
        assert!(matches!(result, Err(TopicMapError::InvalidArgument(_))));
    }

    /// T1.5: A variant matches themes of its own scope and of its parent
    /// name's scope.
    #[test]
    fn variant_effective_scope_unions_parent() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");

        let name_scope = scope_of(&mut graph, &[a]);
        let variant_scope = scope_of(&mut graph, &[b]);
        let name = graph.create_name(t, ty, "n", name_scope).expect("name");
        let variant = graph
            .create_variant(name, "v", Locator::new(XSD_STRING), variant_scope)
            .expect("variant");

        assert_eq!(
            ScopeResolver::variants_by_themes(&graph, &[a, b], true).expect("all"),
            vec![variant]
        );
        // The explicit scope stays narrow.
        assert_eq!(ScopeResolver::variants_by_scope(&graph, variant_scope), vec![variant]);
        assert!(ScopeResolver::variants_by_scope(&graph, name_scope).is_empty());
    }
}

// =============================================================================
// TIER T2: TYPE HIERARCHY
// =============================================================================

mod t2_type_hierarchy {
    use super::*;

    /// T2.1: Transitive closure over a cyclic hierarchy terminates and
    /// contains exactly the reachable topics.
    #[test]
    fn cyclic_closure_terminates() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let c = graph.create_topic().expect("create");
        graph.add_supertype(a, b).expect("edge");
        graph.add_supertype(b, c).expect("edge");
        graph.add_supertype(c, a).expect("edge");

        let supers = TypeHierarchy::supertypes(&graph, a).expect("supertypes");
        assert_eq!(supers, BTreeSet::from([a, b, c]));
    }

    /// T2.2: Instances propagate upward through subtype chains.
    #[test]
    fn transitive_instances() {
        let mut graph = TopicMapGraph::new();
        let root = graph.create_topic().expect("create");
        let mid = graph.create_topic().expect("create");
        let leaf = graph.create_topic().expect("create");
        let x = graph.create_topic().expect("create");
        graph.add_supertype(mid, root).expect("edge");
        graph.add_supertype(leaf, mid).expect("edge");
        graph.add_type(x, leaf).expect("type");

        let direct = TypeHierarchy::topics_by_type(&graph, Some(root)).expect("direct");
        assert!(direct.is_empty());

        let transitive = TypeHierarchy::topics_by_type_transitive(&graph, root).expect("transitive");
        assert_eq!(transitive, BTreeSet::from([x]));
    }

    /// T2.3: Multi-seed queries combine by union or intersection.
    #[test]
    fn multi_seed_combination() {
        let mut graph = TopicMapGraph::new();
        let t1 = graph.create_topic().expect("create");
        let t2 = graph.create_topic().expect("create");
        let both = graph.create_topic().expect("create");
        let only1 = graph.create_topic().expect("create");
        graph.add_type(both, t1).expect("type");
        graph.add_type(both, t2).expect("type");
        graph.add_type(only1, t1).expect("type");

        let any = TypeHierarchy::topics_by_types(&graph, &[t1, t2], false).expect("any");
        assert_eq!(any, BTreeSet::from([both, only1]));

        let all = TypeHierarchy::topics_by_types(&graph, &[t1, t2], true).expect("all");
        assert_eq!(all, BTreeSet::from([both]));
    }

    /// T2.4: Characteristic type queries follow the subtype hierarchy.
    #[test]
    fn characteristics_by_transitive_type() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let base = graph.create_topic().expect("create");
        let derived = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");
        graph.add_supertype(derived, base).expect("edge");

        let occ = graph
            .create_occurrence(t, derived, "v", Locator::new(XSD_STRING), scope)
            .expect("occurrence");

        assert!(TypeHierarchy::occurrences_by_type(&graph, base).expect("direct").is_empty());
        assert_eq!(
            TypeHierarchy::occurrences_by_type_transitive(&graph, base).expect("transitive"),
            vec![occ]
        );
        assert_eq!(TypeHierarchy::occurrence_types(&graph), vec![derived]);
    }

    /// T2.5: Unknown seed topics are reported, not silently ignored.
    #[test]
    fn unknown_seed_rejected() {
        let graph = TopicMapGraph::new();
        let result = TypeHierarchy::supertypes(&graph, TopicId(999));
        assert!(matches!(result, Err(TopicMapError::NotFound(_))));
    }
}

// =============================================================================
// TIER T3: TOPIC UNIFICATION
// =============================================================================

mod t3_unification {
    use super::*;

    /// T3.1: After a merge the absorbed id is dead and the survivor
    /// carries the union of both identities.
    #[test]
    fn merge_unifies_identity() {
        let mut graph = TopicMapGraph::new();
        let kept = graph.create_topic().expect("create");
        let absorbed = graph.create_topic().expect("create");
        let si = Locator::new("urn:merged");
        graph.add_subject_identifier(absorbed, si.clone()).expect("bind");

        MergeEngine::merge_topics(&mut graph, kept, absorbed, &mut NullSink).expect("merge");

        assert!(!graph.contains_topic(absorbed));
        let mut index = IdentifierIndex::new();
        index.open();
        assert_eq!(
            index.topic_by_subject_identifier(&graph, &si).expect("lookup"),
            Some(kept)
        );
    }

    /// T3.2: No duplicate characteristics survive a merge.
    #[test]
    fn merge_eliminates_duplicates() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let kept = graph.create_topic().expect("create");
        let absorbed = graph.create_topic().expect("create");

        graph.create_name(kept, ty, "same", scope).expect("name");
        graph.create_name(absorbed, ty, "same", scope).expect("name");
        graph.create_name(absorbed, ty, "different", scope).expect("name");

        MergeEngine::merge_topics(&mut graph, kept, absorbed, &mut NullSink).expect("merge");

        assert_eq!(graph.name_count(), 2);
        assert_eq!(graph.topic(kept).expect("topic").names.len(), 2);
    }

    /// T3.3: Scoped constructs theming on the absorbed topic are rescoped
    /// and keep resolving through theme queries.
    #[test]
    fn merge_rescopes_themes() {
        let mut graph = TopicMapGraph::new();
        let ty = graph.create_topic().expect("create");
        let kept = graph.create_topic().expect("create");
        let absorbed = graph.create_topic().expect("create");
        let stale = scope_of(&mut graph, &[absorbed]);
        let assoc = graph.create_association(ty, stale).expect("assoc");

        MergeEngine::merge_topics(&mut graph, kept, absorbed, &mut NullSink).expect("merge");

        assert_eq!(
            ScopeResolver::associations_by_theme(&graph, Some(kept)),
            vec![assoc]
        );
        assert!(graph.scope_themes(stale).is_err());
    }

    /// T3.4: Merging is idempotent once the pair is unified.
    #[test]
    fn repeated_merge_is_stable() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let kept = graph.create_topic().expect("create");
        let absorbed = graph.create_topic().expect("create");
        graph.create_name(kept, ty, "n", scope).expect("name");
        graph.create_name(absorbed, ty, "n", scope).expect("name");

        MergeEngine::merge_topics(&mut graph, kept, absorbed, &mut NullSink).expect("merge");
        let names_after_first = graph.name_count();
        let topics_after_first = graph.topic_count();

        MergeEngine::merge_topics(&mut graph, kept, kept, &mut NullSink).expect("merge");
        assert_eq!(graph.name_count(), names_after_first);
        assert_eq!(graph.topic_count(), topics_after_first);
    }

    /// T3.5: A merged-away topic's former roles are played by the
    /// survivor, and duplicated associations collapse.
    #[test]
    fn merge_rewires_roles() {
        let mut graph = TopicMapGraph::new();
        let scope = scope_of(&mut graph, &[]);
        let ty = graph.create_topic().expect("create");
        let role_ty = graph.create_topic().expect("create");
        let partner = graph.create_topic().expect("create");
        let kept = graph.create_topic().expect("create");
        let absorbed = graph.create_topic().expect("create");

        let a1 = graph.create_association(ty, scope).expect("assoc");
        graph.create_role(a1, role_ty, kept).expect("role");
        graph.create_role(a1, role_ty, partner).expect("role");
        let a2 = graph.create_association(ty, scope).expect("assoc");
        graph.create_role(a2, role_ty, absorbed).expect("role");
        graph.create_role(a2, role_ty, partner).expect("role");

        MergeEngine::merge_topics(&mut graph, kept, absorbed, &mut NullSink).expect("merge");

        assert_eq!(graph.association_count(), 1);
        assert_eq!(graph.roles_played_by(kept).len(), 1);
        assert_eq!(graph.roles_played_by(partner).len(), 1);
    }
}
