//! # Construct Graph
//!
//! The deterministic construct store for the topic-maps core.
//!
//! This module owns every construct record (topics, associations, roles,
//! names, occurrences, variants), the canonical scope registry, and all
//! identifier bindings. Cross-references are stored as ids and resolved
//! here; the resolver, hierarchy and merge engines read and write through
//! this type only.
//!
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::primitives::{MAX_LOCATOR_LENGTH, MAX_VALUE_LENGTH};
use crate::types::{
    Association, AssociationId, ConstructRef, Locator, Name, NameId, Occurrence, OccurrenceId,
    Role, RoleId, ScopeId, Topic, TopicId, TopicMapError, Variant, VariantId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The construct graph of a single topic map.
///
/// Uses `BTreeMap` exclusively for deterministic ordering. A single `u64`
/// counter feeds every id kind, so ids are unique across construct kinds
/// and never reused.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicMapGraph {
    /// Topic records.
    topics: BTreeMap<TopicId, Topic>,
    /// Association records.
    associations: BTreeMap<AssociationId, Association>,
    /// Role records.
    roles: BTreeMap<RoleId, Role>,
    /// Name records.
    names: BTreeMap<NameId, Name>,
    /// Occurrence records.
    occurrences: BTreeMap<OccurrenceId, Occurrence>,
    /// Variant records.
    variants: BTreeMap<VariantId, Variant>,

    /// Canonical scope registry: scope id -> exact theme set.
    scopes: BTreeMap<ScopeId, BTreeSet<TopicId>>,
    /// Inverted scope index: theme -> scopes containing it.
    theme_scopes: BTreeMap<TopicId, BTreeSet<ScopeId>>,
    /// The distinguished singleton empty scope, once created.
    empty_scope: Option<ScopeId>,

    /// Subject identifier bindings: locator -> topic.
    subject_identifiers: BTreeMap<Locator, TopicId>,
    /// Subject locator bindings: locator -> topic.
    subject_locators: BTreeMap<Locator, TopicId>,
    /// Item identifier bindings: locator -> construct.
    item_identifiers: BTreeMap<Locator, ConstructRef>,
    /// Item identifiers of the topic map itself.
    map_item_identifiers: BTreeSet<Locator>,

    /// Reverse type-instance index: type -> direct instances.
    instances_of: BTreeMap<TopicId, BTreeSet<TopicId>>,
    /// Reverse supertype index: supertype -> direct subtypes.
    subtypes_of: BTreeMap<TopicId, BTreeSet<TopicId>>,
    /// Reverse player index: player -> roles.
    roles_by_player: BTreeMap<TopicId, BTreeSet<RoleId>>,

    /// The topic reifying the map itself, if any.
    map_reifier: Option<TopicId>,

    /// Next available id (shared across all construct kinds).
    next_id: u64,
}

// =============================================================================
// CONSTRUCTION & READS
// =============================================================================

impl TopicMapGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Create a topic with no edges or identifiers.
    pub fn create_topic(&mut self) -> Result<TopicId, TopicMapError> {
        let id = TopicId(self.alloc());
        self.topics.insert(id, Topic::new(id));
        Ok(id)
    }

    /// Create an association of the given type in the given scope.
    pub fn create_association(
        &mut self,
        ty: TopicId,
        scope: ScopeId,
    ) -> Result<AssociationId, TopicMapError> {
        self.topic(ty)?;
        self.scope_themes(scope)?;
        let id = AssociationId(self.alloc());
        self.associations.insert(id, Association::new(id, ty, scope));
        Ok(id)
    }

    /// Create a role within an association.
    pub fn create_role(
        &mut self,
        parent: AssociationId,
        ty: TopicId,
        player: TopicId,
    ) -> Result<RoleId, TopicMapError> {
        self.association(parent)?;
        self.topic(ty)?;
        self.topic(player)?;
        let id = RoleId(self.alloc());
        self.roles.insert(id, Role::new(id, parent, ty, player));
        if let Some(assoc) = self.associations.get_mut(&parent) {
            assoc.roles.insert(id);
        }
        self.roles_by_player.entry(player).or_default().insert(id);
        Ok(id)
    }

    /// Create a name characteristic on a topic.
    pub fn create_name(
        &mut self,
        parent: TopicId,
        ty: TopicId,
        value: impl Into<String>,
        scope: ScopeId,
    ) -> Result<NameId, TopicMapError> {
        let value = value.into();
        check_value(&value)?;
        self.topic(parent)?;
        self.topic(ty)?;
        self.scope_themes(scope)?;
        let id = NameId(self.alloc());
        self.names.insert(id, Name::new(id, parent, ty, value, scope));
        if let Some(topic) = self.topics.get_mut(&parent) {
            topic.names.insert(id);
        }
        Ok(id)
    }

    /// Create an occurrence characteristic on a topic.
    pub fn create_occurrence(
        &mut self,
        parent: TopicId,
        ty: TopicId,
        value: impl Into<String>,
        datatype: Locator,
        scope: ScopeId,
    ) -> Result<OccurrenceId, TopicMapError> {
        let value = value.into();
        check_value(&value)?;
        check_locator(&datatype)?;
        self.topic(parent)?;
        self.topic(ty)?;
        self.scope_themes(scope)?;
        let id = OccurrenceId(self.alloc());
        self.occurrences
            .insert(id, Occurrence::new(id, parent, ty, value, datatype, scope));
        if let Some(topic) = self.topics.get_mut(&parent) {
            topic.occurrences.insert(id);
        }
        Ok(id)
    }

    /// Create a variant under a name.
    pub fn create_variant(
        &mut self,
        parent: NameId,
        value: impl Into<String>,
        datatype: Locator,
        scope: ScopeId,
    ) -> Result<VariantId, TopicMapError> {
        let value = value.into();
        check_value(&value)?;
        check_locator(&datatype)?;
        self.name(parent)?;
        self.scope_themes(scope)?;
        let id = VariantId(self.alloc());
        self.variants
            .insert(id, Variant::new(id, parent, value, datatype, scope));
        if let Some(name) = self.names.get_mut(&parent) {
            name.variants.insert(id);
        }
        Ok(id)
    }

    /// Lookup a topic record.
    pub fn topic(&self, id: TopicId) -> Result<&Topic, TopicMapError> {
        self.topics
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Topic(id)))
    }

    /// Lookup an association record.
    pub fn association(&self, id: AssociationId) -> Result<&Association, TopicMapError> {
        self.associations
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Association(id)))
    }

    /// Lookup a role record.
    pub fn role(&self, id: RoleId) -> Result<&Role, TopicMapError> {
        self.roles
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Role(id)))
    }

    /// Lookup a name record.
    pub fn name(&self, id: NameId) -> Result<&Name, TopicMapError> {
        self.names
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Name(id)))
    }

    /// Lookup an occurrence record.
    pub fn occurrence(&self, id: OccurrenceId) -> Result<&Occurrence, TopicMapError> {
        self.occurrences
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Occurrence(id)))
    }

    /// Lookup a variant record.
    pub fn variant(&self, id: VariantId) -> Result<&Variant, TopicMapError> {
        self.variants
            .get(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Variant(id)))
    }

    /// Check whether a topic id resolves to a live record.
    #[must_use]
    pub fn contains_topic(&self, id: TopicId) -> bool {
        self.topics.contains_key(&id)
    }

    /// Check whether a construct reference resolves to a live record.
    #[must_use]
    pub fn contains(&self, c: ConstructRef) -> bool {
        match c {
            ConstructRef::TopicMap => true,
            ConstructRef::Topic(id) => self.topics.contains_key(&id),
            ConstructRef::Association(id) => self.associations.contains_key(&id),
            ConstructRef::Role(id) => self.roles.contains_key(&id),
            ConstructRef::Name(id) => self.names.contains_key(&id),
            ConstructRef::Occurrence(id) => self.occurrences.contains_key(&id),
            ConstructRef::Variant(id) => self.variants.contains_key(&id),
        }
    }

    /// All topics in deterministic order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    /// All associations in deterministic order.
    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.values()
    }

    /// All roles in deterministic order.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// All names in deterministic order.
    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.names.values()
    }

    /// All occurrences in deterministic order.
    pub fn occurrences(&self) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.values()
    }

    /// All variants in deterministic order.
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    /// Number of live topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of live associations.
    #[must_use]
    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    /// Number of live names.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Number of live occurrences.
    #[must_use]
    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }

    /// Number of registered scopes (the empty scope counts once created).
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// The exact theme set of a scope.
    pub fn scope_themes(&self, id: ScopeId) -> Result<&BTreeSet<TopicId>, TopicMapError> {
        self.scopes
            .get(&id)
            .ok_or_else(|| TopicMapError::InvalidArgument(format!("unknown scope {:?}", id)))
    }

    /// The singleton empty scope, if it has been created.
    #[must_use]
    pub fn empty_scope(&self) -> Option<ScopeId> {
        self.empty_scope
    }

    /// Roles in which the given topic is the player, in deterministic order.
    #[must_use]
    pub fn roles_played_by(&self, player: TopicId) -> Vec<RoleId> {
        self.roles_by_player
            .get(&player)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The topic reifying the given construct, if any.
    pub fn reifier_of(&self, target: ConstructRef) -> Result<Option<TopicId>, TopicMapError> {
        match target {
            ConstructRef::TopicMap => Ok(self.map_reifier),
            ConstructRef::Topic(_) => Err(TopicMapError::InvalidArgument(
                "a topic cannot be reified".to_string(),
            )),
            ConstructRef::Association(id) => Ok(self.association(id)?.reifier),
            ConstructRef::Role(id) => Ok(self.role(id)?.reifier),
            ConstructRef::Name(id) => Ok(self.name(id)?.reifier),
            ConstructRef::Occurrence(id) => Ok(self.occurrence(id)?.reifier),
            ConstructRef::Variant(id) => Ok(self.variant(id)?.reifier),
        }
    }
}

// =============================================================================
// TYPE & SUPERTYPE EDGES
// =============================================================================

impl TopicMapGraph {
    /// Add a type-instance edge: `instance` is directly typed by `ty`.
    pub fn add_type(&mut self, instance: TopicId, ty: TopicId) -> Result<(), TopicMapError> {
        self.topic(instance)?;
        self.topic(ty)?;
        if let Some(topic) = self.topics.get_mut(&instance) {
            topic.types.insert(ty);
        }
        self.instances_of.entry(ty).or_default().insert(instance);
        Ok(())
    }

    /// Remove a direct type-instance edge. Removing an absent edge is a no-op.
    pub fn remove_type(&mut self, instance: TopicId, ty: TopicId) -> Result<(), TopicMapError> {
        self.topic(instance)?;
        if let Some(topic) = self.topics.get_mut(&instance) {
            topic.types.remove(&ty);
        }
        if let Some(set) = self.instances_of.get_mut(&ty) {
            set.remove(&instance);
            if set.is_empty() {
                self.instances_of.remove(&ty);
            }
        }
        Ok(())
    }

    /// Add a supertype-subtype edge: `supertype` is a direct supertype of
    /// `subtype`. Cycles are legal.
    pub fn add_supertype(
        &mut self,
        subtype: TopicId,
        supertype: TopicId,
    ) -> Result<(), TopicMapError> {
        self.topic(subtype)?;
        self.topic(supertype)?;
        if let Some(topic) = self.topics.get_mut(&subtype) {
            topic.supertypes.insert(supertype);
        }
        self.subtypes_of.entry(supertype).or_default().insert(subtype);
        Ok(())
    }

    /// Remove a direct supertype edge. Removing an absent edge is a no-op.
    pub fn remove_supertype(
        &mut self,
        subtype: TopicId,
        supertype: TopicId,
    ) -> Result<(), TopicMapError> {
        self.topic(subtype)?;
        if let Some(topic) = self.topics.get_mut(&subtype) {
            topic.supertypes.remove(&supertype);
        }
        if let Some(set) = self.subtypes_of.get_mut(&supertype) {
            set.remove(&subtype);
            if set.is_empty() {
                self.subtypes_of.remove(&supertype);
            }
        }
        Ok(())
    }

    pub(crate) fn instances_index(&self, ty: TopicId) -> Option<&BTreeSet<TopicId>> {
        self.instances_of.get(&ty)
    }

    pub(crate) fn subtypes_index(&self, supertype: TopicId) -> Option<&BTreeSet<TopicId>> {
        self.subtypes_of.get(&supertype)
    }

    pub(crate) fn typed_topics(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.instances_of.keys().copied()
    }
}

// =============================================================================
// TYPE / SCOPE / PLAYER REBINDING
// =============================================================================

impl TopicMapGraph {
    /// Rebind an association's type.
    pub fn set_association_type(
        &mut self,
        id: AssociationId,
        ty: TopicId,
    ) -> Result<(), TopicMapError> {
        self.topic(ty)?;
        self.association(id)?;
        if let Some(assoc) = self.associations.get_mut(&id) {
            assoc.ty = ty;
        }
        Ok(())
    }

    /// Rebind a role's type.
    pub fn set_role_type(&mut self, id: RoleId, ty: TopicId) -> Result<(), TopicMapError> {
        self.topic(ty)?;
        self.role(id)?;
        if let Some(role) = self.roles.get_mut(&id) {
            role.ty = ty;
        }
        Ok(())
    }

    /// Rebind a name's type.
    pub fn set_name_type(&mut self, id: NameId, ty: TopicId) -> Result<(), TopicMapError> {
        self.topic(ty)?;
        self.name(id)?;
        if let Some(name) = self.names.get_mut(&id) {
            name.ty = ty;
        }
        Ok(())
    }

    /// Rebind an occurrence's type.
    pub fn set_occurrence_type(
        &mut self,
        id: OccurrenceId,
        ty: TopicId,
    ) -> Result<(), TopicMapError> {
        self.topic(ty)?;
        self.occurrence(id)?;
        if let Some(occ) = self.occurrences.get_mut(&id) {
            occ.ty = ty;
        }
        Ok(())
    }

    /// Rebind a role's player, maintaining the player index.
    pub fn set_role_player(&mut self, id: RoleId, player: TopicId) -> Result<(), TopicMapError> {
        self.topic(player)?;
        let old = self.role(id)?.player;
        if old == player {
            return Ok(());
        }
        if let Some(set) = self.roles_by_player.get_mut(&old) {
            set.remove(&id);
            if set.is_empty() {
                self.roles_by_player.remove(&old);
            }
        }
        if let Some(role) = self.roles.get_mut(&id) {
            role.player = player;
        }
        self.roles_by_player.entry(player).or_default().insert(id);
        Ok(())
    }

    /// Rebind an association's scope reference.
    ///
    /// Scopes are never mutated in place: changing an effective theme set
    /// always resolves to a different scope and rebinds the reference.
    pub fn set_association_scope(
        &mut self,
        id: AssociationId,
        scope: ScopeId,
    ) -> Result<(), TopicMapError> {
        self.scope_themes(scope)?;
        self.association(id)?;
        if let Some(assoc) = self.associations.get_mut(&id) {
            assoc.scope = scope;
        }
        Ok(())
    }

    /// Rebind a name's scope reference.
    pub fn set_name_scope(&mut self, id: NameId, scope: ScopeId) -> Result<(), TopicMapError> {
        self.scope_themes(scope)?;
        self.name(id)?;
        if let Some(name) = self.names.get_mut(&id) {
            name.scope = scope;
        }
        Ok(())
    }

    /// Rebind an occurrence's scope reference.
    pub fn set_occurrence_scope(
        &mut self,
        id: OccurrenceId,
        scope: ScopeId,
    ) -> Result<(), TopicMapError> {
        self.scope_themes(scope)?;
        self.occurrence(id)?;
        if let Some(occ) = self.occurrences.get_mut(&id) {
            occ.scope = scope;
        }
        Ok(())
    }

    /// Rebind a variant's scope reference.
    pub fn set_variant_scope(&mut self, id: VariantId, scope: ScopeId) -> Result<(), TopicMapError> {
        self.scope_themes(scope)?;
        self.variant(id)?;
        if let Some(variant) = self.variants.get_mut(&id) {
            variant.scope = scope;
        }
        Ok(())
    }
}

// =============================================================================
// REIFICATION
// =============================================================================

impl TopicMapGraph {
    /// Set or clear the reifier of a construct.
    ///
    /// Enforces both directions of the reification invariant: a construct
    /// has at most one reifier, and a topic reifies at most one construct.
    /// Re-asserting an existing binding is a no-op.
    pub fn set_reifier(
        &mut self,
        target: ConstructRef,
        reifier: Option<TopicId>,
    ) -> Result<(), TopicMapError> {
        if !self.contains(target) {
            return Err(TopicMapError::NotFound(target));
        }
        let current = self.reifier_of(target)?;
        match reifier {
            None => {
                if let Some(old) = current {
                    if let Some(topic) = self.topics.get_mut(&old) {
                        topic.reified = None;
                    }
                    self.write_reifier_slot(target, None);
                }
                Ok(())
            }
            Some(r) => {
                self.topic(r)?;
                if current == Some(r) {
                    return Ok(());
                }
                if current.is_some() {
                    return Err(TopicMapError::InvalidArgument(
                        "construct is already reified by another topic".to_string(),
                    ));
                }
                let already = self.topic(r)?.reified;
                if already.is_some_and(|c| c != target) {
                    return Err(TopicMapError::InvalidArgument(
                        "topic already reifies another construct".to_string(),
                    ));
                }
                if let Some(topic) = self.topics.get_mut(&r) {
                    topic.reified = Some(target);
                }
                self.write_reifier_slot(target, Some(r));
                Ok(())
            }
        }
    }

    /// Clear the reifier of a construct and return the former reifier.
    /// Both back-references are removed.
    pub(crate) fn detach_reifier(
        &mut self,
        target: ConstructRef,
    ) -> Result<Option<TopicId>, TopicMapError> {
        let current = self.reifier_of(target)?;
        if let Some(r) = current {
            if let Some(topic) = self.topics.get_mut(&r) {
                topic.reified = None;
            }
            self.write_reifier_slot(target, None);
        }
        Ok(current)
    }

    /// Write the reifier field of a construct record. The target is known
    /// to exist and must not be a topic.
    fn write_reifier_slot(&mut self, target: ConstructRef, value: Option<TopicId>) {
        match target {
            ConstructRef::TopicMap => self.map_reifier = value,
            ConstructRef::Topic(_) => {}
            ConstructRef::Association(id) => {
                if let Some(assoc) = self.associations.get_mut(&id) {
                    assoc.reifier = value;
                }
            }
            ConstructRef::Role(id) => {
                if let Some(role) = self.roles.get_mut(&id) {
                    role.reifier = value;
                }
            }
            ConstructRef::Name(id) => {
                if let Some(name) = self.names.get_mut(&id) {
                    name.reifier = value;
                }
            }
            ConstructRef::Occurrence(id) => {
                if let Some(occ) = self.occurrences.get_mut(&id) {
                    occ.reifier = value;
                }
            }
            ConstructRef::Variant(id) => {
                if let Some(variant) = self.variants.get_mut(&id) {
                    variant.reifier = value;
                }
            }
        }
    }
}

// =============================================================================
// IDENTIFIER BINDINGS
// =============================================================================

impl TopicMapGraph {
    /// Bind a subject identifier to a topic.
    ///
    /// Re-binding to the same topic is a no-op; binding a locator held by a
    /// different topic signals an identity conflict. Deciding whether that
    /// conflict triggers a merge is the caller's policy.
    pub fn add_subject_identifier(
        &mut self,
        topic: TopicId,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        check_locator(&locator)?;
        self.topic(topic)?;
        if let Some(&bound) = self.subject_identifiers.get(&locator) {
            if bound == topic {
                return Ok(());
            }
            return Err(TopicMapError::IdentityConflict(locator));
        }
        self.subject_identifiers.insert(locator.clone(), topic);
        if let Some(record) = self.topics.get_mut(&topic) {
            record.subject_identifiers.insert(locator);
        }
        Ok(())
    }

    /// Unbind a subject identifier from a topic. Unbinding an absent
    /// binding is a no-op.
    pub fn remove_subject_identifier(
        &mut self,
        topic: TopicId,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        self.topic(topic)?;
        if self.subject_identifiers.get(locator) == Some(&topic) {
            self.subject_identifiers.remove(locator);
            if let Some(record) = self.topics.get_mut(&topic) {
                record.subject_identifiers.remove(locator);
            }
        }
        Ok(())
    }

    /// Bind a subject locator to a topic. Same conflict contract as
    /// [`Self::add_subject_identifier`].
    pub fn add_subject_locator(
        &mut self,
        topic: TopicId,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        check_locator(&locator)?;
        self.topic(topic)?;
        if let Some(&bound) = self.subject_locators.get(&locator) {
            if bound == topic {
                return Ok(());
            }
            return Err(TopicMapError::IdentityConflict(locator));
        }
        self.subject_locators.insert(locator.clone(), topic);
        if let Some(record) = self.topics.get_mut(&topic) {
            record.subject_locators.insert(locator);
        }
        Ok(())
    }

    /// Unbind a subject locator from a topic.
    pub fn remove_subject_locator(
        &mut self,
        topic: TopicId,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        self.topic(topic)?;
        if self.subject_locators.get(locator) == Some(&topic) {
            self.subject_locators.remove(locator);
            if let Some(record) = self.topics.get_mut(&topic) {
                record.subject_locators.remove(locator);
            }
        }
        Ok(())
    }

    /// Bind an item identifier to a construct. Same conflict contract as
    /// [`Self::add_subject_identifier`].
    pub fn add_item_identifier(
        &mut self,
        construct: ConstructRef,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        check_locator(&locator)?;
        if !self.contains(construct) {
            return Err(TopicMapError::NotFound(construct));
        }
        if let Some(&bound) = self.item_identifiers.get(&locator) {
            if bound == construct {
                return Ok(());
            }
            return Err(TopicMapError::IdentityConflict(locator));
        }
        self.item_identifiers.insert(locator.clone(), construct);
        if let Some(set) = self.item_identifier_set_mut(construct) {
            set.insert(locator);
        }
        Ok(())
    }

    /// Unbind an item identifier from a construct.
    pub fn remove_item_identifier(
        &mut self,
        construct: ConstructRef,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        if !self.contains(construct) {
            return Err(TopicMapError::NotFound(construct));
        }
        if self.item_identifiers.get(locator) == Some(&construct) {
            self.item_identifiers.remove(locator);
            if let Some(set) = self.item_identifier_set_mut(construct) {
                set.remove(locator);
            }
        }
        Ok(())
    }

    /// Move every item identifier of `from` onto `to`, rebinding the
    /// identifier map. Used by duplicate elimination.
    pub(crate) fn move_item_identifiers(
        &mut self,
        from: ConstructRef,
        to: ConstructRef,
    ) -> Result<(), TopicMapError> {
        if !self.contains(from) {
            return Err(TopicMapError::NotFound(from));
        }
        if !self.contains(to) {
            return Err(TopicMapError::NotFound(to));
        }
        let moved: Vec<Locator> = self
            .item_identifier_set_mut(from)
            .map(std::mem::take)
            .unwrap_or_default()
            .into_iter()
            .collect();
        for locator in moved {
            self.item_identifiers.insert(locator.clone(), to);
            if let Some(set) = self.item_identifier_set_mut(to) {
                set.insert(locator);
            }
        }
        Ok(())
    }

    /// The item-identifier set of a construct record, if it is live.
    fn item_identifier_set_mut(
        &mut self,
        construct: ConstructRef,
    ) -> Option<&mut BTreeSet<Locator>> {
        match construct {
            ConstructRef::TopicMap => Some(&mut self.map_item_identifiers),
            ConstructRef::Topic(id) => {
                self.topics.get_mut(&id).map(|record| &mut record.item_identifiers)
            }
            ConstructRef::Association(id) => self
                .associations
                .get_mut(&id)
                .map(|record| &mut record.item_identifiers),
            ConstructRef::Role(id) => {
                self.roles.get_mut(&id).map(|record| &mut record.item_identifiers)
            }
            ConstructRef::Name(id) => {
                self.names.get_mut(&id).map(|record| &mut record.item_identifiers)
            }
            ConstructRef::Occurrence(id) => self
                .occurrences
                .get_mut(&id)
                .map(|record| &mut record.item_identifiers),
            ConstructRef::Variant(id) => self
                .variants
                .get_mut(&id)
                .map(|record| &mut record.item_identifiers),
        }
    }

    pub(crate) fn subject_identifier_bindings(&self) -> &BTreeMap<Locator, TopicId> {
        &self.subject_identifiers
    }

    pub(crate) fn subject_locator_bindings(&self) -> &BTreeMap<Locator, TopicId> {
        &self.subject_locators
    }

    pub(crate) fn item_identifier_bindings(&self) -> &BTreeMap<Locator, ConstructRef> {
        &self.item_identifiers
    }

    /// Rebind a subject-identifier map entry to another topic. The record
    /// sets are the caller's responsibility.
    pub(crate) fn rebind_subject_identifier(&mut self, locator: Locator, topic: TopicId) {
        self.subject_identifiers.insert(locator, topic);
    }

    pub(crate) fn rebind_subject_locator(&mut self, locator: Locator, topic: TopicId) {
        self.subject_locators.insert(locator, topic);
    }

    pub(crate) fn rebind_item_identifier(&mut self, locator: Locator, construct: ConstructRef) {
        self.item_identifiers.insert(locator, construct);
    }
}

// =============================================================================
// SCOPE REGISTRY (resolver-facing)
// =============================================================================

impl TopicMapGraph {
    /// Register a scope for the exact theme set. The resolver guarantees
    /// that no scope with an equal theme set exists.
    pub(crate) fn register_scope(&mut self, themes: BTreeSet<TopicId>) -> ScopeId {
        let id = ScopeId(self.alloc());
        for theme in &themes {
            self.theme_scopes.entry(*theme).or_default().insert(id);
        }
        if themes.is_empty() {
            self.empty_scope = Some(id);
        }
        self.scopes.insert(id, themes);
        id
    }

    /// The singleton empty scope, created on first use.
    pub(crate) fn ensure_empty_scope(&mut self) -> ScopeId {
        match self.empty_scope {
            Some(id) => id,
            None => self.register_scope(BTreeSet::new()),
        }
    }

    /// Scopes containing the given theme.
    pub(crate) fn scopes_with_theme(&self, theme: TopicId) -> Option<&BTreeSet<ScopeId>> {
        self.theme_scopes.get(&theme)
    }

    /// Rewire every construct scoped by `from` to `to`.
    pub(crate) fn rebind_scope(&mut self, from: ScopeId, to: ScopeId) {
        for assoc in self.associations.values_mut() {
            if assoc.scope == from {
                assoc.scope = to;
            }
        }
        for name in self.names.values_mut() {
            if name.scope == from {
                name.scope = to;
            }
        }
        for occ in self.occurrences.values_mut() {
            if occ.scope == from {
                occ.scope = to;
            }
        }
        for variant in self.variants.values_mut() {
            if variant.scope == from {
                variant.scope = to;
            }
        }
    }

    /// Drop a scope from the registry. The empty scope singleton is never
    /// dropped.
    pub(crate) fn drop_scope(&mut self, id: ScopeId) {
        if self.empty_scope == Some(id) {
            return;
        }
        if let Some(themes) = self.scopes.remove(&id) {
            for theme in themes {
                if let Some(set) = self.theme_scopes.get_mut(&theme) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.theme_scopes.remove(&theme);
                    }
                }
            }
        }
    }
}

// =============================================================================
// REMOVAL
// =============================================================================

impl TopicMapGraph {
    /// Remove a variant, unbinding its identifiers and reifier.
    pub fn remove_variant(&mut self, id: VariantId) -> Result<(), TopicMapError> {
        let record = self.variant(id)?.clone();
        self.detach_reifier(ConstructRef::Variant(id))?;
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
        if let Some(name) = self.names.get_mut(&record.parent) {
            name.variants.remove(&id);
        }
        self.variants.remove(&id);
        Ok(())
    }

    /// Remove a name and all of its variants.
    pub fn remove_name(&mut self, id: NameId) -> Result<(), TopicMapError> {
        let record = self.name(id)?.clone();
        for variant in record.variants.iter().copied().collect::<Vec<_>>() {
            self.remove_variant(variant)?;
        }
        self.detach_reifier(ConstructRef::Name(id))?;
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
        if let Some(topic) = self.topics.get_mut(&record.parent) {
            topic.names.remove(&id);
        }
        self.names.remove(&id);
        Ok(())
    }

    /// Remove an occurrence.
    pub fn remove_occurrence(&mut self, id: OccurrenceId) -> Result<(), TopicMapError> {
        let record = self.occurrence(id)?.clone();
        self.detach_reifier(ConstructRef::Occurrence(id))?;
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
        if let Some(topic) = self.topics.get_mut(&record.parent) {
            topic.occurrences.remove(&id);
        }
        self.occurrences.remove(&id);
        Ok(())
    }

    /// Remove a role, maintaining the player index.
    pub fn remove_role(&mut self, id: RoleId) -> Result<(), TopicMapError> {
        let record = self.role(id)?.clone();
        self.detach_reifier(ConstructRef::Role(id))?;
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
        if let Some(set) = self.roles_by_player.get_mut(&record.player) {
            set.remove(&id);
            if set.is_empty() {
                self.roles_by_player.remove(&record.player);
            }
        }
        if let Some(assoc) = self.associations.get_mut(&record.parent) {
            assoc.roles.remove(&id);
        }
        self.roles.remove(&id);
        Ok(())
    }

    /// Remove an association and all of its roles.
    pub fn remove_association(&mut self, id: AssociationId) -> Result<(), TopicMapError> {
        let record = self.association(id)?.clone();
        for role in record.roles.iter().copied().collect::<Vec<_>>() {
            self.remove_role(role)?;
        }
        self.detach_reifier(ConstructRef::Association(id))?;
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
        self.associations.remove(&id);
        Ok(())
    }

    /// Remove a topic that is not in use.
    ///
    /// A topic is in use while it types or supertypes other topics, types
    /// any construct, plays a role, themes a scope, or reifies a
    /// construct; removal then signals invalid-argument. The topic's own
    /// characteristics are removed and its identifiers unbound.
    pub fn remove_topic(&mut self, id: TopicId) -> Result<(), TopicMapError> {
        let record = self.topic(id)?.clone();
        if record.reified.is_some() || self.topic_in_use(id) {
            return Err(TopicMapError::InvalidArgument(format!(
                "topic {:?} is in use and cannot be removed",
                id
            )));
        }
        for name in record.names.iter().copied().collect::<Vec<_>>() {
            self.remove_name(name)?;
        }
        for occ in record.occurrences.iter().copied().collect::<Vec<_>>() {
            self.remove_occurrence(occ)?;
        }
        self.unbind_topic_identifiers(&record);
        for ty in &record.types {
            if let Some(set) = self.instances_of.get_mut(ty) {
                set.remove(&id);
                if set.is_empty() {
                    self.instances_of.remove(ty);
                }
            }
        }
        for st in &record.supertypes {
            if let Some(set) = self.subtypes_of.get_mut(st) {
                set.remove(&id);
                if set.is_empty() {
                    self.subtypes_of.remove(st);
                }
            }
        }
        self.topics.remove(&id);
        Ok(())
    }

    fn topic_in_use(&self, id: TopicId) -> bool {
        if self.instances_of.get(&id).is_some_and(|s| !s.is_empty())
            || self.subtypes_of.get(&id).is_some_and(|s| !s.is_empty())
            || self.theme_scopes.get(&id).is_some_and(|s| !s.is_empty())
            || self.roles_by_player.get(&id).is_some_and(|s| !s.is_empty())
        {
            return true;
        }
        self.associations.values().any(|a| a.ty == id)
            || self.roles.values().any(|r| r.ty == id)
            || self.names.values().any(|n| n.ty == id)
            || self.occurrences.values().any(|o| o.ty == id)
    }

    fn unbind_topic_identifiers(&mut self, record: &Topic) {
        for locator in &record.subject_identifiers {
            self.subject_identifiers.remove(locator);
        }
        for locator in &record.subject_locators {
            self.subject_locators.remove(locator);
        }
        for locator in &record.item_identifiers {
            self.item_identifiers.remove(locator);
        }
    }

    /// Remove a fully stripped topic record. The merge engine calls this
    /// after every edge, characteristic and identifier has been rewired;
    /// the id never again resolves to a live record.
    pub(crate) fn take_topic(&mut self, id: TopicId) -> Result<Topic, TopicMapError> {
        self.topics
            .remove(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Topic(id)))
    }

    pub(crate) fn topic_mut(&mut self, id: TopicId) -> Result<&mut Topic, TopicMapError> {
        self.topics
            .get_mut(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Topic(id)))
    }

    pub(crate) fn name_mut(&mut self, id: NameId) -> Result<&mut Name, TopicMapError> {
        self.names
            .get_mut(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Name(id)))
    }

    pub(crate) fn occurrence_mut(
        &mut self,
        id: OccurrenceId,
    ) -> Result<&mut Occurrence, TopicMapError> {
        self.occurrences
            .get_mut(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Occurrence(id)))
    }

    pub(crate) fn variant_mut(&mut self, id: VariantId) -> Result<&mut Variant, TopicMapError> {
        self.variants
            .get_mut(&id)
            .ok_or(TopicMapError::NotFound(ConstructRef::Variant(id)))
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn check_locator(locator: &Locator) -> Result<(), TopicMapError> {
    if locator.as_str().is_empty() {
        return Err(TopicMapError::InvalidArgument(
            "locator must not be empty".to_string(),
        ));
    }
    if locator.as_str().len() > MAX_LOCATOR_LENGTH {
        return Err(TopicMapError::InvalidArgument(format!(
            "locator exceeds {} bytes",
            MAX_LOCATOR_LENGTH
        )));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<(), TopicMapError> {
    if value.len() > MAX_VALUE_LENGTH {
        return Err(TopicMapError::InvalidArgument(format!(
            "value exceeds {} bytes",
            MAX_VALUE_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::XSD_STRING;

    fn graph_with_empty_scope() -> (TopicMapGraph, ScopeId) {
        let mut graph = TopicMapGraph::new();
        let scope = graph.ensure_empty_scope();
        (graph, scope)
    }

    #[test]
    fn create_and_lookup_topic() {
        let mut graph = TopicMapGraph::new();
        let id = graph.create_topic().expect("create");
        assert!(graph.contains_topic(id));
        assert_eq!(graph.topic(id).expect("topic").id, id);
    }

    #[test]
    fn lookup_missing_topic_fails() {
        let graph = TopicMapGraph::new();
        let result = graph.topic(TopicId(999));
        assert!(matches!(result, Err(TopicMapError::NotFound(_))));
    }

    #[test]
    fn subject_identifier_conflict_detected() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let loc = Locator::new("http://example.org/si");

        graph.add_subject_identifier(a, loc.clone()).expect("bind");
        // Re-binding to the same topic is a no-op.
        graph.add_subject_identifier(a, loc.clone()).expect("rebind");

        let conflict = graph.add_subject_identifier(b, loc.clone());
        assert_eq!(conflict, Err(TopicMapError::IdentityConflict(loc)));
    }

    #[test]
    fn empty_locator_rejected() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let result = graph.add_subject_identifier(a, Locator::new(""));
        assert!(matches!(result, Err(TopicMapError::InvalidArgument(_))));
    }

    #[test]
    fn reifier_is_exclusive_both_ways() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");
        let r1 = graph.create_topic().expect("create");
        let r2 = graph.create_topic().expect("create");
        let n1 = graph.create_name(t, ty, "first", scope).expect("name");
        let n2 = graph.create_name(t, ty, "second", scope).expect("name");

        graph
            .set_reifier(ConstructRef::Name(n1), Some(r1))
            .expect("reify");

        // A second reifier on the same construct is rejected.
        let err = graph.set_reifier(ConstructRef::Name(n1), Some(r2));
        assert!(matches!(err, Err(TopicMapError::InvalidArgument(_))));

        // The same topic cannot reify a second construct.
        let err = graph.set_reifier(ConstructRef::Name(n2), Some(r1));
        assert!(matches!(err, Err(TopicMapError::InvalidArgument(_))));

        // Idempotent re-assertion is fine.
        graph
            .set_reifier(ConstructRef::Name(n1), Some(r1))
            .expect("reify again");
        assert_eq!(
            graph.reifier_of(ConstructRef::Name(n1)).expect("reifier"),
            Some(r1)
        );
    }

    #[test]
    fn topics_cannot_be_reified() {
        let mut graph = TopicMapGraph::new();
        let a = graph.create_topic().expect("create");
        let b = graph.create_topic().expect("create");
        let err = graph.set_reifier(ConstructRef::Topic(a), Some(b));
        assert!(matches!(err, Err(TopicMapError::InvalidArgument(_))));
    }

    #[test]
    fn type_edges_maintain_reverse_index() {
        let mut graph = TopicMapGraph::new();
        let ty = graph.create_topic().expect("create");
        let instance = graph.create_topic().expect("create");

        graph.add_type(instance, ty).expect("add type");
        assert!(graph.instances_index(ty).is_some_and(|s| s.contains(&instance)));

        graph.remove_type(instance, ty).expect("remove type");
        assert!(graph.instances_index(ty).is_none());
    }

    #[test]
    fn role_player_rebinding_updates_index() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let p1 = graph.create_topic().expect("create");
        let p2 = graph.create_topic().expect("create");
        let assoc = graph.create_association(ty, scope).expect("assoc");
        let role = graph.create_role(assoc, ty, p1).expect("role");

        assert_eq!(graph.roles_played_by(p1), vec![role]);

        graph.set_role_player(role, p2).expect("rebind");
        assert!(graph.roles_played_by(p1).is_empty());
        assert_eq!(graph.roles_played_by(p2), vec![role]);
    }

    #[test]
    fn remove_association_cascades_roles() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let player = graph.create_topic().expect("create");
        let assoc = graph.create_association(ty, scope).expect("assoc");
        let role = graph.create_role(assoc, ty, player).expect("role");

        graph.remove_association(assoc).expect("remove");
        assert!(matches!(graph.role(role), Err(TopicMapError::NotFound(_))));
        assert!(graph.roles_played_by(player).is_empty());
    }

    #[test]
    fn remove_name_cascades_variants_and_unbinds() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");
        let name = graph.create_name(t, ty, "n", scope).expect("name");
        let variant = graph
            .create_variant(name, "v", Locator::new(XSD_STRING), scope)
            .expect("variant");
        let iid = Locator::new("http://example.org/iid");
        graph
            .add_item_identifier(ConstructRef::Name(name), iid.clone())
            .expect("iid");

        graph.remove_name(name).expect("remove");
        assert!(matches!(graph.variant(variant), Err(TopicMapError::NotFound(_))));
        assert!(!graph.item_identifier_bindings().contains_key(&iid));
        assert!(graph.topic(t).expect("topic").names.is_empty());
    }

    #[test]
    fn remove_topic_in_use_as_type_rejected() {
        let mut graph = TopicMapGraph::new();
        let ty = graph.create_topic().expect("create");
        let instance = graph.create_topic().expect("create");
        graph.add_type(instance, ty).expect("add type");

        let err = graph.remove_topic(ty);
        assert!(matches!(err, Err(TopicMapError::InvalidArgument(_))));

        graph.remove_type(instance, ty).expect("remove type");
        graph.remove_topic(ty).expect("remove");
        assert!(!graph.contains_topic(ty));
    }

    #[test]
    fn remove_topic_in_use_as_reifier_rejected() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let reifier = graph.create_topic().expect("create");
        let assoc = graph.create_association(ty, scope).expect("assoc");
        graph
            .set_reifier(ConstructRef::Association(assoc), Some(reifier))
            .expect("reify");

        let err = graph.remove_topic(reifier);
        assert!(matches!(err, Err(TopicMapError::InvalidArgument(_))));
        assert_eq!(
            graph.reifier_of(ConstructRef::Association(assoc)).expect("reifier"),
            Some(reifier)
        );

        // Clearing the reification frees the topic for removal.
        graph
            .set_reifier(ConstructRef::Association(assoc), None)
            .expect("clear");
        graph.remove_topic(reifier).expect("remove");
        assert!(!graph.contains_topic(reifier));
    }

    #[test]
    fn remove_topic_unbinds_identifiers() {
        let mut graph = TopicMapGraph::new();
        let t = graph.create_topic().expect("create");
        let si = Locator::new("http://example.org/si");
        graph.add_subject_identifier(t, si.clone()).expect("bind");

        graph.remove_topic(t).expect("remove");
        assert!(!graph.subject_identifier_bindings().contains_key(&si));
    }

    #[test]
    fn empty_scope_is_a_singleton() {
        let mut graph = TopicMapGraph::new();
        let first = graph.ensure_empty_scope();
        let second = graph.ensure_empty_scope();
        assert_eq!(first, second);
        assert_eq!(graph.scope_count(), 1);
    }

    #[test]
    fn oversized_value_rejected() {
        let (mut graph, scope) = graph_with_empty_scope();
        let ty = graph.create_topic().expect("create");
        let t = graph.create_topic().expect("create");
        let huge = "x".repeat(MAX_VALUE_LENGTH + 1);
        let result = graph.create_name(t, ty, huge, scope);
        assert!(matches!(result, Err(TopicMapError::InvalidArgument(_))));
    }
}
