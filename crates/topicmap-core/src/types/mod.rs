//! # Core Type Definitions
//!
//! This module contains all core types for the topic-maps construct graph:
//! - Construct identifiers (`TopicId`, `AssociationId`, ..., `ScopeId`)
//! - The `ConstructRef` address used for reifier and item-identifier edges
//! - `Locator`, the opaque URI-like identifier string
//! - Construct records (`Topic`, `Association`, `Role`, `Name`,
//!   `Occurrence`, `Variant`)
//! - Error types (`TopicMapError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Store cross-references as ids only; the construct graph resolves them

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// CONSTRUCT IDENTIFIERS
// =============================================================================

/// Unique identifier for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicId(pub u64);

/// Unique identifier for an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssociationId(pub u64);

/// Unique identifier for a role within an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(pub u64);

/// Unique identifier for a topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameId(pub u64);

/// Unique identifier for an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccurrenceId(pub u64);

/// Unique identifier for a name variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantId(pub u64);

/// Unique identifier for a canonical scope (an exact set of themes).
///
/// Scopes are identified by their theme set: the graph never holds two
/// scopes with equal theme sets, so `ScopeId` equality is scope equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

// =============================================================================
// CONSTRUCT REFERENCE
// =============================================================================

/// Address of any construct in the graph, including the map itself.
///
/// Used wherever an edge may point at constructs of different kinds:
/// reifier targets, item-identifier bindings, and change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstructRef {
    /// The topic map itself (a reifiable construct).
    TopicMap,
    /// A topic.
    Topic(TopicId),
    /// An association.
    Association(AssociationId),
    /// A role.
    Role(RoleId),
    /// A name.
    Name(NameId),
    /// An occurrence.
    Occurrence(OccurrenceId),
    /// A variant.
    Variant(VariantId),
}

// =============================================================================
// LOCATOR
// =============================================================================

/// An opaque, immutable URI-like identifier string.
///
/// Locators identify subjects (subject identifiers, subject locators) and
/// constructs (item identifiers). The graph enforces that each locator is
/// bound to at most one live construct per identifier kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Locator(pub String);

impl Locator {
    /// Create a new locator from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the locator as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// TOPIC
// =============================================================================

/// An identity-bearing node in the graph.
///
/// All cross-references are stored as ids and resolved through the
/// construct graph. A destroyed or merged-away topic's id never again
/// resolves to a live record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// The stable internal identifier.
    pub id: TopicId,
    /// Direct type topics (type-instance edges, may be cyclic).
    pub types: BTreeSet<TopicId>,
    /// Direct supertype topics (supertype-subtype edges, may be cyclic).
    pub supertypes: BTreeSet<TopicId>,
    /// Names owned by this topic.
    pub names: BTreeSet<NameId>,
    /// Occurrences owned by this topic.
    pub occurrences: BTreeSet<OccurrenceId>,
    /// Subject identifiers bound to this topic.
    pub subject_identifiers: BTreeSet<Locator>,
    /// Subject locators bound to this topic.
    pub subject_locators: BTreeSet<Locator>,
    /// Item identifiers bound to this topic.
    pub item_identifiers: BTreeSet<Locator>,
    /// The construct this topic reifies, if any (at most one).
    pub reified: Option<ConstructRef>,
}

impl Topic {
    /// Create a new topic with no edges or identifiers.
    #[must_use]
    pub fn new(id: TopicId) -> Self {
        Self {
            id,
            types: BTreeSet::new(),
            supertypes: BTreeSet::new(),
            names: BTreeSet::new(),
            occurrences: BTreeSet::new(),
            subject_identifiers: BTreeSet::new(),
            subject_locators: BTreeSet::new(),
            item_identifiers: BTreeSet::new(),
            reified: None,
        }
    }
}

// =============================================================================
// ASSOCIATION & ROLE
// =============================================================================

/// A typed, scoped n-ary relationship between topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// The stable internal identifier.
    pub id: AssociationId,
    /// Type topic.
    pub ty: TopicId,
    /// Canonical scope.
    pub scope: ScopeId,
    /// Roles belonging to this association.
    pub roles: BTreeSet<RoleId>,
    /// The topic reifying this association, if any.
    pub reifier: Option<TopicId>,
    /// Item identifiers bound to this association.
    pub item_identifiers: BTreeSet<Locator>,
}

impl Association {
    /// Create a new association with no roles.
    #[must_use]
    pub fn new(id: AssociationId, ty: TopicId, scope: ScopeId) -> Self {
        Self {
            id,
            ty,
            scope,
            roles: BTreeSet::new(),
            reifier: None,
            item_identifiers: BTreeSet::new(),
        }
    }
}

/// A role binding a role-type to a player topic within an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// The stable internal identifier.
    pub id: RoleId,
    /// The owning association.
    pub parent: AssociationId,
    /// Role-type topic.
    pub ty: TopicId,
    /// Player topic.
    pub player: TopicId,
    /// The topic reifying this role, if any.
    pub reifier: Option<TopicId>,
    /// Item identifiers bound to this role.
    pub item_identifiers: BTreeSet<Locator>,
}

impl Role {
    /// Create a new role.
    #[must_use]
    pub fn new(id: RoleId, parent: AssociationId, ty: TopicId, player: TopicId) -> Self {
        Self {
            id,
            parent,
            ty,
            player,
            reifier: None,
            item_identifiers: BTreeSet::new(),
        }
    }
}

// =============================================================================
// CHARACTERISTICS
// =============================================================================

/// A typed, scoped name characteristic of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// The stable internal identifier.
    pub id: NameId,
    /// The owning topic.
    pub parent: TopicId,
    /// Type topic.
    pub ty: TopicId,
    /// Literal value.
    pub value: String,
    /// Canonical scope.
    pub scope: ScopeId,
    /// Variants refining this name.
    pub variants: BTreeSet<VariantId>,
    /// The topic reifying this name, if any.
    pub reifier: Option<TopicId>,
    /// Item identifiers bound to this name.
    pub item_identifiers: BTreeSet<Locator>,
}

impl Name {
    /// Create a new name with no variants.
    #[must_use]
    pub fn new(id: NameId, parent: TopicId, ty: TopicId, value: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            id,
            parent,
            ty,
            value: value.into(),
            scope,
            variants: BTreeSet::new(),
            reifier: None,
            item_identifiers: BTreeSet::new(),
        }
    }
}

/// A typed, scoped occurrence characteristic of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// The stable internal identifier.
    pub id: OccurrenceId,
    /// The owning topic.
    pub parent: TopicId,
    /// Type topic.
    pub ty: TopicId,
    /// Literal value.
    pub value: String,
    /// Datatype locator of the literal value.
    pub datatype: Locator,
    /// Canonical scope.
    pub scope: ScopeId,
    /// The topic reifying this occurrence, if any.
    pub reifier: Option<TopicId>,
    /// Item identifiers bound to this occurrence.
    pub item_identifiers: BTreeSet<Locator>,
}

impl Occurrence {
    /// Create a new occurrence.
    #[must_use]
    pub fn new(
        id: OccurrenceId,
        parent: TopicId,
        ty: TopicId,
        value: impl Into<String>,
        datatype: Locator,
        scope: ScopeId,
    ) -> Self {
        Self {
            id,
            parent,
            ty,
            value: value.into(),
            datatype,
            scope,
            reifier: None,
            item_identifiers: BTreeSet::new(),
        }
    }
}

/// A scoped refinement of a name's value.
///
/// A variant stores only its own explicit scope; for theme matching its
/// effective themes are the union of its own themes with its parent
/// name's themes. It inherits no type of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// The stable internal identifier.
    pub id: VariantId,
    /// The owning name.
    pub parent: NameId,
    /// Literal value.
    pub value: String,
    /// Datatype locator of the literal value.
    pub datatype: Locator,
    /// Canonical scope (explicit themes only).
    pub scope: ScopeId,
    /// The topic reifying this variant, if any.
    pub reifier: Option<TopicId>,
    /// Item identifiers bound to this variant.
    pub item_identifiers: BTreeSet<Locator>,
}

impl Variant {
    /// Create a new variant.
    #[must_use]
    pub fn new(
        id: VariantId,
        parent: NameId,
        value: impl Into<String>,
        datatype: Locator,
        scope: ScopeId,
    ) -> Self {
        Self {
            id,
            parent,
            value: value.into(),
            datatype,
            scope,
            reifier: None,
            item_identifiers: BTreeSet::new(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the topic-maps core.
///
/// - No silent failures
/// - Use `Result<T, TopicMapError>` for fallible operations
/// - The core never panics; all errors are surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicMapError {
    /// A required argument was malformed, empty where a concrete set is
    /// required, or an unsupported combination.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An index or store was used outside its open lifecycle state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The operation is explicitly not implemented by this engine.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The referenced construct does not resolve to a live record.
    #[error("construct not found: {0:?}")]
    NotFound(ConstructRef),

    /// The locator is already bound to a different live construct.
    #[error("identity conflict: locator {} is already bound", .0.as_str())]
    IdentityConflict(Locator),

    /// A required record or generated id is missing after a successful
    /// structural mutation. Fatal; never retried.
    #[error("internal consistency error: {0}")]
    Inconsistent(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_round_trips_string() {
        let loc = Locator::new("http://example.org/thing");
        assert_eq!(loc.as_str(), "http://example.org/thing");
    }

    #[test]
    fn construct_ref_deterministic_ordering() {
        let mut set = BTreeSet::new();
        set.insert(ConstructRef::Name(NameId(3)));
        set.insert(ConstructRef::Topic(TopicId(1)));
        set.insert(ConstructRef::TopicMap);

        let refs: Vec<_> = set.iter().copied().collect();
        assert_eq!(
            refs,
            vec![
                ConstructRef::TopicMap,
                ConstructRef::Topic(TopicId(1)),
                ConstructRef::Name(NameId(3)),
            ]
        );
    }

    #[test]
    fn new_topic_is_empty() {
        let topic = Topic::new(TopicId(7));
        assert!(topic.types.is_empty());
        assert!(topic.subject_identifiers.is_empty());
        assert_eq!(topic.reified, None);
    }

    #[test]
    fn error_display_carries_locator() {
        let err = TopicMapError::IdentityConflict(Locator::new("urn:x"));
        assert!(err.to_string().contains("urn:x"));
    }
}
