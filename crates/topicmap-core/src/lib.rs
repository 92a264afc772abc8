//! # topicmap-core
//!
//! The deterministic storage and query engine for topic maps.
//!
//! This crate implements the core substrate of a topic-maps system:
//! identity-bearing topics linked by typed associations, carrying scoped
//! names and occurrences, with canonical scopes, transitive type
//! hierarchies, and iterative topic unification.
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Owns all construct state; engines are stateless and operate over a
//!   [`TopicMapGraph`] value
//! - Is deterministic: `BTreeMap`/`BTreeSet` everywhere, equal inputs
//!   produce equal outputs and equal iteration orders
//! - Never panics; every fallible operation returns `Result`
//! - Has no async and no network dependencies (pure Rust)
//!
//! Persistence, wire formats and notification buses live outside this
//! crate; the [`EventSink`] trait is the seam they attach to.

// =============================================================================
// MODULES
// =============================================================================

pub mod event;
pub mod graph;
pub mod hierarchy;
pub mod identifier;
pub mod merge;
pub mod primitives;
pub mod scope;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Association, AssociationId, ConstructRef, Locator, Name, NameId, Occurrence, OccurrenceId,
    Role, RoleId, ScopeId, Topic, TopicId, TopicMapError, Variant, VariantId,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use graph::TopicMapGraph;
pub use hierarchy::TypeHierarchy;
pub use identifier::IdentifierIndex;
pub use merge::MergeEngine;
pub use scope::ScopeResolver;

// =============================================================================
// RE-EXPORTS: Events
// =============================================================================

pub use event::{ChangeEvent, EventKind, EventSink, NullSink, RecordingSink};

// =============================================================================
// RE-EXPORTS: Primitives
// =============================================================================

pub use primitives::{
    MAX_LOCATOR_LENGTH, MAX_PATTERN_LENGTH, MAX_VALUE_LENGTH, XSD_ANY_URI, XSD_STRING,
};
