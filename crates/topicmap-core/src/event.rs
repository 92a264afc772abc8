//! # Change Events
//!
//! The notification contract between the core and observing layers.
//!
//! The merge engine reports one event per structural removal it performs
//! as a side effect of duplicate elimination, plus one event per absorbed
//! topic. The core does not prescribe what observers do with events;
//! revision logs and notification buses live outside this crate.

use crate::ConstructRef;
use serde::{Deserialize, Serialize};

/// Kind of a structural change reported by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A construct was deleted from the graph.
    ConstructRemoved,
    /// A topic was absorbed into another topic.
    TopicsMerged,
}

/// A structural change notification: (kind, context, new value, old value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: EventKind,
    /// The construct the change happened on (the parent for removals,
    /// the surviving topic for merges).
    pub context: ConstructRef,
    /// The value after the change, if any.
    pub new_value: Option<ConstructRef>,
    /// The value before the change (the removed or absorbed construct).
    pub old_value: Option<ConstructRef>,
}

impl ChangeEvent {
    /// A construct was removed from `context`.
    #[must_use]
    pub fn removed(context: ConstructRef, removed: ConstructRef) -> Self {
        Self {
            kind: EventKind::ConstructRemoved,
            context,
            new_value: None,
            old_value: Some(removed),
        }
    }

    /// `absorbed` was merged into the surviving topic `kept`.
    #[must_use]
    pub fn merged(kept: ConstructRef, absorbed: ConstructRef) -> Self {
        Self {
            kind: EventKind::TopicsMerged,
            context: kept,
            new_value: Some(kept),
            old_value: Some(absorbed),
        }
    }
}

// =============================================================================
// SINK TRAIT
// =============================================================================

/// Receiver for change events.
///
/// # Extension Point
///
/// This trait is the seam to outer layers (notification buses, revision
/// logs). The core calls `publish` synchronously and ignores whatever the
/// sink does with the event; a sink must not call back into the graph.
pub trait EventSink {
    /// Receive one change event.
    fn publish(&mut self, event: ChangeEvent);
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&mut self, _event: ChangeEvent) {}
}

/// A sink that records every event, in order. Useful for tests and for
/// batching layers that forward events after a merge completes.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Events in publication order.
    pub events: Vec<ChangeEvent>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
