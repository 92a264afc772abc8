//! # Identifier Index
//!
//! Locator-keyed lookup over the graph's identifier bindings, gated by an
//! explicit open/close lifecycle.
//!
//! The index reads the graph's binding maps directly, so it is always
//! consistent with the latest mutation; the lifecycle exists for outer
//! layers that hand the index out and need to fence stale handles. Every
//! query on a closed index fails with an illegal-state error.
//!
//! Pattern queries compile the caller's regex with implicit full anchoring:
//! `a.c` matches the whole locator `abc`, never a substring of a longer
//! one.

use crate::graph::TopicMapGraph;
use crate::primitives::MAX_PATTERN_LENGTH;
use crate::types::{ConstructRef, Locator, TopicId, TopicMapError};
use regex::Regex;

/// Locator-keyed lookup over subject identifiers, subject locators and
/// item identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentifierIndex {
    open: bool,
}

impl IdentifierIndex {
    /// Create a new index in the closed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the index. Opening an open index is a no-op.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close the index. Closing a closed index is a no-op.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Whether the index currently accepts queries.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn guard(&self) -> Result<(), TopicMapError> {
        if self.open {
            Ok(())
        } else {
            Err(TopicMapError::IllegalState(
                "identifier index is not open".to_string(),
            ))
        }
    }

    // -------------------------------------------------------------------------
    // EXACT LOOKUPS
    // -------------------------------------------------------------------------

    /// Whether the locator is bound as any kind of identifier.
    pub fn exists_identifier(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<bool, TopicMapError> {
        self.guard()?;
        Ok(graph.item_identifier_bindings().contains_key(locator)
            || graph.subject_identifier_bindings().contains_key(locator)
            || graph.subject_locator_bindings().contains_key(locator))
    }

    /// Whether the locator is bound as an item identifier.
    pub fn exists_item_identifier(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<bool, TopicMapError> {
        self.guard()?;
        Ok(graph.item_identifier_bindings().contains_key(locator))
    }

    /// Whether the locator is bound as a subject identifier.
    pub fn exists_subject_identifier(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<bool, TopicMapError> {
        self.guard()?;
        Ok(graph.subject_identifier_bindings().contains_key(locator))
    }

    /// Whether the locator is bound as a subject locator.
    pub fn exists_subject_locator(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<bool, TopicMapError> {
        self.guard()?;
        Ok(graph.subject_locator_bindings().contains_key(locator))
    }

    /// The construct bound to the item identifier, if any.
    pub fn construct_by_item_identifier(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<Option<ConstructRef>, TopicMapError> {
        self.guard()?;
        Ok(graph.item_identifier_bindings().get(locator).copied())
    }

    /// The topic bound to the subject identifier, if any.
    pub fn topic_by_subject_identifier(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<Option<TopicId>, TopicMapError> {
        self.guard()?;
        Ok(graph.subject_identifier_bindings().get(locator).copied())
    }

    /// The topic bound to the subject locator, if any.
    pub fn topic_by_subject_locator(
        &self,
        graph: &TopicMapGraph,
        locator: &Locator,
    ) -> Result<Option<TopicId>, TopicMapError> {
        self.guard()?;
        Ok(graph.subject_locator_bindings().get(locator).copied())
    }

    // -------------------------------------------------------------------------
    // PATTERN QUERIES
    // -------------------------------------------------------------------------

    /// Constructs whose item identifier, or topics whose subject
    /// identifier or subject locator, fully matches the pattern.
    pub fn constructs_by_identifier(
        &self,
        graph: &TopicMapGraph,
        pattern: &str,
    ) -> Result<Vec<ConstructRef>, TopicMapError> {
        self.guard()?;
        let regex = anchored(pattern)?;
        let mut result: Vec<ConstructRef> = graph
            .item_identifier_bindings()
            .iter()
            .filter(|(locator, _)| regex.is_match(locator.as_str()))
            .map(|(_, construct)| *construct)
            .collect();
        result.extend(
            graph
                .subject_identifier_bindings()
                .iter()
                .chain(graph.subject_locator_bindings().iter())
                .filter(|(locator, _)| regex.is_match(locator.as_str()))
                .map(|(_, topic)| ConstructRef::Topic(*topic)),
        );
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Constructs whose item identifier fully matches the pattern.
    pub fn constructs_by_item_identifier(
        &self,
        graph: &TopicMapGraph,
        pattern: &str,
    ) -> Result<Vec<ConstructRef>, TopicMapError> {
        self.guard()?;
        let regex = anchored(pattern)?;
        let mut result: Vec<ConstructRef> = graph
            .item_identifier_bindings()
            .iter()
            .filter(|(locator, _)| regex.is_match(locator.as_str()))
            .map(|(_, construct)| *construct)
            .collect();
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Topics with a subject identifier fully matching the pattern.
    pub fn topics_by_subject_identifier(
        &self,
        graph: &TopicMapGraph,
        pattern: &str,
    ) -> Result<Vec<TopicId>, TopicMapError> {
        self.guard()?;
        let regex = anchored(pattern)?;
        let mut result: Vec<TopicId> = graph
            .subject_identifier_bindings()
            .iter()
            .filter(|(locator, _)| regex.is_match(locator.as_str()))
            .map(|(_, topic)| *topic)
            .collect();
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Topics with a subject locator fully matching the pattern.
    pub fn topics_by_subject_locator(
        &self,
        graph: &TopicMapGraph,
        pattern: &str,
    ) -> Result<Vec<TopicId>, TopicMapError> {
        self.guard()?;
        let regex = anchored(pattern)?;
        let mut result: Vec<TopicId> = graph
            .subject_locator_bindings()
            .iter()
            .filter(|(locator, _)| regex.is_match(locator.as_str()))
            .map(|(_, topic)| *topic)
            .collect();
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }
}

/// Compile a caller pattern with implicit full anchoring. Oversized or
/// malformed patterns are invalid arguments.
fn anchored(pattern: &str) -> Result<Regex, TopicMapError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(TopicMapError::InvalidArgument(format!(
            "pattern exceeds {} bytes",
            MAX_PATTERN_LENGTH
        )));
    }
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| TopicMapError::InvalidArgument(format!("invalid pattern: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
