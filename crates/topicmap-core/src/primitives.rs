//! # Innate Primitives
//!
//! Hardcoded runtime constants for the topic-maps core.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Datatype locator for plain string literals.
///
/// Names always carry this datatype; occurrences and variants default to
/// it unless the caller supplies another datatype locator.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// Datatype locator for URI-valued literals.
pub const XSD_ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for locator strings.
///
/// Locators longer than this are rejected by the binding mutators.
/// This prevents memory exhaustion from malformed input.
pub const MAX_LOCATOR_LENGTH: usize = 4096;

/// Maximum length for literal value strings.
///
/// Values longer than this (64KB) are rejected at construct creation.
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum length for regex pattern arguments to identifier queries.
///
/// Limits the compilation cost of hostile patterns.
pub const MAX_PATTERN_LENGTH: usize = 1024;
