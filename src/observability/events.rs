//! Observable events for the binding engine
//!
//! Events are explicit and typed. Each maps to a stable upper-case name
//! used as the `event` field of the emitted log record.

use std::fmt;

/// Log severity for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-resolver / per-call detail
    Trace,
    /// Query and write lifecycle
    Debug,
    /// Bootstrap milestones
    Info,
    /// Recoverable issues (dropped values, skipped validation)
    Warn,
    /// Operation failures surfaced to the caller
    Error,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Bootstrap
    /// Registry assembled and bound
    RegistryBuilt,
    /// Resolver target resolved during bind
    ResolverBound,
    /// Configuration loaded
    ConfigLoaded,

    // Query
    /// Query executed against the store
    QueryExecuted,
    /// Query answered with generated fixtures (simulation mode)
    QuerySimulated,
    /// Query result padded with generated resources
    QueryBackfilled,

    // Resolvers
    /// Resolver produced a fresh value
    ResolverExecuted,
    /// Resolver answered from instance state
    ResolverCacheHit,
    /// Relationship resolved for a whole batch
    RelationshipBatchResolved,

    // Store
    /// Store method dispatched
    StoreCall,

    // Writes
    /// Resources inserted
    ResourcesCreated,
    /// Resources updated
    ResourcesUpdated,
    /// Resources deleted
    ResourcesDeleted,
    /// A null value for a non-nullable field was dropped before write
    NullValueDropped,
    /// Field coercion failed
    ValidationFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RegistryBuilt => "REGISTRY_BUILT",
            Event::ResolverBound => "RESOLVER_BOUND",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::QueryExecuted => "QUERY_COMPLETE",
            Event::QuerySimulated => "QUERY_SIMULATED",
            Event::QueryBackfilled => "QUERY_BACKFILLED",

            Event::ResolverExecuted => "RESOLVER_EXECUTED",
            Event::ResolverCacheHit => "RESOLVER_CACHE_HIT",
            Event::RelationshipBatchResolved => "RELATIONSHIP_BATCH_RESOLVED",

            Event::StoreCall => "STORE_CALL",

            Event::ResourcesCreated => "RESOURCES_CREATED",
            Event::ResourcesUpdated => "RESOURCES_UPDATED",
            Event::ResourcesDeleted => "RESOURCES_DELETED",
            Event::NullValueDropped => "NULL_VALUE_DROPPED",
            Event::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// Severity at which the event is emitted
    pub fn severity(&self) -> Severity {
        match self {
            Event::RegistryBuilt | Event::ConfigLoaded => Severity::Info,
            Event::ResolverBound
            | Event::ResolverExecuted
            | Event::ResolverCacheHit
            | Event::StoreCall => Severity::Trace,
            Event::NullValueDropped => Severity::Warn,
            Event::ValidationFailed => Severity::Error,
            _ => Severity::Debug,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::RegistryBuilt,
            Event::ResolverBound,
            Event::ConfigLoaded,
            Event::QueryExecuted,
            Event::QuerySimulated,
            Event::QueryBackfilled,
            Event::ResolverExecuted,
            Event::ResolverCacheHit,
            Event::RelationshipBatchResolved,
            Event::StoreCall,
            Event::ResourcesCreated,
            Event::ResourcesUpdated,
            Event::ResourcesDeleted,
            Event::NullValueDropped,
            Event::ValidationFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_severity() {
        assert_eq!(Event::ValidationFailed.severity(), Severity::Error);
        assert_eq!(Event::StoreCall.severity(), Severity::Trace);
        assert_eq!(Event::QueryExecuted.severity(), Severity::Debug);
        assert!(Severity::Warn > Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::QueryExecuted), "QUERY_COMPLETE");
    }
}
