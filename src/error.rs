//! Error types for the topology composer

use thiserror::Error;

/// Main error type for composition operations
///
/// Every error is detected synchronously during graph construction and
/// propagates immediately. A failed composition never hands a partial graph
/// to the provisioning engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No environment profile is registered for the requested name
    #[error("no environment profile registered for '{0}'")]
    ConfigNotFound(String),

    /// The network specification is invalid (CIDR, AZ count, tier layout)
    #[error("invalid network spec: {0}")]
    InvalidNetworkSpec(String),

    /// A dependency cycle or out-of-order builder invocation was detected
    #[error("dependency ordering violated: {0}")]
    DependencyCycle(String),

    /// A deterministic name or export key is already in use within its scope
    #[error("naming collision: {0}")]
    NamingCollision(String),

    /// Serialization/deserialization error while emitting the plan
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a config-not-found error for the given environment name
    pub fn config_not_found(name: impl Into<String>) -> Self {
        Self::ConfigNotFound(name.into())
    }

    /// Create an invalid-network-spec error with the given message
    pub fn invalid_network(msg: impl Into<String>) -> Self {
        Self::InvalidNetworkSpec(msg.into())
    }

    /// Create a dependency-ordering error with the given message
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::DependencyCycle(msg.into())
    }

    /// Create a naming-collision error with the given message
    pub fn collision(msg: impl Into<String>) -> Self {
        Self::NamingCollision(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: Error Propagation During Composition
    // ==========================================================================
    //
    // These tests demonstrate how errors surface during graph construction.
    // Each variant represents a distinct failure category with its own
    // handling requirement in the calling layer.

    /// Story: Requesting an unregistered environment aborts before any group
    ///
    /// When a caller asks for an environment with no registered profile, the
    /// resolver fails immediately and nothing else runs.
    #[test]
    fn story_unknown_environment_is_config_not_found() {
        let err = Error::config_not_found("staging");
        assert!(err.to_string().contains("no environment profile"));
        assert!(err.to_string().contains("staging"));

        match Error::config_not_found("qa") {
            Error::ConfigNotFound(name) => assert_eq!(name, "qa"),
            _ => panic!("Expected ConfigNotFound variant"),
        }
    }

    /// Story: Network misconfiguration fails fast
    ///
    /// A bad CIDR or an AZ count beyond region capacity is fatal at the
    /// network builder, before any resource group is built.
    #[test]
    fn story_network_misconfiguration_fails_fast() {
        let err = Error::invalid_network("CIDR '10.0.0.0/40' has an invalid prefix length");
        assert!(err.to_string().contains("invalid network spec"));
        assert!(err.to_string().contains("/40"));

        let err = Error::invalid_network("availability zone count 9 exceeds region capacity");
        assert!(err.to_string().contains("region capacity"));

        match Error::invalid_network("any message") {
            Error::InvalidNetworkSpec(msg) => assert_eq!(msg, "any message"),
            _ => panic!("Expected InvalidNetworkSpec variant"),
        }
    }

    /// Story: Out-of-order builder invocation is a construction defect
    ///
    /// The load-balancing builder invoked before the compute builder is a
    /// dependency-ordering defect, not a silent empty pool. The same variant
    /// covers an actual cycle among resource groups.
    #[test]
    fn story_ordering_defects_are_dependency_cycles() {
        let err = Error::dependency("load-balancing group built before the compute group");
        assert!(err.to_string().contains("dependency ordering violated"));

        let err = Error::dependency("cycle detected: web -> database -> web");
        assert!(err.to_string().contains("cycle detected"));

        match Error::dependency("out of order") {
            Error::DependencyCycle(msg) => assert_eq!(msg, "out of order"),
            _ => panic!("Expected DependencyCycle variant"),
        }
    }

    /// Story: Duplicate deterministic names surface before emission
    #[test]
    fn story_naming_collisions_surface_before_emission() {
        let err = Error::collision("export 'acme-dev-network-id' already bound");
        assert!(err.to_string().contains("naming collision"));
        assert!(err.to_string().contains("acme-dev-network-id"));

        match Error::collision("dup") {
            Error::NamingCollision(msg) => assert_eq!(msg, "dup"),
            _ => panic!("Expected NamingCollision variant"),
        }
    }

    /// Story: Error constructors accept both String and &str
    #[test]
    fn story_error_construction_ergonomics() {
        let env = "staging";
        let err = Error::config_not_found(format!("{env}-eu"));
        assert!(err.to_string().contains("staging-eu"));

        let err = Error::serialization("static message");
        assert!(err.to_string().contains("static message"));
    }

    /// Story: Errors are categorized for handling in the calling layer
    ///
    /// Composition errors are all fatal here, but callers distinguish user
    /// configuration mistakes from construction defects in this crate.
    #[test]
    fn story_error_categorization() {
        fn categorize(err: &Error) -> &'static str {
            match err {
                Error::ConfigNotFound(_) => "user_config",
                Error::InvalidNetworkSpec(_) => "user_config",
                Error::DependencyCycle(_) => "construction_defect",
                Error::NamingCollision(_) => "construction_defect",
                Error::Serialization(_) => "emission",
            }
        }

        assert_eq!(categorize(&Error::config_not_found("x")), "user_config");
        assert_eq!(categorize(&Error::invalid_network("x")), "user_config");
        assert_eq!(categorize(&Error::dependency("x")), "construction_defect");
        assert_eq!(categorize(&Error::collision("x")), "construction_defect");
    }
}
