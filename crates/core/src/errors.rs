//! Error types for the principalmap core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Principal(#[from] PrincipalError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Principal errors
// ---------------------------------------------------------------------------

/// Errors from parsing principal strings.
#[derive(Debug, Error)]
pub enum PrincipalError {
    /// The input does not match `primary[/instance]@realm`.
    #[error("malformed principal '{text}': {detail}")]
    BadFormat {
        text: String,
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Rule translator errors
// ---------------------------------------------------------------------------

/// Errors from the auth-to-local rule translator.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule in the rule string could not be parsed.
    #[error("invalid translation rule at '{fragment}': {detail}")]
    InvalidRule {
        fragment: String,
        detail: String,
    },

    /// The rule set was exhausted without any rule matching.
    #[error("no translation rule matched principal '{0}'")]
    NoMatchingRule(String),

    /// `translate` was called before any rules were loaded.
    #[error("translation rules have not been set")]
    NotInitialized,
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Infrastructure errors from a name-mapping provider.
///
/// These never mean "principal unknown" -- a provider signals that with an
/// empty answer. They are contained at the chain boundary and logged.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's backing store could not be reached or read.
    #[error("provider backend error: {0}")]
    Backend(String),

    /// An operation was invoked on a composite before `configure`.
    #[error("composite mapper is not configured")]
    NotConfigured,

    /// A shared lock was poisoned by a panicking writer.
    #[error("provider state lock poisoned")]
    LockPoisoned,

    /// Generic I/O wrapper.
    #[error("provider I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and provider construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// No factory is registered for the requested provider kind.
    #[error("unknown provider kind '{0}'")]
    UnknownProviderKind(String),

    /// A required key is missing from a provider's configuration.
    #[error("provider configuration is missing required key '{0}'")]
    MissingKey(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = PrincipalError::BadFormat {
            text: "no-realm".into(),
            detail: "missing '@'".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed principal 'no-realm': missing '@'"
        );

        let err = RuleError::NoMatchingRule("user@OTHER.COM".into());
        assert!(err.to_string().contains("user@OTHER.COM"));

        let err = ConfigError::UnknownProviderKind("ldap".into());
        assert_eq!(err.to_string(), "unknown provider kind 'ldap'");

        let err = ProviderError::Backend("table file unreadable".into());
        assert!(err.to_string().contains("table file unreadable"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let rule_err = RuleError::NotInitialized;
        let core_err: CoreError = rule_err.into();
        assert!(matches!(core_err, CoreError::Rule(_)));

        let cfg_err = ConfigError::MissingKey("path".into());
        let core_err: CoreError = cfg_err.into();
        assert!(matches!(core_err, CoreError::Config(_)));
    }
}
