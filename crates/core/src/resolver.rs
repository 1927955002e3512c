//! Top-level principal resolution.
//!
//! [`PrincipalResolver`] parses a principal at construction and resolves it
//! to a local user name in two tiers: the configured name-mapping provider
//! (if any) is asked first, and the rule translator is always the resolution
//! of last resort. Provider failures are contained; only a parse failure or
//! an exhausted rule set surfaces to the caller.
//!
//! Configuration is process-wide: [`set_global_config`] loads translation
//! rules (a NOP when rules are already set -- callers that intend to change
//! rules must use [`rules::set_rules`] directly) and remembers the
//! configuration from which the top-level provider is built on first use.

use std::sync::{Arc, RwLock};

use tracing::{debug, error, warn};

use crate::config::{AppConfig, SecurityConfig};
use crate::errors::{CoreError, PrincipalError};
use crate::principal::Principal;
use crate::provider::{registry, NameMappingProvider};
use crate::rules;

// ---------------------------------------------------------------------------
// Process-wide configuration
// ---------------------------------------------------------------------------

/// Construction state of the configured top-level provider.
enum ProviderSlot {
    /// No name-mapping provider configured.
    None,
    /// Configured but not yet constructed.
    Unbuilt,
    /// Constructed and shared by all resolvers.
    Built(Arc<dyn NameMappingProvider>),
    /// Construction failed; resolution proceeds without a provider.
    Failed,
}

struct GlobalConfig {
    security: SecurityConfig,
    provider: ProviderSlot,
}

static GLOBAL: RwLock<Option<GlobalConfig>> = RwLock::new(None);

/// Apply process-wide configuration.
///
/// Loads the derived rule string into the rule translator -- a NOP if rules
/// have already been set -- and remembers the configuration so the top-level
/// name-mapping provider can be built. Replaces any previously remembered
/// configuration (a provider built for the old configuration is discarded).
pub fn set_global_config(config: &AppConfig) -> Result<(), CoreError> {
    let spec = config.security.rule_spec()?;
    let loaded =
        rules::set_rules_if_unset(&spec, config.security.default_realm.as_deref())?;
    if !loaded {
        debug!("translation rules already set, configuration will not change them");
    }

    let provider = if config.security.name_mapping.is_some() {
        ProviderSlot::Unbuilt
    } else {
        ProviderSlot::None
    };

    let mut global = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    *global = Some(GlobalConfig {
        security: config.security.clone(),
        provider,
    });
    Ok(())
}

/// Drop all process-wide state: the remembered configuration, any built
/// provider, and the loaded rule set. Intended for tests and explicit
/// reconfiguration.
pub fn reset_global_config() {
    let mut global = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    *global = None;
    drop(global);
    rules::clear_rules();
}

/// The shared top-level provider, building it on first use.
fn current_provider() -> Option<Arc<dyn NameMappingProvider>> {
    {
        let global = GLOBAL.read().unwrap_or_else(|e| e.into_inner());
        match global.as_ref().map(|g| &g.provider) {
            Some(ProviderSlot::Built(provider)) => return Some(Arc::clone(provider)),
            Some(ProviderSlot::Unbuilt) => {}
            _ => return None,
        }
    }

    let mut global = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    let state = global.as_mut()?;
    // Another thread may have built it between our read and write locks.
    match &state.provider {
        ProviderSlot::Built(provider) => return Some(Arc::clone(provider)),
        ProviderSlot::Unbuilt => {}
        _ => return None,
    }

    let mapping = match state.security.name_mapping.as_ref() {
        Some(mapping) => mapping,
        None => {
            state.provider = ProviderSlot::Failed;
            return None;
        }
    };
    let built = match mapping.kind() {
        Some(kind) => registry::build(kind, &mapping.scoped()).map_err(|e| {
            error!(kind, error = %e, "failed to build name-mapping provider");
        }),
        None => {
            error!("name-mapping configuration has no implementation kind");
            Err(())
        }
    };

    match built {
        Ok(provider) => {
            let provider: Arc<dyn NameMappingProvider> = Arc::from(provider);
            debug!("name-mapping provider built");
            state.provider = ProviderSlot::Built(Arc::clone(&provider));
            Some(provider)
        }
        Err(()) => {
            // Resolution still works through the rule translator.
            state.provider = ProviderSlot::Failed;
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// A principal bound to the resolution machinery configured at its
/// construction time.
pub struct PrincipalResolver {
    principal: Principal,
    text: String,
    provider: Option<Arc<dyn NameMappingProvider>>,
}

impl PrincipalResolver {
    /// Parse a raw principal and capture the configured provider (built on
    /// first use and shared across resolvers).
    pub fn new(raw: &str) -> Result<Self, PrincipalError> {
        let principal = Principal::parse(raw)?;
        Ok(Self {
            principal,
            text: raw.to_string(),
            provider: current_provider(),
        })
    }

    /// The parsed principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The original principal text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve to a local user name.
    ///
    /// The provider (when configured) is asked with the original principal
    /// text; a non-empty answer wins. An empty answer or a contained
    /// provider failure falls back to the rule translator, which is never
    /// skipped as the resolution of last resort.
    pub fn short_name(&self) -> Result<String, CoreError> {
        if let Some(provider) = &self.provider {
            match provider.resolve(&self.text) {
                Ok(Some(name)) if !name.is_empty() => {
                    debug!(principal = %self.text, short_name = %name, "provider resolved");
                    return Ok(name);
                }
                Ok(_) => {
                    debug!(principal = %self.text, "provider has no answer, trying rules");
                }
                Err(e) => {
                    warn!(principal = %self.text, error = %e, "provider failed, trying rules");
                }
            }
        }
        Ok(rules::translate(&self.principal)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::errors::{ConfigError, ProviderError, RuleError};
    use crate::test_support::global_state_lock;

    struct RefusingMapper;

    impl NameMappingProvider for RefusingMapper {
        fn resolve(&self, _principal: &str) -> Result<Option<String>, ProviderError> {
            Err(ProviderError::Backend("always down".into()))
        }
    }

    fn build_refusing(
        _config: &ProviderConfig,
    ) -> Result<Box<dyn NameMappingProvider>, ConfigError> {
        Ok(Box::new(RefusingMapper))
    }

    fn config_from(toml_text: &str) -> AppConfig {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_rules_only_resolution() {
        let _guard = global_state_lock();
        reset_global_config();

        let config = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:$1]"
"#,
        );
        set_global_config(&config).unwrap();

        let resolver = PrincipalResolver::new("user@REALM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "user");

        reset_global_config();
    }

    #[test]
    fn test_default_rules_strip_instance_and_realm() {
        let _guard = global_state_lock();
        reset_global_config();

        set_global_config(&AppConfig::default()).unwrap();

        assert_eq!(
            PrincipalResolver::new("joe@X").unwrap().short_name().unwrap(),
            "joe"
        );
        assert_eq!(
            PrincipalResolver::new("hdfs/host@X")
                .unwrap()
                .short_name()
                .unwrap(),
            "hdfs"
        );

        reset_global_config();
    }

    #[test]
    fn test_provider_answer_wins() {
        let _guard = global_state_lock();
        reset_global_config();

        let config = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:$1]"

[security.name-mapping]
kind = "static"
[security.name-mapping.entries]
"nobody@AD.COM" = "joe"
"#,
        );
        set_global_config(&config).unwrap();

        let resolver = PrincipalResolver::new("nobody@AD.COM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "joe");

        // Unknown to the provider: rules take over.
        let resolver = PrincipalResolver::new("stranger@AD.COM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "stranger");

        reset_global_config();
    }

    #[test]
    fn test_provider_failure_falls_back_to_rules() {
        let _guard = global_state_lock();
        reset_global_config();
        registry::register("refusing", build_refusing);

        let config = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:$1]"

[security.name-mapping]
kind = "refusing"
"#,
        );
        set_global_config(&config).unwrap();

        let resolver = PrincipalResolver::new("user@REALM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "user");

        reset_global_config();
    }

    #[test]
    fn test_unknown_provider_kind_degrades_to_rules() {
        let _guard = global_state_lock();
        reset_global_config();

        let config = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:$1]"

[security.name-mapping]
kind = "no-such-kind"
"#,
        );
        set_global_config(&config).unwrap();

        let resolver = PrincipalResolver::new("user@REALM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "user");

        reset_global_config();
    }

    #[test]
    fn test_rule_exhaustion_surfaces() {
        let _guard = global_state_lock();
        reset_global_config();

        let config = config_from(
            r#"
[security]
auth-to-local = "RULE:[2:$1]"
"#,
        );
        set_global_config(&config).unwrap();

        let resolver = PrincipalResolver::new("solo@REALM").unwrap();
        assert!(matches!(
            resolver.short_name(),
            Err(CoreError::Rule(RuleError::NoMatchingRule(_)))
        ));

        reset_global_config();
    }

    #[test]
    fn test_malformed_principal_rejected_at_construction() {
        assert!(PrincipalResolver::new("no-realm-here").is_err());
    }

    #[test]
    fn test_reconfiguration_keeps_rules() {
        let _guard = global_state_lock();
        reset_global_config();

        let first = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:$1]"
"#,
        );
        set_global_config(&first).unwrap();

        // A second configuration with different rules does not replace the
        // loaded set; changing rules requires rules::set_rules directly.
        let second = config_from(
            r#"
[security]
auth-to-local = "RULE:[1:guest]"
"#,
        );
        set_global_config(&second).unwrap();

        let resolver = PrincipalResolver::new("user@REALM").unwrap();
        assert_eq!(resolver.short_name().unwrap(), "user");

        reset_global_config();
    }
}
