//! Provider construction by implementation identifier.
//!
//! Configuration names provider implementations by string (`kind = "static"`).
//! This registry maps those identifiers to factory functions so providers can
//! be built generically from configuration. The built-in kinds are
//! `composite` and `static`; embedders can [`register`] additional kinds at
//! runtime before configuration is applied.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use tracing::debug;

use crate::config::ProviderConfig;
use crate::errors::ConfigError;
use crate::provider::{CompositeNameMapper, NameMappingProvider, StaticNameMapper};

/// Constructs a provider from its scoped configuration.
pub type ProviderFactory =
    fn(&ProviderConfig) -> Result<Box<dyn NameMappingProvider>, ConfigError>;

static REGISTRY: LazyLock<RwLock<HashMap<String, ProviderFactory>>> =
    LazyLock::new(|| RwLock::new(builtin_factories()));

fn builtin_factories() -> HashMap<String, ProviderFactory> {
    let mut map: HashMap<String, ProviderFactory> = HashMap::new();
    map.insert("composite".into(), build_composite);
    map.insert("static".into(), build_static);
    map
}

fn build_composite(config: &ProviderConfig) -> Result<Box<dyn NameMappingProvider>, ConfigError> {
    Ok(Box::new(CompositeNameMapper::from_config(config)?))
}

fn build_static(config: &ProviderConfig) -> Result<Box<dyn NameMappingProvider>, ConfigError> {
    Ok(Box::new(StaticNameMapper::from_config(config)?))
}

/// Register a provider kind, replacing any factory previously registered
/// under the same identifier.
pub fn register(kind: &str, factory: ProviderFactory) {
    debug!(kind, "registering provider kind");
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(kind.to_string(), factory);
}

/// Whether a factory is registered for the given kind.
pub fn is_registered(kind: &str) -> bool {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    registry.contains_key(kind)
}

/// Build a provider of the given kind from its scoped configuration.
pub fn build(
    kind: &str,
    config: &ProviderConfig,
) -> Result<Box<dyn NameMappingProvider>, ConfigError> {
    let factory = {
        let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
        registry
            .get(kind)
            .copied()
            .ok_or_else(|| ConfigError::UnknownProviderKind(kind.to_string()))?
    };
    debug!(kind, "building provider");
    factory(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;

    struct EchoMapper;

    impl NameMappingProvider for EchoMapper {
        fn resolve(&self, principal: &str) -> Result<Option<String>, ProviderError> {
            Ok(Some(principal.to_string()))
        }
    }

    fn build_echo(_config: &ProviderConfig) -> Result<Box<dyn NameMappingProvider>, ConfigError> {
        Ok(Box::new(EchoMapper))
    }

    #[test]
    fn test_builtins_registered() {
        assert!(is_registered("composite"));
        assert!(is_registered("static"));
        assert!(!is_registered("ldap"));
    }

    #[test]
    fn test_unknown_kind() {
        let result = build("no-such-kind", &ProviderConfig::new());
        assert!(matches!(result, Err(ConfigError::UnknownProviderKind(_))));
    }

    #[test]
    fn test_register_external_kind() {
        register("echo", build_echo);
        let provider = build("echo", &ProviderConfig::new()).unwrap();
        assert_eq!(
            provider.resolve("a@B").unwrap(),
            Some("a@B".to_string())
        );
    }

    #[test]
    fn test_build_static_from_config() {
        let config: ProviderConfig = toml::from_str(
            r#"
[entries]
"nobody@AD.COM" = "joe"
"#,
        )
        .unwrap();
        let provider = build("static", &config).unwrap();
        assert_eq!(
            provider.resolve("nobody@AD.COM").unwrap(),
            Some("joe".to_string())
        );
        assert_eq!(provider.resolve("other@AD.COM").unwrap(), None);
    }
}
