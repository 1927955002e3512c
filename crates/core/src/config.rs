//! TOML-based configuration for principalmap.
//!
//! The typed [`AppConfig`] covers the fixed keys (authentication method,
//! default realm, auth-to-local rules). Provider configuration is free-form:
//! the `[security.name-mapping]` table is carried as a [`ProviderConfig`] so
//! arbitrary provider-specific keys survive deserialization and can be
//! scoped per provider without string-prefix rewriting.
//!
//! ```toml
//! [security]
//! authentication = "simple"
//! auth-to-local = "RULE:[1:$1] RULE:[2:$1]"
//!
//! [security.name-mapping]
//! kind = "composite"
//! providers = "corp,partners"
//!
//! [security.name-mapping.provider.corp]
//! kind = "static"
//! path = "/etc/principalmap/corp.toml"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;

/// Key holding a provider's implementation identifier.
pub const KIND_KEY: &str = "kind";
/// Key holding the ordered, comma-separated provider-name list.
pub const PROVIDERS_KEY: &str = "providers";
/// Table holding one sub-table of settings per named provider.
pub const PROVIDER_TABLE_KEY: &str = "provider";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Security / name-mapping settings.
    #[serde(default)]
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Security section
// ---------------------------------------------------------------------------

/// Authentication method the deployment trusts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// No external trust realm; principals are plain user names.
    #[default]
    Simple,
    /// Kerberos: principals carry a trust realm.
    Kerberos,
}

/// The `[security]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityConfig {
    /// Authentication method (default `simple`).
    #[serde(default)]
    pub authentication: AuthMethod,

    /// Default trust realm, consulted by the `DEFAULT` translation rule.
    #[serde(default)]
    pub default_realm: Option<String>,

    /// Explicit auth-to-local rule string. When absent, a method-dependent
    /// default is synthesized (see [`SecurityConfig::rule_spec`]).
    #[serde(default)]
    pub auth_to_local: Option<String>,

    /// Top-level name-mapping provider configuration. Absent means only the
    /// rule translator resolves names.
    #[serde(default)]
    pub name_mapping: Option<ProviderConfig>,
}

impl SecurityConfig {
    /// The rule string to load: the explicit `auth-to-local` value if set,
    /// else `DEFAULT` for kerberos (which requires a known default realm),
    /// else a rule pair that strips any realm and instance.
    pub fn rule_spec(&self) -> Result<String, ConfigError> {
        if let Some(rules) = &self.auth_to_local {
            return Ok(rules.clone());
        }
        match self.authentication {
            AuthMethod::Kerberos => {
                if self.default_realm.is_none() {
                    return Err(ConfigError::InvalidValue {
                        field: "security.default-realm".into(),
                        detail: "kerberos authentication needs a default realm \
                                 when no auth-to-local rules are set"
                            .into(),
                    });
                }
                Ok("DEFAULT".into())
            }
            AuthMethod::Simple => Ok("RULE:[1:$1] RULE:[2:$1]".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider configuration
// ---------------------------------------------------------------------------

/// Free-form configuration for one provider: a TOML table of settings.
///
/// The table's `kind` key selects the implementation; everything else is the
/// provider's own namespace. [`ProviderConfig::scoped`] produces the view a
/// provider instance receives -- its table with the selection key removed,
/// never any sibling's keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProviderConfig {
    entries: toml::value::Table,
}

impl ProviderConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing TOML table.
    pub fn from_table(entries: toml::value::Table) -> Self {
        Self { entries }
    }

    /// Set a key. Intended for building configurations programmatically.
    pub fn insert(&mut self, key: &str, value: impl Into<toml::Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.entries.get(key)
    }

    /// String value lookup.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(toml::Value::as_str)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The implementation identifier (`kind` key), if any.
    pub fn kind(&self) -> Option<&str> {
        self.get_str(KIND_KEY)
    }

    /// The declared provider names, in order, duplicates preserved.
    ///
    /// The `providers` key is a comma-separated list; whitespace around names
    /// is ignored, empty segments are dropped.
    pub fn provider_names(&self) -> Vec<String> {
        self.get_str(PROVIDERS_KEY)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The settings table declared for a named provider, if any.
    pub fn provider_table(&self, name: &str) -> Option<ProviderConfig> {
        self.entries
            .get(PROVIDER_TABLE_KEY)
            .and_then(toml::Value::as_table)
            .and_then(|providers| providers.get(name))
            .and_then(toml::Value::as_table)
            .map(|table| Self::from_table(table.clone()))
    }

    /// The view handed to a provider instance: this table without the
    /// implementation-selection key.
    pub fn scoped(&self) -> ProviderConfig {
        let mut entries = self.entries.clone();
        entries.remove(KIND_KEY);
        Self { entries }
    }
}
