//! A provider that chains other providers.
//!
//! [`CompositeNameMapper`] holds an ordered list of child providers built
//! from configuration and queries them in declared order, short-circuiting
//! on the first non-empty answer. It exists so existing provider
//! implementations can be combined into a virtually new one without custom
//! development.
//!
//! A misbehaving child never breaks the chain: configuration problems skip
//! that entry, and resolution errors are logged and treated as "no answer"
//! from that child.

use std::sync::RwLock;

use tracing::{debug, error, warn};

use crate::config::ProviderConfig;
use crate::errors::{ConfigError, ProviderError};
use crate::provider::{registry, NameMappingProvider};

/// One configured child in the chain.
struct ProviderEntry {
    name: String,
    provider: Box<dyn NameMappingProvider>,
}

/// Chain state. `configured` flips exactly once.
struct Chain {
    configured: bool,
    entries: Vec<ProviderEntry>,
}

/// An ordered chain of name-mapping providers behind the provider contract.
pub struct CompositeNameMapper {
    chain: RwLock<Chain>,
}

impl CompositeNameMapper {
    /// Create an unconfigured composite. `resolve` is rejected until
    /// [`configure`](Self::configure) has run.
    pub fn new() -> Self {
        Self {
            chain: RwLock::new(Chain {
                configured: false,
                entries: Vec::new(),
            }),
        }
    }

    /// Create and configure a composite in one step.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let mapper = Self::new();
        mapper.configure(config)?;
        Ok(mapper)
    }

    /// Build the provider chain from configuration. One-way: a configured
    /// composite cannot be reconfigured; build a new one instead.
    ///
    /// The `providers` key lists child names in resolution order. Each name
    /// must have a `provider.<name>` table whose `kind` selects the
    /// implementation; the rest of that table is the child's scoped
    /// configuration. An entry with a missing table, missing or unknown
    /// kind, or failing factory is logged and skipped -- the chain keeps the
    /// remaining entries. Duplicate names are allowed and execute once per
    /// occurrence, but both occurrences read the same configuration table.
    pub fn configure(&self, config: &ProviderConfig) -> Result<(), ConfigError> {
        let mut chain = self
            .chain
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if chain.configured {
            return Err(ConfigError::InvalidValue {
                field: "providers".into(),
                detail: "composite mapper is already configured".into(),
            });
        }

        let names = config.provider_names();
        if names.is_empty() {
            warn!("no name-mapping providers declared, chain is empty");
        }

        for name in names {
            let table = match config.provider_table(&name) {
                Some(table) => table,
                None => {
                    error!(provider = %name, "provider has no configuration table, skipping");
                    continue;
                }
            };
            let kind = match table.kind() {
                Some(kind) => kind.to_string(),
                None => {
                    error!(provider = %name, "provider has no implementation kind, skipping");
                    continue;
                }
            };
            match registry::build(&kind, &table.scoped()) {
                Ok(provider) => {
                    debug!(provider = %name, kind = %kind, "added provider to chain");
                    chain.entries.push(ProviderEntry { name, provider });
                }
                Err(e) => {
                    error!(provider = %name, kind = %kind, error = %e, "failed to build provider, skipping");
                }
            }
        }

        debug!(count = chain.entries.len(), "composite mapper configured");
        chain.configured = true;
        Ok(())
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.chain
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .len()
    }

    /// Whether the chain holds no providers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompositeNameMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl NameMappingProvider for CompositeNameMapper {
    /// Query children in configured order. The first non-empty answer wins
    /// and the remaining children are not consulted. A child's error is
    /// logged and treated as "no answer" from that child; the chain is
    /// exhausted before returning `Ok(None)`.
    fn resolve(&self, principal: &str) -> Result<Option<String>, ProviderError> {
        let chain = self.chain.read().map_err(|_| ProviderError::LockPoisoned)?;
        if !chain.configured {
            return Err(ProviderError::NotConfigured);
        }

        for entry in &chain.entries {
            match entry.provider.resolve(principal) {
                Ok(Some(name)) if !name.is_empty() => {
                    debug!(
                        principal,
                        provider = %entry.name,
                        short_name = %name,
                        "provider answered"
                    );
                    return Ok(Some(name));
                }
                Ok(_) => {
                    debug!(principal, provider = %entry.name, "provider has no answer");
                }
                Err(e) => {
                    warn!(
                        principal,
                        provider = %entry.name,
                        error = %e,
                        "provider failed, continuing with next provider"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Broadcast to every child unconditionally; a failing child is logged
    /// and does not stop the broadcast.
    fn refresh_cache(&self) -> Result<(), ProviderError> {
        let chain = self.chain.read().map_err(|_| ProviderError::LockPoisoned)?;
        for entry in &chain.entries {
            if let Err(e) = entry.provider.refresh_cache() {
                warn!(provider = %entry.name, error = %e, "cache refresh failed");
            }
        }
        Ok(())
    }

    /// Broadcast to every child unconditionally; a failing child is logged
    /// and does not stop the broadcast.
    fn add_to_cache(&self, names: &[String]) -> Result<(), ProviderError> {
        let chain = self.chain.read().map_err(|_| ProviderError::LockPoisoned)?;
        for entry in &chain.entries {
            if let Err(e) = entry.provider.add_to_cache(names) {
                warn!(provider = %entry.name, error = %e, "cache add failed");
            }
        }
        Ok(())
    }
}
