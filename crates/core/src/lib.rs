//! principalmap core library.
//!
//! This crate resolves Kerberos-style principal names (`primary[/instance]@realm`)
//! into local operating-system user names. Resolution is two-tier: an
//! optional, configurable chain of name-mapping providers is consulted
//! first, and a rule-driven translator is always the fallback of last
//! resort.

pub mod config;
pub mod errors;
pub mod principal;
pub mod provider;
pub mod resolver;
pub mod rules;

// Re-exports for convenience.
pub use config::AppConfig;
pub use errors::CoreError;
pub use principal::Principal;
pub use provider::{CompositeNameMapper, NameMappingProvider, StaticNameMapper};
pub use resolver::PrincipalResolver;
pub use rules::RuleSet;
