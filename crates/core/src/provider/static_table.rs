//! A name-mapping provider backed by a fixed principal table.
//!
//! Entries come from an inline `entries` table in the provider's
//! configuration, from a TOML file named by `path`, or both. The file format:
//!
//! ```toml
//! [principals]
//! "nobody@AD.COM" = "joe"
//! "cluster1hdfs/host@AD.COM" = "hdfs"
//! ```
//!
//! `refresh_cache` re-reads the file; file entries override inline entries
//! on conflicting principals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::errors::{ConfigError, ProviderError};
use crate::provider::NameMappingProvider;

/// On-disk table file structure.
#[derive(Debug, Default, Deserialize)]
struct TableFile {
    /// The `[principals]` table mapping full principal text -> short name.
    #[serde(default)]
    principals: HashMap<String, String>,
}

/// A provider answering from an in-memory principal -> short name table.
pub struct StaticNameMapper {
    /// Entries declared inline in the provider configuration.
    inline: HashMap<String, String>,
    /// Optional backing file re-read on `refresh_cache`.
    path: Option<PathBuf>,
    /// Merged lookup table (inline entries overlaid by file entries).
    table: RwLock<HashMap<String, String>>,
}

impl StaticNameMapper {
    /// Build from scoped configuration: an optional `entries` inline table
    /// and an optional `path` to a TOML table file.
    ///
    /// A missing file is tolerated with a warning (it may appear before the
    /// next `refresh_cache`); an unreadable or malformed file is a
    /// configuration error.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let inline = match config.get("entries") {
            Some(value) => {
                let table = value.as_table().ok_or_else(|| ConfigError::InvalidValue {
                    field: "entries".into(),
                    detail: "expected a table of principal = short-name pairs".into(),
                })?;
                table
                    .iter()
                    .map(|(principal, short)| {
                        short
                            .as_str()
                            .map(|s| (principal.clone(), s.to_string()))
                            .ok_or_else(|| ConfigError::InvalidValue {
                                field: format!("entries.{principal}"),
                                detail: "short name must be a string".into(),
                            })
                    })
                    .collect::<Result<HashMap<_, _>, _>>()?
            }
            None => HashMap::new(),
        };

        let path = config.get_str("path").map(PathBuf::from);
        let mut table = inline.clone();
        if let Some(ref path) = path {
            if path.exists() {
                let from_file = load_table_file(path).map_err(|e| ConfigError::InvalidValue {
                    field: "path".into(),
                    detail: e.to_string(),
                })?;
                table.extend(from_file);
            } else {
                warn!(path = %path.display(), "principal table file not found, starting empty");
            }
        }

        debug!(entries = table.len(), "static name mapper ready");
        Ok(Self {
            inline,
            path,
            table: RwLock::new(table),
        })
    }
}

/// Read and parse a principal table file.
fn load_table_file(path: &Path) -> Result<HashMap<String, String>, ProviderError> {
    let contents = std::fs::read_to_string(path)?;
    let file: TableFile = toml::from_str(&contents)
        .map_err(|e| ProviderError::Backend(format!("bad principal table file: {e}")))?;
    debug!(path = %path.display(), entries = file.principals.len(), "loaded principal table");
    Ok(file.principals)
}

impl NameMappingProvider for StaticNameMapper {
    fn resolve(&self, principal: &str) -> Result<Option<String>, ProviderError> {
        let table = self.table.read().map_err(|_| ProviderError::LockPoisoned)?;
        Ok(table.get(principal).cloned())
    }

    /// Re-read the backing file, if any. Unlike at build time, a missing
    /// file here is an infrastructure error: the provider was told its table
    /// should be refreshable.
    fn refresh_cache(&self) -> Result<(), ProviderError> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };
        let from_file = load_table_file(path)?;
        let mut merged = self.inline.clone();
        merged.extend(from_file);

        let mut table = self.table.write().map_err(|_| ProviderError::LockPoisoned)?;
        *table = merged;
        debug!(entries = table.len(), "principal table refreshed");
        Ok(())
    }

    // add_to_cache keeps the default no-op: the whole table is resident.
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_path(path: &Path) -> ProviderConfig {
        let mut config = ProviderConfig::new();
        config.insert("path", path.display().to_string());
        config
    }

    #[test]
    fn test_inline_entries() {
        let config: ProviderConfig = toml::from_str(
            r#"
[entries]
"nobody@AD.COM" = "joe"
"#,
        )
        .unwrap();
        let mapper = StaticNameMapper::from_config(&config).unwrap();
        assert_eq!(
            mapper.resolve("nobody@AD.COM").unwrap(),
            Some("joe".to_string())
        );
        assert_eq!(mapper.resolve("nobody@OTHER.COM").unwrap(), None);
    }

    #[test]
    fn test_file_entries_and_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("principals.toml");
        std::fs::write(
            &path,
            r#"
[principals]
"hdfs/host@AD.COM" = "hdfs"
"#,
        )
        .unwrap();

        let mapper = StaticNameMapper::from_config(&config_with_path(&path)).unwrap();
        assert_eq!(
            mapper.resolve("hdfs/host@AD.COM").unwrap(),
            Some("hdfs".to_string())
        );
        assert_eq!(mapper.resolve("late@AD.COM").unwrap(), None);

        std::fs::write(
            &path,
            r#"
[principals]
"hdfs/host@AD.COM" = "hdfs"
"late@AD.COM" = "late"
"#,
        )
        .unwrap();

        mapper.refresh_cache().unwrap();
        assert_eq!(
            mapper.resolve("late@AD.COM").unwrap(),
            Some("late".to_string())
        );
    }

    #[test]
    fn test_file_overrides_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("principals.toml");
        std::fs::write(
            &path,
            r#"
[principals]
"both@R" = "from-file"
"#,
        )
        .unwrap();

        let mut config = config_with_path(&path);
        let mut entries = toml::value::Table::new();
        entries.insert("both@R".into(), "from-inline".into());
        entries.insert("only@R".into(), "inline".into());
        config.insert("entries", toml::Value::Table(entries));

        let mapper = StaticNameMapper::from_config(&config).unwrap();
        assert_eq!(
            mapper.resolve("both@R").unwrap(),
            Some("from-file".to_string())
        );
        assert_eq!(
            mapper.resolve("only@R").unwrap(),
            Some("inline".to_string())
        );
    }

    #[test]
    fn test_missing_file_tolerated_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-yet.toml");

        let mapper = StaticNameMapper::from_config(&config_with_path(&path)).unwrap();
        assert_eq!(mapper.resolve("x@R").unwrap(), None);

        // But refresh against a still-missing file is an infrastructure error.
        assert!(matches!(
            mapper.refresh_cache(),
            Err(ProviderError::IoError(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "principals = 7").unwrap();

        assert!(matches!(
            StaticNameMapper::from_config(&config_with_path(&path)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bad_inline_entries() {
        let config: ProviderConfig = toml::from_str(
            r#"
[entries]
"x@R" = 12
"#,
        )
        .unwrap();
        assert!(matches!(
            StaticNameMapper::from_config(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_add_to_cache_is_noop() {
        let mapper = StaticNameMapper::from_config(&ProviderConfig::new()).unwrap();
        mapper.add_to_cache(&["x@R".to_string()]).unwrap();
    }
}
