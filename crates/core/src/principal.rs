//! Structured Kerberos-style principal names.
//!
//! A principal has the form `primary[/instance]@realm`, e.g. `hdfs@EXAMPLE.COM`
//! or `hdfs/namenode.example.com@EXAMPLE.COM`. [`Principal`] splits a raw
//! string into its components; `Display` recombines them so that parsing and
//! reserializing always round-trips.

use std::fmt;
use std::str::FromStr;

use crate::errors::PrincipalError;

/// A parsed security principal.
///
/// Immutable once constructed. The primary and optional instance never
/// contain `/` or `@`; the realm is everything after the first `@` and may
/// contain any character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    primary: String,
    instance: Option<String>,
    realm: String,
}

impl Principal {
    /// Parse a raw principal string.
    ///
    /// Fails with [`PrincipalError::BadFormat`] unless the input matches
    /// `primary[/instance]@realm` with a non-empty primary, realm, and (if
    /// present) instance.
    pub fn parse(raw: &str) -> Result<Self, PrincipalError> {
        let bad = |detail: &str| PrincipalError::BadFormat {
            text: raw.to_string(),
            detail: detail.to_string(),
        };

        // The primary and instance cannot contain '@', so the first '@'
        // always delimits the realm.
        let (name_part, realm) = raw.split_once('@').ok_or_else(|| bad("missing '@'"))?;
        if realm.is_empty() {
            return Err(bad("empty realm"));
        }

        let mut components = name_part.split('/');
        let primary = components.next().unwrap_or_default();
        let instance = components.next();
        if components.next().is_some() {
            return Err(bad("more than two components before '@'"));
        }
        if primary.is_empty() {
            return Err(bad("empty primary component"));
        }
        if let Some(inst) = instance {
            if inst.is_empty() {
                return Err(bad("empty instance component"));
            }
        }

        Ok(Self {
            primary: primary.to_string(),
            instance: instance.map(str::to_string),
            realm: realm.to_string(),
        })
    }

    /// The primary (first) component.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The optional instance qualifier (host, role, ...).
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// The trust-domain suffix.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Number of components before the realm (1 or 2).
    pub fn component_count(&self) -> usize {
        if self.instance.is_some() {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}/{}@{}", self.primary, instance, self.realm),
            None => write!(f, "{}@{}", self.primary, self.realm),
        }
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let p = Principal::parse("omalley@APACHE.ORG").unwrap();
        assert_eq!(p.primary(), "omalley");
        assert_eq!(p.instance(), None);
        assert_eq!(p.realm(), "APACHE.ORG");
        assert_eq!(p.component_count(), 1);
    }

    #[test]
    fn test_parse_with_instance() {
        let p = Principal::parse("hdfs/namenode.example.com@EXAMPLE.COM").unwrap();
        assert_eq!(p.primary(), "hdfs");
        assert_eq!(p.instance(), Some("namenode.example.com"));
        assert_eq!(p.realm(), "EXAMPLE.COM");
        assert_eq!(p.component_count(), 2);
    }

    #[test]
    fn test_round_trip() {
        for raw in [
            "omalley@APACHE.ORG",
            "hdfs/host1@EXAMPLE.COM",
            "cluster1hdfs/host@AD.COM",
            "a@b",
            "user@odd@realm",
        ] {
            let p = Principal::parse(raw).unwrap();
            assert_eq!(p.to_string(), raw);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "",
            "norealm",
            "user@",
            "@REALM",
            "a/b/c@REALM",
            "/host@REALM",
            "user/@REALM",
        ] {
            assert!(
                matches!(
                    Principal::parse(raw),
                    Err(PrincipalError::BadFormat { .. })
                ),
                "expected parse failure for {raw:?}"
            );
        }
    }

    #[test]
    fn test_from_str() {
        let p: Principal = "joe@FOO.COM".parse().unwrap();
        assert_eq!(p.primary(), "joe");
    }
}
