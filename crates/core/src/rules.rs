//! Rule-driven translation of principals into local user names.
//!
//! Rules use the classic auth-to-local syntax. A rule string is a
//! whitespace-separated sequence of rules, each either:
//!
//! - `DEFAULT` -- if the principal's realm equals the configured default
//!   realm, the short name is the primary component; or
//! - `RULE:[n:fmt](regex)s/pattern/replacement/g` -- applies to principals
//!   with `n` non-realm components. `fmt` builds a candidate string with
//!   `$0` = realm, `$1` = primary, `$2` = instance. If the optional `regex`
//!   is present it must match the candidate in full. The optional sed-style
//!   substitution then rewrites the candidate, once or globally with `g`.
//!   A trailing `/L` lowercases the result.
//!
//! Rules are applied in order; the first rule that produces a name wins.
//!
//! A process-wide rule set backs [`translate`]. [`set_rules`] replaces it
//! unconditionally; [`set_rules_if_unset`] is the init-once path used by
//! global configuration and does nothing when rules are already loaded.

use std::sync::{Arc, LazyLock, RwLock};

use regex_lite::Regex;
use tracing::{debug, info};

use crate::errors::RuleError;
use crate::principal::Principal;

// ---------------------------------------------------------------------------
// Rule representation
// ---------------------------------------------------------------------------

/// A single parsed translation rule.
#[derive(Debug, Clone)]
enum Rule {
    /// The `DEFAULT` rule: strip the realm when it is the default realm.
    Default,
    /// A `RULE:[n:fmt](regex)s/pattern/replacement/g` rule.
    Pattern {
        num_components: usize,
        format: String,
        matcher: Option<Regex>,
        substitution: Option<Substitution>,
        lowercase: bool,
    },
}

/// The sed-style `s/pattern/replacement/` part of a rule.
#[derive(Debug, Clone)]
struct Substitution {
    from: Regex,
    to: String,
    global: bool,
}

impl Rule {
    /// Apply this rule to a principal, returning the short name if the rule
    /// matches.
    fn apply(&self, principal: &Principal, default_realm: Option<&str>) -> Option<String> {
        match self {
            Rule::Default => match default_realm {
                Some(realm) if realm == principal.realm() => {
                    Some(principal.primary().to_string())
                }
                _ => None,
            },
            Rule::Pattern {
                num_components,
                format,
                matcher,
                substitution,
                lowercase,
            } => {
                if principal.component_count() != *num_components {
                    return None;
                }
                let base = expand_format(format, principal);
                if let Some(re) = matcher {
                    if !re.is_match(&base) {
                        return None;
                    }
                }
                let mut result = match substitution {
                    Some(sub) if sub.global => {
                        sub.from.replace_all(&base, sub.to.as_str()).into_owned()
                    }
                    Some(sub) => sub.from.replace(&base, sub.to.as_str()).into_owned(),
                    None => base,
                };
                if *lowercase {
                    result = result.to_lowercase();
                }
                Some(result)
            }
        }
    }
}

/// Substitute `$0` (realm), `$1` (primary), and `$2` (instance) in a rule
/// format string.
fn expand_format(format: &str, principal: &Principal) -> String {
    let mut out = format.replace("$0", principal.realm());
    out = out.replace("$1", principal.primary());
    if let Some(instance) = principal.instance() {
        out = out.replace("$2", instance);
    }
    out
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// An ordered, immutable set of translation rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default_realm: Option<String>,
}

impl RuleSet {
    /// Parse a whitespace-separated rule string.
    ///
    /// The default realm is consulted only by `DEFAULT` rules; passing `None`
    /// makes `DEFAULT` match nothing.
    pub fn parse(spec: &str, default_realm: Option<&str>) -> Result<Self, RuleError> {
        let mut rules = Vec::new();

        for token in spec.split_whitespace() {
            if token == "DEFAULT" {
                rules.push(Rule::Default);
                continue;
            }
            let caps = RULE_SYNTAX.captures(token).ok_or_else(|| RuleError::InvalidRule {
                fragment: token.to_string(),
                detail: "expected DEFAULT or RULE:[n:fmt](regex)s/pattern/replacement/".into(),
            })?;

            let num_components: usize =
                caps[1].parse().map_err(|_| RuleError::InvalidRule {
                    fragment: token.to_string(),
                    detail: "component count is not a number".into(),
                })?;
            let format = caps[2].to_string();

            let matcher = match caps.get(3) {
                // Full-match semantics: the regex must cover the whole
                // formatted candidate, not just a substring of it.
                Some(m) => Some(compile(token, &format!("^(?:{})$", m.as_str()))?),
                None => None,
            };

            let substitution = match (caps.get(4), caps.get(5)) {
                (Some(from), Some(to)) => Some(Substitution {
                    from: compile(token, from.as_str())?,
                    to: to.as_str().to_string(),
                    global: caps.get(6).is_some(),
                }),
                _ => None,
            };

            rules.push(Rule::Pattern {
                num_components,
                format,
                matcher,
                substitution,
                lowercase: caps.get(7).is_some(),
            });
        }

        debug!(count = rules.len(), "parsed translation rules");
        Ok(Self {
            rules,
            default_realm: default_realm.map(str::to_string),
        })
    }

    /// Translate a principal into a local name, first matching rule wins.
    pub fn apply(&self, principal: &Principal) -> Result<String, RuleError> {
        for rule in &self.rules {
            if let Some(name) = rule.apply(principal, self.default_realm.as_deref()) {
                return Ok(name);
            }
        }
        Err(RuleError::NoMatchingRule(principal.to_string()))
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set contains no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Anchored syntax for one `RULE:` token.
static RULE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^RULE:\[(\d+):([^\]]*)\](?:\(([^)]*)\))?(?:s/([^/]*)/([^/]*)/(g)?)?(/L)?$")
        .expect("rule syntax regex is valid")
});

fn compile(token: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|e| RuleError::InvalidRule {
        fragment: token.to_string(),
        detail: format!("bad regex: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Process-wide rule state
// ---------------------------------------------------------------------------

static GLOBAL_RULES: RwLock<Option<Arc<RuleSet>>> = RwLock::new(None);

/// Load a rule set into the process-wide slot, replacing any previous set.
///
/// This is the explicit "force reload" path; configuration code should go
/// through [`set_rules_if_unset`] instead.
pub fn set_rules(spec: &str, default_realm: Option<&str>) -> Result<(), RuleError> {
    let rules = RuleSet::parse(spec, default_realm)?;
    info!(rules = rules.len(), "loading translation rules");
    // A poisoned lock only means a writer panicked; the slot is still valid.
    let mut slot = GLOBAL_RULES.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(Arc::new(rules));
    Ok(())
}

/// Load a rule set only if none has been loaded yet.
///
/// Returns `true` if the rules were loaded by this call, `false` if a set
/// was already present (in which case the new spec is ignored -- callers
/// that intend to change rules must use [`set_rules`]).
pub fn set_rules_if_unset(spec: &str, default_realm: Option<&str>) -> Result<bool, RuleError> {
    {
        let slot = GLOBAL_RULES.read().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("translation rules already set, keeping existing rules");
            return Ok(false);
        }
    }
    set_rules(spec, default_realm)?;
    Ok(true)
}

/// Whether a process-wide rule set has been loaded.
pub fn rules_are_set() -> bool {
    GLOBAL_RULES
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .is_some()
}

/// Drop the process-wide rule set. Intended for tests.
pub fn clear_rules() {
    let mut slot = GLOBAL_RULES.write().unwrap_or_else(|e| e.into_inner());
    *slot = None;
}

/// Translate a principal using the process-wide rule set.
pub fn translate(principal: &Principal) -> Result<String, RuleError> {
    let rules = {
        let slot = GLOBAL_RULES.read().unwrap_or_else(|e| e.into_inner());
        slot.clone().ok_or(RuleError::NotInitialized)?
    };
    rules.apply(principal)
}
