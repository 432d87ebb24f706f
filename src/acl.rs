// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rule-based access-control evaluator.
//!
//! An [`Acl`] is an ordered list of [`RuleSet`]s. A RuleSet applies to a request
//! iff every one of its [`Rule`]s matches; applicable RuleSets contribute their
//! `allow`/`deny` principal lists to a single resolution pass (§4.1 of the
//! design document). Resolution order is user-before-group,
//! deny-before-allow-within-scope, with `@_anonymous`/`@_authenticated`
//! pseudo-groups layered on top of the caller-supplied group list.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::Identity;

/// Pseudo-group every non-anonymous caller belongs to.
pub const GROUP_AUTHENTICATED: &str = "@_authenticated";
/// Pseudo-group the sole member of which is an anonymous caller.
pub const GROUP_ANONYMOUS: &str = "@_anonymous";

/// A single matcher configured on a [`Rule`].
#[derive(Debug, Clone)]
enum Matcher {
    Present(bool),
    Equals(String),
    Regex(Regex),
}

/// One predicate over a request's (lower-cased) header map.
#[derive(Debug, Clone)]
pub struct Rule {
    field: String,
    invert: bool,
    matcher: Matcher,
}

impl Rule {
    /// Does this rule match the given lower-cased header map?
    ///
    /// `invert` flips the final boolean for the `Equals`/`Regex` matchers only;
    /// for `Present` the four combinations of invert × expected-presence are
    /// spelled out explicitly per spec §4.1.
    fn matches(&self, headers: &HashMap<String, String>) -> bool {
        let value = headers.get(&self.field);

        match &self.matcher {
            Matcher::Present(expect_present) => {
                let is_present = value.is_some();
                match (self.invert, *expect_present) {
                    (false, true) => is_present,
                    (false, false) => !is_present,
                    (true, true) => !is_present,
                    (true, false) => is_present,
                }
            }
            Matcher::Equals(expected) => match value {
                None => false,
                Some(v) => (v == expected) != self.invert,
            },
            Matcher::Regex(re) => match value {
                None => false,
                Some(v) => re.is_match(v) != self.invert,
            },
        }
    }
}

/// Raw, serde-facing shape of a [`Rule`], as read from configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuleConfig {
    pub field: String,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub present: Option<bool>,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub regexp: Option<String>,
}

impl RuleConfig {
    fn build(&self, rule_set: usize, rule: usize) -> Result<Rule, ConfigError> {
        if self.field.is_empty() {
            return Err(ConfigError::InvalidRule {
                rule_set,
                rule,
                reason: "field is empty".into(),
            });
        }

        let configured = [
            self.present.is_some(),
            self.equals.is_some(),
            self.regexp.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count();

        if configured != 1 {
            return Err(ConfigError::InvalidRule {
                rule_set,
                rule,
                reason: "exactly one of present, equals, regexp must be set".into(),
            });
        }

        let matcher = if let Some(present) = self.present {
            Matcher::Present(present)
        } else if let Some(equals) = &self.equals {
            Matcher::Equals(equals.clone())
        } else {
            let pattern = self.regexp.as_ref().unwrap();
            let re = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                rule_set,
                rule,
                source,
            })?;
            Matcher::Regex(re)
        };

        Ok(Rule {
            field: self.field.to_lowercase(),
            invert: self.invert,
            matcher,
        })
    }
}

/// A group of rules acting as a single predicate, plus the allow/deny lists
/// that take effect when that predicate holds.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    allow: Vec<String>,
    deny: Vec<String>,
}

/// Raw, serde-facing shape of a [`RuleSet`].
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Collapse any number of leading `@` characters to exactly one.
fn canonicalize(principal: &str) -> String {
    if let Some(rest) = principal.strip_prefix('@') {
        format!("@{}", rest.trim_start_matches('@'))
    } else {
        principal.to_string()
    }
}

impl RuleSetConfig {
    fn build(&self, index: usize) -> Result<RuleSet, ConfigError> {
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| r.build(index, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleSet {
            rules,
            allow: self.allow.iter().map(|p| canonicalize(p)).collect(),
            deny: self.deny.iter().map(|p| canonicalize(p)).collect(),
        })
    }
}

impl RuleSet {
    /// A RuleSet applies iff every one of its rules matches the request.
    fn applies(&self, headers: &HashMap<String, String>) -> bool {
        self.rules.iter().all(|r| r.matches(headers))
    }
}

/// The access-control engine: an ordered list of [`RuleSet`]s.
///
/// An ACL with zero rule-sets denies every request (default deny).
#[derive(Debug, Clone, Default)]
pub struct Acl {
    rule_sets: Vec<RuleSet>,
}

/// Raw, serde-facing shape of an [`Acl`], as read from the `acl` config branch.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AclConfig {
    #[serde(default)]
    pub rule_sets: Vec<RuleSetConfig>,
}

impl AclConfig {
    /// Validate and build the runtime [`Acl`]. Fails with a structured error
    /// naming the offending rule-set/rule index; this happens only at
    /// configuration time, never per-request.
    pub fn build(&self) -> Result<Acl, ConfigError> {
        let rule_sets = self
            .rule_sets
            .iter()
            .enumerate()
            .map(|(i, rs)| rs.build(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Acl { rule_sets })
    }
}

impl Acl {
    /// `hasAccess(user, groups, request) → bool`, per spec §4.1.
    pub fn has_access(&self, identity: &Identity, headers: &HashMap<String, String>) -> bool {
        let lower_headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        let mut allow: HashSet<String> = HashSet::new();
        let mut deny: HashSet<String> = HashSet::new();

        for rule_set in &self.rule_sets {
            if rule_set.applies(&lower_headers) {
                allow.extend(rule_set.allow.iter().cloned());
                deny.extend(rule_set.deny.iter().cloned());
            }
        }

        let (user, effective_groups) = match identity {
            Identity::Anonymous => ("", vec![GROUP_ANONYMOUS.to_string()]),
            Identity::User { user, groups } => {
                let mut g: Vec<String> = groups.iter().map(|g| canonicalize(g)).collect();
                g.push(GROUP_AUTHENTICATED.to_string());
                (user.as_str(), g)
            }
        };

        if deny.contains(user) {
            return false;
        }
        if allow.contains(user) {
            return true;
        }

        for group in &effective_groups {
            if deny.contains(group) {
                return false;
            }
            if allow.contains(group) {
                return true;
            }
        }

        if !deny.contains(GROUP_ANONYMOUS) && allow.contains(GROUP_ANONYMOUS) {
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_acl_denies() {
        let acl = AclConfig::default().build().unwrap();
        let id = Identity::from_raw("test", vec!["g".into()]);
        assert!(!acl.has_access(&id, &headers(&[])));
    }

    #[test]
    fn authenticated_group_allow() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    equals: Some("expected".into()),
                    ..Default::default()
                }],
                allow: vec![GROUP_AUTHENTICATED.to_string()],
                deny: vec![],
            }],
        };
        let acl = cfg.build().unwrap();

        let id = Identity::from_raw("test", vec![]);
        assert!(acl.has_access(&id, &headers(&[("field_a", "expected")])));

        let anon = Identity::from_raw("", vec![]);
        assert!(!acl.has_access(&anon, &headers(&[("field_a", "expected")])));
    }

    #[test]
    fn anonymous_explicit_deny_overrides_allow() {
        let cfg = AclConfig {
            rule_sets: vec![
                RuleSetConfig {
                    rules: vec![RuleConfig {
                        field: "field_a".into(),
                        present: Some(true),
                        ..Default::default()
                    }],
                    allow: vec![GROUP_ANONYMOUS.to_string()],
                    deny: vec![],
                },
                RuleSetConfig {
                    rules: vec![RuleConfig {
                        field: "field_b".into(),
                        present: Some(true),
                        ..Default::default()
                    }],
                    allow: vec!["somerandomuser".to_string()],
                    deny: vec![GROUP_ANONYMOUS.to_string()],
                },
            ],
        };
        let acl = cfg.build().unwrap();
        let id = Identity::from_raw("test", vec!["g_a".into(), "g_b".into()]);

        assert!(!acl.has_access(&id, &headers(&[("field_a", "x"), ("field_b", "y")])));
        assert!(acl.has_access(&id, &headers(&[("field_a", "x")])));
        assert!(!acl.has_access(&id, &headers(&[("field_b", "y")])));
    }

    #[test]
    fn inverted_regex_rule() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    invert: true,
                    regexp: Some("^expected$".into()),
                    ..Default::default()
                }],
                allow: vec![GROUP_AUTHENTICATED.to_string()],
                deny: vec![],
            }],
        };
        let acl = cfg.build().unwrap();
        let id = Identity::from_raw("test", vec![]);

        // Rule does not apply (header matches the regex the rule excludes).
        assert!(!acl.has_access(&id, &headers(&[("field_a", "expected")])));
        // Rule applies (header does not match), RuleSet contributes its allow.
        assert!(acl.has_access(&id, &headers(&[("field_a", "unexpected")])));
    }

    #[test]
    fn group_token_canonicalization() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    present: Some(true),
                    ..Default::default()
                }],
                allow: vec!["@@somegroup".to_string()],
                deny: vec![],
            }],
        };
        let acl = cfg.build().unwrap();
        let id = Identity::from_raw("test", vec!["somegroup".into()]);
        assert!(acl.has_access(&id, &headers(&[("field_a", "x")])));
    }

    #[test]
    fn rule_with_no_matcher_is_invalid() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    ..Default::default()
                }],
                allow: vec![],
                deny: vec![],
            }],
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn last_chance_anonymous_allow_admits_unmatched_group() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    present: Some(true),
                    ..Default::default()
                }],
                allow: vec![GROUP_ANONYMOUS.to_string()],
                deny: vec![],
            }],
        };
        let acl = cfg.build().unwrap();
        // Authenticated caller, whose group is listed in neither allow nor
        // deny; @_anonymous is allowed and not denied, so the "last chance"
        // clause (4d) admits them even though they are not anonymous.
        let id = Identity::from_raw("test", vec!["unrelated_group".into()]);
        assert!(acl.has_access(&id, &headers(&[("field_a", "x")])));
    }

    #[test]
    fn deterministic() {
        let cfg = AclConfig {
            rule_sets: vec![RuleSetConfig {
                rules: vec![RuleConfig {
                    field: "field_a".into(),
                    equals: Some("x".into()),
                    ..Default::default()
                }],
                allow: vec![GROUP_AUTHENTICATED.to_string()],
                deny: vec![],
            }],
        };
        let acl = cfg.build().unwrap();
        let id = Identity::from_raw("test", vec![]);
        let h = headers(&[("field_a", "x")]);
        assert_eq!(acl.has_access(&id, &h), acl.has_access(&id, &h));
    }
}
