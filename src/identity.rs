// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Caller identity.
//!
//! The source system smuggles "anonymous" through a NUL-character sentinel
//! inside an otherwise plain user-id string. We model it as a sum type instead
//! and translate at the one boundary that needs the raw string (the
//! `X-Username` response header).

use std::fmt;

/// A caller, as resolved by the [`crate::auth::AuthRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No user was identified, or the caller is explicitly anonymous.
    Anonymous,
    /// An identified user, with the groups their authenticator reported.
    User { user: String, groups: Vec<String> },
}

impl Identity {
    /// Build an identity from a raw (user, groups) pair, collapsing the
    /// empty-string / NUL-character sentinels used by some Authenticators
    /// into [`Identity::Anonymous`].
    pub fn from_raw(user: impl Into<String>, groups: Vec<String>) -> Self {
        let user = user.into();
        if user.is_empty() || user == "\0" {
            Identity::Anonymous
        } else {
            Identity::User { user, groups }
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Identity::Anonymous => "",
            Identity::User { user, .. } => user,
        }
    }

    pub fn groups(&self) -> &[String] {
        match self {
            Identity::Anonymous => &[],
            Identity::User { groups, .. } => groups,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_nul_collapse_to_anonymous() {
        assert_eq!(Identity::from_raw("", vec![]), Identity::Anonymous);
        assert_eq!(Identity::from_raw("\0", vec!["g".into()]), Identity::Anonymous);
    }

    #[test]
    fn non_empty_user_is_identified() {
        let id = Identity::from_raw("alice", vec!["g".into()]);
        assert_eq!(id.user(), "alice");
        assert_eq!(id.groups(), &["g".to_string()]);
        assert!(!id.is_anonymous());
    }
}
