//! Resolved per-request authorization context.
//!
//! The host resolves credentials into something implementing [`Session`] and
//! passes it explicitly into every [`FleetService`][crate::FleetService]
//! call.  The kernel only ever asks the two questions on the trait and keeps
//! no answers between calls.

use std::collections::BTreeSet;

/// Identity and role set of the caller, as seen by the capability gate.
pub trait Session {
    /// The authenticated user, or `None` for an anonymous caller.
    fn user(&self) -> Option<&str>;

    fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    fn has_role(&self, role: &str) -> bool;
}

/// Plain-value [`Session`] for hosts that resolve credentials up front.
///
/// # Example
///
/// ```
/// use fleet_kernel::{ResolvedSession, Session};
///
/// let session = ResolvedSession::authenticated("ops-1", ["operator"]);
/// assert!(session.is_authenticated());
/// assert!(session.has_role("operator"));
/// assert!(!ResolvedSession::anonymous().is_authenticated());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSession {
    user: Option<String>,
    roles: BTreeSet<String>,
}

impl ResolvedSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated<I, R>(user: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            user: Some(user.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }
}

impl Session for ResolvedSession {
    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Anonymous sessions hold no roles, whatever they were built with.
    fn has_role(&self, role: &str) -> bool {
        self.user.is_some() && self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_identity_or_roles() {
        let s = ResolvedSession::anonymous();
        assert!(!s.is_authenticated());
        assert_eq!(s.user(), None);
        assert!(!s.has_role("viewer"));
    }

    #[test]
    fn authenticated_reports_roles() {
        let s = ResolvedSession::authenticated("alice", vec!["viewer".to_string(), "admin".to_string()]);
        assert_eq!(s.user(), Some("alice"));
        assert!(s.has_role("admin"));
        assert!(!s.has_role("operator"));
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["admin", "viewer"]);
    }
}
