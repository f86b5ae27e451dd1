use crate::models::RouteRequirement;
use serde::Serialize;

/// How a page is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum RouteAccess {
    /// Reachable without a session (login, registration).
    Public,
    /// Requires a session; checked by the access gate.
    Guarded(RouteRequirement),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub access: RouteAccess,
}

const fn public(name: &'static str) -> RouteSpec {
    RouteSpec {
        name,
        access: RouteAccess::Public,
    }
}

const fn guarded(name: &'static str, requirement: RouteRequirement) -> RouteSpec {
    RouteSpec {
        name,
        access: RouteAccess::Guarded(requirement),
    }
}

/// Every page of the banking app and its requirements.
pub const ROUTES: &[RouteSpec] = &[
    public("login"),
    public("register"),
    // Landing pages for accounts that are not active yet
    guarded("pending-approval", RouteRequirement::SESSION_ONLY),
    guarded("rejected-account", RouteRequirement::SESSION_ONLY),
    guarded("profile", RouteRequirement::SESSION_ONLY),
    guarded("dashboard", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("pix", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("ted", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("bill-payment", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("statement", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("cards", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("gift-cards", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("crypto", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("financing-simulation", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("financing-proposal", RouteRequirement::ACTIVE_ACCOUNT),
    guarded("admin", RouteRequirement::ADMIN_ONLY),
    guarded("admin-users", RouteRequirement::ADMIN_ONLY),
    guarded("admin-approvals", RouteRequirement::ADMIN_ONLY),
];

/// Looks up a route by name.
pub fn find(name: &str) -> Option<&'static RouteSpec> {
    ROUTES.iter().find(|route| route.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_route_names_are_unique() {
        let names: HashSet<_> = ROUTES.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), ROUTES.len());
    }

    #[test]
    fn test_status_pages_do_not_require_active_account() {
        // Otherwise a pending user would be redirected to the page they are sent to
        for name in ["pending-approval", "rejected-account"] {
            let route = find(name).unwrap();
            assert_eq!(
                route.access,
                RouteAccess::Guarded(RouteRequirement::SESSION_ONLY)
            );
        }
    }

    #[test]
    fn test_admin_pages_are_admin_only() {
        for route in ROUTES.iter().filter(|r| r.name.starts_with("admin")) {
            match route.access {
                RouteAccess::Guarded(req) => assert!(req.admin_only, "{}", route.name),
                RouteAccess::Public => panic!("{} must not be public", route.name),
            }
        }
    }

    #[test]
    fn test_unknown_route() {
        assert!(find("wallet-export").is_none());
    }
}
