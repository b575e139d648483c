//! Access decisions for pages, read straight from the cached session.

use payloads::Role;

use crate::auth::SessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Login and registration pages; signed-in users are sent home.
    GuestOnly,
    Authenticated,
    Role(Role),
    /// Moderators and admins.
    Elevated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectHome,
    Forbidden,
}

/// Signed-out users hitting a protected page go to the login page. Signed-in
/// users without the right role are forbidden, including when no user
/// record is cached.
pub fn check_access(session: &SessionManager, access: Access) -> GuardDecision {
    let authenticated = session.is_authenticated();
    match access {
        Access::Public => GuardDecision::Allow,
        Access::GuestOnly if authenticated => GuardDecision::RedirectHome,
        Access::GuestOnly => GuardDecision::Allow,
        _ if !authenticated => GuardDecision::RedirectToLogin,
        Access::Authenticated => GuardDecision::Allow,
        Access::Role(role) => allow_if(session.has_role(role)),
        Access::Elevated => allow_if(
            session
                .current_user()
                .is_some_and(|user| user.role.is_elevated()),
        ),
    }
}

fn allow_if(allowed: bool) -> GuardDecision {
    if allowed {
        GuardDecision::Allow
    } else {
        GuardDecision::Forbidden
    }
}
