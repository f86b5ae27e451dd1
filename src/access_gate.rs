//! Pure access decision for an account against a route.

use crate::models::{AccessDecision, Account, AccountStatus, RedirectTarget, RouteRequirement};

/// Decides whether a navigation may proceed.
///
/// Admin-only routes send every non-elevated caller to login, including
/// authenticated ones. Elevated accounts skip the status check.
pub fn evaluate(account: Option<&Account>, requirement: RouteRequirement) -> AccessDecision {
    let Some(account) = account else {
        return AccessDecision::redirect(RedirectTarget::Login);
    };

    let elevated = account.is_elevated();

    if requirement.admin_only {
        return if elevated {
            AccessDecision::Allow
        } else {
            AccessDecision::redirect(RedirectTarget::Login)
        };
    }

    if requirement.requires_active_account && !elevated {
        return match account.status {
            AccountStatus::Active => AccessDecision::Allow,
            AccountStatus::Rejected => AccessDecision::redirect(RedirectTarget::RejectedAccount),
            AccountStatus::Pending | AccountStatus::Unrecognized => {
                AccessDecision::redirect(RedirectTarget::PendingApproval)
            }
        };
    }

    AccessDecision::Allow
}
