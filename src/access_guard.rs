//! Fetch-then-evaluate access check against the identity provider.
//!
//! The guard never fails: every provider error, missing session or failed
//! provisioning resolves to a login redirect. A sign-out event for the
//! account wins over any decision still in flight.

use crate::access_gate;
use crate::errors::{AccountProvisioningError, SessionLookupError};
use crate::identity_client::IdentityClient;
use crate::models::{
    AccessDecision, Account, RedirectTarget, RouteRequirement, Session, SessionEvent,
};
use crate::session_events::SessionEvents;
use moka::future::Cache;
use std::time::Duration;

/// Result of the provisioning step of the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The account record already existed.
    Existing(Account),
    /// No record existed; the default one was inserted.
    Provisioned(Account),
}

impl ProvisionOutcome {
    pub fn account(&self) -> &Account {
        match self {
            ProvisionOutcome::Existing(account) | ProvisionOutcome::Provisioned(account) => account,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EnsureAccountError {
    Lookup(SessionLookupError),
    Provisioning(AccountProvisioningError),
}

#[derive(Clone)]
pub struct AccessGuard {
    client: IdentityClient,
    accounts: Cache<String, Account>,
    events: SessionEvents,
}

impl AccessGuard {
    pub fn new(client: IdentityClient, events: SessionEvents, account_ttl: Duration) -> Self {
        let accounts = Cache::builder()
            .time_to_live(account_ttl)
            .max_capacity(10_000)
            .build();

        Self {
            client,
            accounts,
            events,
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Drops the cached record so the next check refetches it.
    pub async fn invalidate(&self, account_id: &str) {
        self.accounts.invalidate(account_id).await;
    }

    /// Applies a provider session event: notifies in-flight checks, then
    /// evicts the account. Out-of-order events change nothing.
    pub async fn apply_event(&self, event: SessionEvent) -> bool {
        let account_id = event.account_id.clone();
        if !self.events.publish(event) {
            return false;
        }
        self.invalidate(&account_id).await;
        true
    }

    /// Resolves the session for `access_token` and decides access to a route.
    pub async fn check(
        &self,
        access_token: Option<&str>,
        requirement: RouteRequirement,
    ) -> AccessDecision {
        let Some(token) = access_token.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!("No access token presented");
            return access_gate::evaluate(None, requirement);
        };

        let session = match self.client.get_session(token).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!("Access token does not resolve to a session");
                return access_gate::evaluate(None, requirement);
            }
            Err(e) => {
                tracing::warn!("Session lookup failed, redirecting to login: {}", e);
                return AccessDecision::redirect(RedirectTarget::Login);
            }
        };

        self.check_session(&session, requirement).await
    }

    /// Decides access for an already resolved session.
    ///
    /// Races the account lookup against sign-out events for the account.
    pub async fn check_session(
        &self,
        session: &Session,
        requirement: RouteRequirement,
    ) -> AccessDecision {
        // Subscribe before checking revocation so no sign-out slips between them
        let sign_outs = self.events.subscribe();
        if self.events.is_revoked(&session.id) {
            tracing::info!("Session for account {} was signed out", session.id);
            return AccessDecision::redirect(RedirectTarget::Login);
        }

        let decision = tokio::select! {
            biased;
            _ = SessionEvents::signed_out(sign_outs, &session.id) => {
                tracing::info!("Sign-out for account {} preempted access check", session.id);
                return AccessDecision::redirect(RedirectTarget::Login);
            }
            decision = self.resolve(session, requirement) => decision,
        };

        if self.events.is_revoked(&session.id) {
            return AccessDecision::redirect(RedirectTarget::Login);
        }

        decision
    }

    async fn resolve(&self, session: &Session, requirement: RouteRequirement) -> AccessDecision {
        match self.ensure_account_exists(&session.id).await {
            Ok(outcome) => {
                let decision = access_gate::evaluate(Some(outcome.account()), requirement);
                tracing::debug!(
                    "Access for account {} on {:?}: {:?}",
                    session.id,
                    requirement,
                    decision
                );
                decision
            }
            Err(EnsureAccountError::Lookup(e)) => {
                tracing::warn!(
                    "Account lookup for {} failed, redirecting to login: {}",
                    session.id,
                    e
                );
                AccessDecision::redirect(RedirectTarget::Login)
            }
            Err(EnsureAccountError::Provisioning(e)) => {
                tracing::error!("{}; redirecting to login", e);
                AccessDecision::redirect(RedirectTarget::Login)
            }
        }
    }

    /// First step of the check: fetch the account, inserting the default
    /// record when none exists. Completes before any decision is made.
    pub async fn ensure_account_exists(
        &self,
        account_id: &str,
    ) -> Result<ProvisionOutcome, EnsureAccountError> {
        if let Some(account) = self.accounts.get(account_id).await {
            return Ok(ProvisionOutcome::Existing(account));
        }

        // Events bump the generation before evicting, so a changed value means
        // the record fetched below may already be stale
        let generation = self.events.generation();
        let existing = self
            .client
            .get_account(account_id)
            .await
            .map_err(EnsureAccountError::Lookup)?;

        let outcome = match existing {
            Some(account) => ProvisionOutcome::Existing(account),
            None => {
                tracing::info!("No account record for {}, provisioning default", account_id);
                let account = Account::provisional(account_id);
                self.client
                    .insert_account(&account)
                    .await
                    .map_err(EnsureAccountError::Provisioning)?;
                ProvisionOutcome::Provisioned(account)
            }
        };

        if self.events.generation() == generation {
            self.accounts
                .insert(account_id.to_string(), outcome.account().clone())
                .await;
            if self.events.generation() != generation {
                self.accounts.invalidate(account_id).await;
            }
        } else {
            tracing::debug!(
                "Session event arrived during lookup of {}, not caching",
                account_id
            );
        }

        Ok(outcome)
    }
}
