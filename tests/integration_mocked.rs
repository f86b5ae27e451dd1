/// Integration tests with a mocked identity provider
/// Exercises the fetch-then-evaluate access check without a real backend
use banking_gate::access_guard::{AccessGuard, EnsureAccountError, ProvisionOutcome};
use banking_gate::errors::SessionLookupError;
use banking_gate::identity_client::IdentityClient;
use banking_gate::models::{
    AccessDecision, AccountStatus, RedirectTarget, Role, RouteRequirement, Session, SessionEvent,
    SessionEventKind,
};
use banking_gate::session_events::SessionEvents;
use chrono::Utc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-key";

/// Helper function to build a guard pointing at the mock provider
fn create_guard(provider_url: String) -> AccessGuard {
    let client = IdentityClient::new(provider_url, ANON_KEY.to_string(), Duration::from_secs(5))
        .expect("client should build");
    AccessGuard::new(client, SessionEvents::default(), Duration::from_secs(30))
}

async fn mock_session(server: &MockServer, token: &str, account_id: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", ANON_KEY))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": account_id,
            "email": "cliente@banco.com.br"
        })))
        .mount(server)
        .await;
}

async fn mock_account(server: &MockServer, account_id: &str, row: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", account_id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(row))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_active_user_is_allowed_on_dashboard() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-1", "acc-1").await;
    mock_account(
        &mock_server,
        "acc-1",
        serde_json::json!([{ "id": "acc-1", "status": "active", "role": "user", "is_admin": false }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());
    let decision = guard
        .check(Some("tok-1"), RouteRequirement::ACTIVE_ACCOUNT)
        .await;

    assert_eq!(decision, AccessDecision::Allow);
}

#[tokio::test]
async fn test_pending_and_rejected_users_are_redirected() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-p", "acc-p").await;
    mock_session(&mock_server, "tok-r", "acc-r").await;
    mock_account(
        &mock_server,
        "acc-p",
        serde_json::json!([{ "id": "acc-p", "status": "pending", "role": "user", "is_admin": false }]),
    )
    .await;
    mock_account(
        &mock_server,
        "acc-r",
        serde_json::json!([{ "id": "acc-r", "status": "rejected", "role": "analyst", "is_admin": null }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());

    assert_eq!(
        guard
            .check(Some("tok-p"), RouteRequirement::ACTIVE_ACCOUNT)
            .await,
        AccessDecision::redirect(RedirectTarget::PendingApproval)
    );
    assert_eq!(
        guard
            .check(Some("tok-r"), RouteRequirement::ACTIVE_ACCOUNT)
            .await,
        AccessDecision::redirect(RedirectTarget::RejectedAccount)
    );
    // The status pages themselves stay reachable
    assert_eq!(
        guard.check(Some("tok-r"), RouteRequirement::SESSION_ONLY).await,
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn test_legacy_owner_role_reaches_admin_while_pending() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-o", "acc-o").await;
    mock_account(
        &mock_server,
        "acc-o",
        serde_json::json!([{ "id": "acc-o", "status": "pending", "role": "dono", "is_admin": false }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());
    assert_eq!(
        guard.check(Some("tok-o"), RouteRequirement::ADMIN_ONLY).await,
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn test_missing_token_or_expired_session_redirects_to_login() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "msg": "invalid JWT"
        })))
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());

    assert_eq!(
        guard.check(None, RouteRequirement::SESSION_ONLY).await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
    assert_eq!(
        guard
            .check(Some("expired"), RouteRequirement::SESSION_ONLY)
            .await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
}

#[tokio::test]
async fn test_provider_failure_fails_closed() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-1", "acc-1").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());
    assert_eq!(
        guard.check(Some("tok-1"), RouteRequirement::SESSION_ONLY).await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
}

#[tokio::test]
async fn test_missing_account_is_provisioned_as_pending() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-new", "acc-new").await;
    mock_account(&mock_server, "acc-new", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(body_partial_json(serde_json::json!({
            "id": "acc-new",
            "status": "pending",
            "role": "user"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());

    assert_eq!(
        guard
            .check(Some("tok-new"), RouteRequirement::ACTIVE_ACCOUNT)
            .await,
        AccessDecision::redirect(RedirectTarget::PendingApproval)
    );
    // Cached after provisioning: the insert is not repeated
    assert_eq!(
        guard
            .check(Some("tok-new"), RouteRequirement::SESSION_ONLY)
            .await,
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn test_ensure_account_exists_reports_provisioning() {
    let mock_server = MockServer::start().await;
    mock_account(&mock_server, "acc-new", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());
    let outcome = guard.ensure_account_exists("acc-new").await.unwrap();

    match outcome {
        ProvisionOutcome::Provisioned(account) => {
            assert_eq!(account.status, AccountStatus::Pending);
            assert_eq!(account.role, Role::User);
        }
        other => panic!("expected provisioning, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provisioning_failure_redirects_to_login() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-new", "acc-new").await;
    mock_account(&mock_server, "acc-new", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());

    let err = guard.ensure_account_exists("acc-new").await.unwrap_err();
    assert!(matches!(err, EnsureAccountError::Provisioning(_)));

    assert_eq!(
        guard.check(Some("tok-new"), RouteRequirement::SESSION_ONLY).await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
}

#[tokio::test]
async fn test_sign_out_overrides_cached_allow() {
    let mock_server = MockServer::start().await;
    mock_session(&mock_server, "tok-1", "acc-1").await;
    mock_account(
        &mock_server,
        "acc-1",
        serde_json::json!([{ "id": "acc-1", "status": "active", "role": "admin", "is_admin": false }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());
    assert_eq!(
        guard.check(Some("tok-1"), RouteRequirement::ADMIN_ONLY).await,
        AccessDecision::Allow
    );

    guard
        .apply_event(SessionEvent {
            account_id: "acc-1".to_string(),
            kind: SessionEventKind::SignedOut,
            occurred_at: Utc::now(),
        })
        .await;

    assert_eq!(
        guard.check(Some("tok-1"), RouteRequirement::ADMIN_ONLY).await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
}

#[tokio::test]
async fn test_sign_out_preempts_in_flight_check() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([
                    { "id": "acc-slow", "status": "active", "role": "user", "is_admin": false }
                ]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let guard = create_guard(mock_server.uri());
    let session = Session {
        id: "acc-slow".to_string(),
        email: None,
    };

    let check = {
        let guard = guard.clone();
        tokio::spawn(async move {
            guard
                .check_session(&session, RouteRequirement::ACTIVE_ACCOUNT)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    guard
        .apply_event(SessionEvent {
            account_id: "acc-slow".to_string(),
            kind: SessionEventKind::SignedOut,
            occurred_at: Utc::now(),
        })
        .await;

    let decision = check.await.unwrap();
    assert_eq!(decision, AccessDecision::redirect(RedirectTarget::Login));
}

#[tokio::test]
async fn test_record_fetched_across_session_event_is_not_cached() {
    let mock_server = MockServer::start().await;
    // First lookup is slow and answers with the record from before approval
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([
                    { "id": "acc-2", "status": "pending", "role": "user", "is_admin": false }
                ]))
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mock_account(
        &mock_server,
        "acc-2",
        serde_json::json!([{ "id": "acc-2", "status": "active", "role": "user", "is_admin": false }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());
    let in_flight = {
        let guard = guard.clone();
        tokio::spawn(async move { guard.ensure_account_exists("acc-2").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        guard
            .apply_event(SessionEvent {
                account_id: "acc-2".to_string(),
                kind: SessionEventKind::SignedIn,
                occurred_at: Utc::now(),
            })
            .await
    );

    let stale = in_flight.await.unwrap().unwrap();
    assert_eq!(stale.account().status, AccountStatus::Pending);

    let session = Session {
        id: "acc-2".to_string(),
        email: None,
    };
    assert_eq!(
        guard
            .check_session(&session, RouteRequirement::ACTIVE_ACCOUNT)
            .await,
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn test_open_circuit_redirects_to_login_without_calling_provider() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(5)
        .mount(&mock_server)
        .await;
    mock_account(
        &mock_server,
        "acc-1",
        serde_json::json!([{ "id": "acc-1", "status": "active", "role": "user", "is_admin": false }]),
    )
    .await;

    let guard = create_guard(mock_server.uri());
    let session = Session {
        id: "acc-1".to_string(),
        email: None,
    };

    for _ in 0..5 {
        assert_eq!(
            guard.check_session(&session, RouteRequirement::SESSION_ONLY).await,
            AccessDecision::redirect(RedirectTarget::Login)
        );
    }

    // The provider is healthy again, but the breaker is open
    assert_eq!(
        guard.check_session(&session, RouteRequirement::SESSION_ONLY).await,
        AccessDecision::redirect(RedirectTarget::Login)
    );
    assert!(matches!(
        guard.ensure_account_exists("acc-1").await,
        Err(EnsureAccountError::Lookup(SessionLookupError::CircuitOpen))
    ));

    let requests = mock_server.received_requests().await.unwrap();
    let lookups = requests
        .iter()
        .filter(|request| request.url.path() == "/rest/v1/profiles")
        .count();
    assert_eq!(lookups, 5);
}
