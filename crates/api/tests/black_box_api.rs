use chrono::{Duration as ChronoDuration, Utc};
use confreg_api::app::services::PaymentConfig;
use confreg_core::SocietyId;
use confreg_identity::{JwtClaims, PrincipalId, Role};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = confreg_api::app::build_app(
            jwt_secret.to_string(),
            PaymentConfig {
                client_key: "test-client-key".to_string(),
                callback_base: "http://localhost:8080/".to_string(),
            },
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, society_id: SocietyId, roles: Vec<Role>, anonymous: bool) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        society_id,
        roles,
        anonymous,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_registration_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
    want_step: &str,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection
    // update). Poll briefly until the projection catches up.
    for _ in 0..100 {
        let res = client
            .get(format!("{}/registrations/{}", base_url, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["step"] == want_step {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("registration did not reach step {want_step} within timeout");
}

async fn create_current_period(client: &reqwest::Client, base_url: &str, admin_token: &str) {
    let now = Utc::now();
    let res = client
        .post(format!("{}/periods", base_url))
        .bearer_auth(admin_token)
        .json(&json!({
            "name": "Regular",
            "kind": "regular",
            "starts_at": now - ChronoDuration::days(1),
            "ends_at": now + ChronoDuration::days(30),
            "prices": [
                { "key": "Member", "amount": 50000 },
                { "key": "Non-member", "amount": 100000 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn walk_to_payment(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
) -> String {
    let res = client
        .post(format!("{}/registrations", base_url))
        .bearer_auth(token)
        .json(&json!({ "conference_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/registrations/{}/terms", base_url, id))
        .bearer_auth(token)
        .json(&json!({
            "terms_of_service": true,
            "privacy_policy": true,
            "third_party_sharing": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/registrations/{}/attendee", base_url, id))
        .bearer_auth(token)
        .json(&json!({
            "name": "Kim Minji",
            "email": "minji@example.com",
            "phone": "010-1234-5678",
            "affiliation": "Seoul Dental Clinic",
            "license_number": "L-2291",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/registrations/{}/grade", base_url, id))
        .bearer_auth(token)
        .json(&json!({ "grade_key": "member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    id
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn society_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["society_id"].as_str().unwrap(), society_id.to_string());
    assert_eq!(body["anonymous"], true);
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "attendee"));
}

#[tokio::test]
async fn wizard_walkthrough_ends_with_confirmed_registration() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let admin = mint_jwt(jwt_secret, society_id, vec![Role::new("admin")], false);
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    create_current_period(&client, &srv.base_url, &admin).await;

    let id = walk_to_payment(&client, &srv.base_url, &token).await;

    let rm = get_registration_eventually(&client, &srv.base_url, &token, &id, "payment").await;
    assert_eq!(rm["status"], "pending");
    assert_eq!(rm["grade"]["id"], "member");
    assert_eq!(rm["grade"]["amount"], 50000);

    // Open a payment session; checkout data carries the order and callbacks.
    let res = client
        .post(format!("{}/registrations/{}/payment/session", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let checkout: serde_json::Value = res.json().await.unwrap();
    let order_id = checkout["order_id"].as_str().unwrap().to_string();
    assert_eq!(checkout["amount"], 50000);
    assert_eq!(checkout["client_key"], "test-client-key");
    assert!(checkout["urls"]["success"]
        .as_str()
        .unwrap()
        .contains("payments/callback/success"));

    // Provider redirects back with the captured amount; no bearer token.
    let res = client
        .post(format!("{}/payments/callback/success", srv.base_url))
        .json(&json!({
            "society_id": society_id.to_string(),
            "registration_id": id,
            "order_id": order_id,
            "amount": 50000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let rm = get_registration_eventually(&client, &srv.base_url, &token, &id, "complete").await;
    assert_eq!(rm["status"], "confirmed");
    assert_eq!(rm["payment_status"], "paid");
}

#[tokio::test]
async fn success_callback_with_wrong_order_id_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let admin = mint_jwt(jwt_secret, society_id, vec![Role::new("admin")], false);
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    create_current_period(&client, &srv.base_url, &admin).await;
    let id = walk_to_payment(&client, &srv.base_url, &token).await;
    get_registration_eventually(&client, &srv.base_url, &token, &id, "payment").await;

    let res = client
        .post(format!("{}/registrations/{}/payment/session", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/payments/callback/success", srv.base_url))
        .json(&json!({
            "society_id": society_id.to_string(),
            "registration_id": id,
            "order_id": "reg-forged",
            "amount": 50000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn member_verification_selects_the_verified_grade() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let admin = mint_jwt(jwt_secret, society_id, vec![Role::new("admin")], false);
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    create_current_period(&client, &srv.base_url, &admin).await;

    let res = client
        .post(format!("{}/admin/members", srv.base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Kim Minji",
            "member_code": "M-100",
            "grade": "Member",
            "expires_at": null,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Walk to the verification step only (no manual grade selection).
    let res = client
        .post(format!("{}/registrations", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "conference_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    client
        .post(format!("{}/registrations/{}/terms", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "terms_of_service": true,
            "privacy_policy": true,
            "third_party_sharing": true,
        }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/registrations/{}/attendee", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Kim Minji",
            "email": "minji@example.com",
            "phone": "010-1234-5678",
            "affiliation": "Seoul Dental Clinic",
            "license_number": "L-2291",
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/registrations/{}/verify", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Kim Minji",
            "member_code": "M-100",
            "consent": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["verification"]["success"], true);
    assert_eq!(body["selection"]["id"], "member");
    assert_eq!(body["selection"]["fallback"], false);

    let rm = get_registration_eventually(&client, &srv.base_url, &token, &id, "payment").await;
    assert_eq!(rm["grade"]["id"], "member");
}

#[tokio::test]
async fn verification_not_found_leaves_the_wizard_in_place() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let admin = mint_jwt(jwt_secret, society_id, vec![Role::new("admin")], false);
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    create_current_period(&client, &srv.base_url, &admin).await;

    let res = client
        .post(format!("{}/registrations", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "conference_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/registrations/{}/verify", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Nobody",
            "member_code": "M-404",
            "consent": true,
        }))
        .send()
        .await
        .unwrap();

    // Not found is a successful call with success=false, nothing committed.
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["verification"]["success"], false);
    assert_eq!(body["events_committed"], 0);
    assert!(body["selection"].is_null());
}

#[tokio::test]
async fn attendee_cannot_create_periods() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    let now = Utc::now();
    let res = client
        .post(format!("{}/periods", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Regular",
            "kind": "regular",
            "starts_at": now,
            "ends_at": now + ChronoDuration::days(30),
            "prices": [],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn society_isolation_blocks_cross_society_reads() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society1 = SocietyId::new();
    let society2 = SocietyId::new();
    let admin1 = mint_jwt(jwt_secret, society1, vec![Role::new("admin")], false);
    let token1 = mint_jwt(jwt_secret, society1, vec![Role::new("attendee")], true);
    let token2 = mint_jwt(jwt_secret, society2, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();
    create_current_period(&client, &srv.base_url, &admin1).await;

    let res = client
        .post(format!("{}/registrations", srv.base_url))
        .bearer_auth(&token1)
        .json(&json!({ "conference_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    get_registration_eventually(&client, &srv.base_url, &token1, &id, "terms").await;

    // The other society cannot see the registration.
    let res = client
        .get(format!("{}/registrations/{}", srv.base_url, id))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_upgrade_rejects_duplicate_email() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let society_id = SocietyId::new();
    let token = mint_jwt(jwt_secret, society_id, vec![Role::new("attendee")], true);

    let client = reqwest::Client::new();

    async fn start_session(
        client: &reqwest::Client,
        base_url: &str,
        token: &str,
    ) -> String {
        let res = client
            .post(format!("{}/sessions", base_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    let first = start_session(&client, &srv.base_url, &token).await;
    let res = client
        .post(format!("{}/sessions/{}/upgrade", srv.base_url, first))
        .bearer_auth(&token)
        .json(&json!({ "email": "minji@example.com", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .post(format!("{}/sessions/{}/upgrade/complete", srv.base_url, first))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The read model binds the email eventually; poll before asserting the
    // duplicate check.
    let mut bound = false;
    for _ in 0..100 {
        let res = client
            .get(format!("{}/sessions/{}", srv.base_url, first))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["state"] == "authenticated" {
                bound = true;
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(bound, "session never reached the authenticated state");

    let second = start_session(&client, &srv.base_url, &token).await;
    let res = client
        .post(format!("{}/sessions/{}/upgrade", srv.base_url, second))
        .bearer_auth(&token)
        .json(&json!({ "email": "MINJI@example.com", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
