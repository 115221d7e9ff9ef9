use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::App;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use memberd::config::CommonConfig;
use memberd::server::config::ServerConfig;
use memberd::server::factory::ServerFactory;
use memberd::server::restful::{configure, RestfulContext};

const ROOT_PASSWORD: &str = "root-test-pw";

fn build_context() -> Arc<RestfulContext> {
    let mut cfg = ServerConfig::default();
    cfg.db.sqlite.memory = true;
    cfg.authn.password_rounds = 1000;
    cfg.authn.root_password = String::from(ROOT_PASSWORD);

    let board = BTreeMap::from([(
        String::from("events"),
        BTreeMap::from([(String::from("POST"), 1), (String::from("PATCH"), 1)]),
    )]);
    cfg.authz.roles.insert(String::from("board"), board);

    let factory = ServerFactory::new(cfg).unwrap();
    factory.build_context().unwrap()
}

/// Sends the request and returns the status with the decoded json body.
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, body)
    }};
}

fn bearer(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {token}")))
}

macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let req = TestRequest::post()
            .uri("/api/sessions")
            .set_json(json!({"username": $username, "password": $password}));
        let (status, body) = send!($app, req);
        assert_eq!(status, StatusCode::OK, "login {}: {body}", $username);
        body["data"]["token"].as_str().unwrap().to_string()
    }};
}

macro_rules! create {
    ($app:expr, $token:expr, $resource:expr, $doc:expr) => {{
        let req = bearer(TestRequest::post().uri(&format!("/api/{}", $resource)), $token).set_json($doc);
        let (status, body) = send!($app, req);
        assert_eq!(status, StatusCode::OK, "create {}: {body}", $resource);
        body["data"]["id"].as_i64().unwrap()
    }};
}

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["id"].as_i64().unwrap())
        .collect()
}

#[actix_web::test]
async fn test_sessions() {
    let app = test::init_service(App::new().configure(|cfg| configure(cfg, build_context(), 3))).await;

    let root = login!(app, "root", ROOT_PASSWORD);
    let alice = create!(
        app,
        &root,
        "users",
        json!({"username": "alice", "email": "alice@example.com", "password": "alice-pw"})
    );

    let req = TestRequest::post()
        .uri("/api/sessions")
        .set_json(json!({"username": "alice", "password": "wrong"}));
    let (status, body) = send!(app, req);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("invalid username or password"));

    // Email works as login name too
    let token = login!(app, "alice@example.com", "alice-pw");
    assert_eq!(token.len(), 64);

    let (status, body) = send!(app, bearer(TestRequest::get().uri("/api/sessions"), &token));
    assert_eq!(status, StatusCode::OK);
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["user"], alice);
    let session = sessions[0]["id"].as_i64().unwrap();

    // Basic auth carries the token as user name
    let basic = STANDARD.encode(format!("{token}:"));
    let req = TestRequest::get()
        .uri("/api/sessions")
        .insert_header(("Authorization", format!("Basic {basic}")));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::OK);

    // Logout
    let req = bearer(TestRequest::delete().uri(&format!("/api/sessions/{session}")), &token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send!(app, bearer(TestRequest::get().uri("/api/sessions"), &token));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Invalid token on a public method continues as anonymous
    let (status, _) = send!(app, bearer(TestRequest::get().uri("/api/events"), &token));
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_ownership() {
    let app = test::init_service(App::new().configure(|cfg| configure(cfg, build_context(), 3))).await;

    let root = login!(app, "root", ROOT_PASSWORD);
    let alice = create!(app, &root, "users", json!({"username": "alice", "password": "alice-pw"}));
    let bob = create!(app, &root, "users", json!({"username": "bob", "password": "bob-pw"}));
    create!(app, &root, "permissions", json!({"user": alice, "role": "board"}));

    let alice_token = login!(app, "alice", "alice-pw");
    let bob_token = login!(app, "bob", "bob-pw");

    // Board members create events, everybody else is refused
    let hackathon = create!(
        app,
        &alice_token,
        "events",
        json!({"title": "Hackathon", "organizer": alice})
    );
    let req = bearer(TestRequest::post().uri("/api/events"), &bob_token)
        .set_json(json!({"title": "Party", "organizer": bob}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    let assembly = create!(app, &root, "events", json!({"title": "Assembly", "organizer": 0}));

    // Events are public, signups are not
    let (status, body) = send!(app, TestRequest::get().uri("/api/events"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![hackathon, assembly]);
    let (status, _) = send!(app, TestRequest::get().uri("/api/signups"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let own = create!(app, &bob_token, "signups", json!({"user": bob, "event": hackathon}));
    let other = create!(app, &bob_token, "signups", json!({"user": bob, "event": assembly}));

    // Signing up somebody else for an event bob does not organize
    let req = bearer(TestRequest::post().uri("/api/signups"), &bob_token)
        .set_json(json!({"user": alice, "event": hackathon}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Relation keys must be plain values
    for doc in [
        json!({"user": alice, "event": [hackathon]}),
        json!({"event": {"id": hackathon}}),
    ] {
        let req = bearer(TestRequest::post().uri("/api/signups"), &bob_token).set_json(doc);
        let (status, _) = send!(app, req);
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    // Bob sees his signups, alice sees the ones on her event
    let (_, body) = send!(app, bearer(TestRequest::get().uri("/api/signups"), &bob_token));
    assert_eq!(ids(&body), vec![own, other]);
    let (_, body) = send!(app, bearer(TestRequest::get().uri("/api/signups"), &alice_token));
    assert_eq!(ids(&body), vec![own]);
    let (_, body) = send!(app, bearer(TestRequest::get().uri("/api/signups"), &root));
    assert_eq!(ids(&body), vec![own, other]);

    let req = bearer(TestRequest::get().uri(&format!("/api/signups/{other}")), &alice_token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = bearer(TestRequest::get().uri("/api/signups/99999"), &alice_token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Patching
    let req = bearer(TestRequest::patch().uri(&format!("/api/signups/{other}")), &alice_token)
        .set_json(json!({"comment": "hi"}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = bearer(TestRequest::patch().uri(&format!("/api/signups/{own}")), &bob_token)
        .set_json(json!({"comment": "vegetarian"}));
    let (status, body) = send!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comment"], "vegetarian");
    assert_eq!(body["data"]["user"], bob);

    // Handing the signup over would lock bob out
    let req = bearer(TestRequest::patch().uri(&format!("/api/signups/{other}")), &bob_token)
        .set_json(json!({"user": alice}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = bearer(TestRequest::get().uri(&format!("/api/signups/{other}")), &root);
    let (_, body) = send!(app, req);
    assert_eq!(body["data"]["user"], bob);

    let req = bearer(TestRequest::delete().uri(&format!("/api/signups/{other}")), &alice_token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = bearer(TestRequest::delete().uri(&format!("/api/signups/{other}")), &bob_token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::OK);

    // A float that equals bob's id is not bob
    let float = create!(app, &root, "signups", json!({"user": bob as f64, "event": assembly}));
    let (_, body) = send!(app, bearer(TestRequest::get().uri("/api/signups"), &bob_token));
    assert_eq!(ids(&body), vec![own]);
    let req = bearer(TestRequest::delete().uri(&format!("/api/signups/{float}")), &bob_token);
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = bearer(TestRequest::patch().uri(&format!("/api/signups/{float}")), &bob_token)
        .set_json(json!({"comment": "hi"}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_users() {
    let app = test::init_service(App::new().configure(|cfg| configure(cfg, build_context(), 3))).await;

    let root = login!(app, "root", ROOT_PASSWORD);
    let alice = create!(
        app,
        &root,
        "users",
        json!({"username": "alice", "nethz": "alice", "password": "alice-pw"})
    );
    let token = login!(app, "alice", "alice-pw");

    let (status, body) = send!(app, bearer(TestRequest::get().uri("/api/users"), &token));
    assert_eq!(status, StatusCode::OK);
    let users = body["data"].as_array().unwrap();
    assert!(!users.is_empty());
    assert!(users.iter().all(|user| user.get("password").is_none()));

    let req = bearer(
        TestRequest::get().uri("/api/users?projection=%7B%22password%22%3A1%7D"),
        &token,
    );
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Directory fields are managed by admins only
    let req = bearer(TestRequest::patch().uri(&format!("/api/users/{alice}")), &token)
        .set_json(json!({"nethz": "mallory"}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Sending it back unchanged is fine, the password gets hashed
    let req = bearer(TestRequest::patch().uri(&format!("/api/users/{alice}")), &token)
        .set_json(json!({"nethz": "alice", "password": "new-pw"}));
    let (status, body) = send!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("password").is_none());
    login!(app, "alice", "new-pw");

    let req = bearer(TestRequest::put().uri(&format!("/api/users/{alice}")), &root)
        .set_json(json!({"username": "alice", "nethz": "alice", "password": "put-pw"}));
    let (status, body) = send!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("password").is_none());
    login!(app, "alice", "put-pw");

    let req = bearer(TestRequest::patch().uri(&format!("/api/users/{alice}")), &root)
        .set_json(json!({"nethz": "alice2"}));
    let (status, body) = send!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nethz"], "alice2");

    // Users can not patch each other
    let req = bearer(TestRequest::patch().uri("/api/users/0"), &token).set_json(json!({"phone": "1"}));
    let (status, _) = send!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_roles_and_misc() {
    let app = test::init_service(App::new().configure(|cfg| configure(cfg, build_context(), 3))).await;

    let root = login!(app, "root", ROOT_PASSWORD);
    create!(app, &root, "users", json!({"username": "alice", "password": "alice-pw"}));
    let token = login!(app, "alice", "alice-pw");

    let (status, body) = send!(app, bearer(TestRequest::get().uri("/api/roles"), &token));
    assert_eq!(status, StatusCode::OK);
    let board = &body["data"]["board"]["events"];
    assert_eq!(board.as_object().unwrap().len(), 5);
    assert_eq!(board["POST"], 1);
    assert_eq!(board["PATCH"], 1);
    assert_eq!(board["DELETE"], 0);
    assert_eq!(body["data"]["admin"]["signups"]["DELETE"], 1);

    let (status, _) = send!(app, TestRequest::get().uri("/api/roles"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send!(app, bearer(TestRequest::post().uri("/api/roles"), &token).set_json(json!({})));
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send!(app, bearer(TestRequest::get().uri("/api/unknown"), &token));
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send!(app, bearer(TestRequest::get().uri("/api/users/abc"), &token));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send!(app, bearer(TestRequest::post().uri("/api/events"), &root));
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send!(app, TestRequest::get().uri("/healthz"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["bootstrapped"], true);
}

#[test]
fn test_default_config() {
    let cfg = ServerConfig::default();
    assert_eq!(cfg.authn.root_password, "root");
    assert!(cfg.authz.resources.contains_key("roles"));
}
