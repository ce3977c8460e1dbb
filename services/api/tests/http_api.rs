//! Integration tests for the HTTP API, driven through the axum router.

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::Utc;
use common::{TestFixture, TestResponse};
use driverroom_core::Role;
use serde_json::{json, Value};

/// The `name=value` part of the response's `Set-Cookie` header.
fn session_cookie(response: &TestResponse) -> String {
    response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string()
}

async fn signup(fx: &TestFixture, body: Value) -> TestResponse {
    fx.request(Method::POST, "/auth/signup", None, Some(body)).await
}

//=========================================================================================
// Auth & Sessions
//=========================================================================================

#[tokio::test]
async fn company_signup_lands_on_the_dispatch_board() {
    let fx = TestFixture::new();
    let response = signup(
        &fx,
        json!({
            "email": "Dispatch@Fleet.Example",
            "password": "correct horse",
            "name": "Dana",
            "role": "company",
            "company_name": "Fleet",
            "rescue_enabled": true
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["email"], "dispatch@fleet.example");
    assert_eq!(response.body["activated"], true);
    assert_eq!(response.body["company_name"], "Fleet");
    assert_eq!(response.body["destination"], "dispatch_board");

    let cookie = session_cookie(&response);
    let me = fx.get("/me", &cookie).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["role"], "company");
}

#[tokio::test]
async fn drivers_wait_for_activation_by_their_dispatcher() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let dispatcher_cookie = fx.cookie(&dispatcher).await;

    let response = signup(
        &fx,
        json!({
            "email": "avery@fleet.example",
            "password": "long enough",
            "name": "Avery",
            "role": "driver",
            "company_id": fleet.id
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["destination"], "awaiting_activation");
    let driver_cookie = session_cookie(&response);
    let driver_id = response.body["user_id"].as_str().unwrap().to_string();

    assert_eq!(fx.get("/me", &driver_cookie).await.status, StatusCode::OK);
    let blocked = fx.post("/duty/start", &driver_cookie, json!({})).await;
    assert_eq!(blocked.status, StatusCode::FORBIDDEN);

    let activated = fx
        .post(
            &format!("/users/{}/activation", driver_id),
            &dispatcher_cookie,
            json!({ "activated": true }),
        )
        .await;
    assert_eq!(activated.status, StatusCode::OK);
    assert_eq!(activated.body["destination"], "driver_home");

    let started = fx.post("/duty/start", &driver_cookie, json!({})).await;
    assert_eq!(started.status, StatusCode::OK);
    assert_eq!(started.body["on_duty"], true);
}

#[tokio::test]
async fn dispatchers_cannot_activate_other_companies_users() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let rival = fx.company("Rival", true).await;
    let outsider = fx.member(&rival, Role::Company, "Riley").await;
    let pending = fx.account(Some(fleet.id), Role::Driver, "Avery", false).await;

    let response = fx
        .post(
            &format!("/users/{}/activation", pending.user_id),
            &fx.cookie(&outsider).await,
            json!({ "activated": true }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signup_rejects_bad_input_and_duplicates() {
    let fx = TestFixture::new();
    let valid = json!({
        "email": "casey@fleet.example",
        "password": "long enough",
        "name": "Casey",
        "role": "driver"
    });

    let mut bad_email = valid.clone();
    bad_email["email"] = json!("casey-at-fleet");
    assert_eq!(signup(&fx, bad_email).await.status, StatusCode::BAD_REQUEST);

    let mut short_password = valid.clone();
    short_password["password"] = json!("short");
    assert_eq!(signup(&fx, short_password).await.status, StatusCode::BAD_REQUEST);

    let mut admin = valid.clone();
    admin["role"] = json!("admin");
    assert_eq!(signup(&fx, admin).await.status, StatusCode::BAD_REQUEST);

    let first = signup(&fx, valid.clone()).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["destination"], "awaiting_activation");

    let mut shouted = valid.clone();
    shouted["email"] = json!("CASEY@fleet.example");
    assert_eq!(signup(&fx, shouted).await.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn company_signup_with_a_taken_email_leaves_no_company_behind() {
    let fx = TestFixture::new();
    let driver = json!({
        "email": "owner@fleet.example",
        "password": "long enough",
        "name": "Owen",
        "role": "driver"
    });
    assert_eq!(signup(&fx, driver).await.status, StatusCode::CREATED);

    let company = json!({
        "email": "Owner@Fleet.Example",
        "password": "long enough",
        "name": "Owen",
        "role": "company",
        "company_name": "Ghost Fleet"
    });
    assert_eq!(signup(&fx, company).await.status, StatusCode::CONFLICT);
    assert!(fx
        .store
        .companies()
        .await
        .iter()
        .all(|c| c.name != "Ghost Fleet"));
}

#[tokio::test]
async fn login_checks_the_password_and_logout_ends_the_session() {
    let fx = TestFixture::new();
    let created = signup(
        &fx,
        json!({
            "email": "dana@fleet.example",
            "password": "correct horse",
            "name": "Dana",
            "role": "company",
            "company_name": "Fleet"
        }),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let wrong = fx
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "dana@fleet.example", "password": "battery staple" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = fx
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@fleet.example", "password": "correct horse" })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let login = fx
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "dana@fleet.example", "password": "correct horse" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let cookie = session_cookie(&login);
    assert_eq!(fx.get("/roster", &cookie).await.status, StatusCode::OK);

    let logout = fx.request(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(fx.get("/roster", &cookie).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_session() {
    let fx = TestFixture::new();
    let anonymous = fx.request(Method::GET, "/roster", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = fx.get("/roster", "session=not-a-session").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates_trim_and_reject_blank_names() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", false).await;
    let driver = fx.member(&fleet, Role::Driver, "Avery").await;
    let cookie = fx.cookie(&driver).await;

    let blank = fx
        .request(Method::PUT, "/me", Some(&cookie), Some(json!({ "name": "  " })))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let updated = fx
        .request(
            Method::PUT,
            "/me",
            Some(&cookie),
            Some(json!({ "name": " Avery Q ", "phone": "555-0100" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["name"], "Avery Q");
    assert_eq!(updated.body["phone"], "555-0100");
}

//=========================================================================================
// Dispatch Board
//=========================================================================================

#[tokio::test]
async fn board_endpoints_are_for_dispatchers_only() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let driver = fx.member(&fleet, Role::Driver, "Avery").await;
    let cookie = fx.cookie(&driver).await;

    assert_eq!(fx.get("/roster", &cookie).await.status, StatusCode::FORBIDDEN);
    assert_eq!(fx.get("/rescues", &cookie).await.status, StatusCode::FORBIDDEN);
    assert_eq!(fx.get("/returns", &cookie).await.status, StatusCode::FORBIDDEN);
    assert_eq!(fx.get("/feedback", &cookie).await.status, StatusCode::FORBIDDEN);
    let bulk = fx
        .post("/roster/off-duty", &cookie, json!({ "driver_ids": [driver.user_id] }))
        .await;
    assert_eq!(bulk.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn roster_renders_in_board_order_with_a_name_filter() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let a = fx.member(&fleet, Role::Trainer, "Avery").await;
    let b = fx.member(&fleet, Role::Driver, "Blake").await;
    fx.start_shift(&a, Utc::now()).await;
    fx.start_shift(&b, Utc::now()).await;
    let b_cookie = fx.cookie(&b).await;
    assert_eq!(
        fx.post("/duty/check-in", &b_cookie, json!({})).await.status,
        StatusCode::OK
    );

    let cookie = fx.cookie(&dispatcher).await;
    let roster = fx.get("/roster", &cookie).await;
    assert_eq!(roster.status, StatusCode::OK);
    assert_eq!(roster.body["checked_in_count"], 1);
    let names: Vec<&str> = roster.body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Blake", "Avery"]);

    let filtered = fx.get("/roster?q=AVE", &cookie).await;
    let entries = filtered.body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Avery");
    assert_eq!(entries[0]["rescue_state"], "idle");
}

#[tokio::test]
async fn rescue_dispatch_over_http() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let a = fx.member(&fleet, Role::Trainer, "Avery").await;
    let b = fx.member(&fleet, Role::Driver, "Blake").await;
    fx.start_shift(&a, Utc::now()).await;
    fx.start_shift(&b, Utc::now()).await;
    let cookie = fx.cookie(&dispatcher).await;

    let writes_before = fx.store.writes();
    let blank = fx
        .post(
            "/rescues",
            &cookie,
            json!({ "rescuer_id": b.user_id, "rescuee_id": a.user_id, "address": " " }),
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    let missing = fx
        .post("/rescues", &cookie, json!({ "rescuee_id": a.user_id, "address": "1 Oak" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.store.writes(), writes_before);

    let created = fx
        .post(
            "/rescues",
            &cookie,
            json!({ "rescuer_id": b.user_id, "rescuee_id": a.user_id, "address": "123 Main St" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "dispatched");
    assert_eq!(created.body["rescuee_name"], "Avery");

    let roster = fx.get("/roster", &cookie).await;
    let states: Vec<(&str, &str)> = roster.body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["name"].as_str().unwrap(), e["rescue_state"].as_str().unwrap()))
        .collect();
    assert_eq!(states, vec![("Avery", "needs_rescue"), ("Blake", "rescuing")]);

    let rts = fx
        .post(&format!("/drivers/{}/rts", a.user_id), &cookie, json!({}))
        .await;
    assert_eq!(rts.status, StatusCode::NO_CONTENT);
    let rescues = fx.get("/rescues", &cookie).await;
    assert_eq!(rescues.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rescuing_an_unknown_driver_is_not_found() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", true).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let b = fx.member(&fleet, Role::Driver, "Blake").await;
    fx.start_shift(&b, Utc::now()).await;

    let response = fx
        .post(
            "/rescues",
            &fx.cookie(&dispatcher).await,
            json!({
                "rescuer_id": b.user_id,
                "rescuee_id": uuid::Uuid::new_v4(),
                "address": "123 Main St"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_off_duty_over_http() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", false).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let a = fx.member(&fleet, Role::Driver, "Avery").await;
    let b = fx.member(&fleet, Role::Driver, "Blake").await;
    fx.start_shift(&a, Utc::now()).await;
    fx.start_shift(&b, Utc::now()).await;
    let cookie = fx.cookie(&dispatcher).await;

    let empty = fx.post("/roster/off-duty", &cookie, json!({ "driver_ids": [] })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let response = fx
        .post(
            "/roster/off-duty",
            &cookie,
            json!({ "driver_ids": [a.user_id, b.user_id] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["updated"], 2);

    let roster = fx.get("/roster", &cookie).await;
    assert!(roster.body["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn returns_flow_over_http() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", false).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let a = fx.member(&fleet, Role::Driver, "Avery").await;
    fx.start_shift(&a, Utc::now()).await;
    let driver_cookie = fx.cookie(&a).await;
    let cookie = fx.cookie(&dispatcher).await;

    let invalid = fx
        .post(
            "/returns",
            &driver_cookie,
            json!({ "has_returns": true, "count": 0, "reasons": ["Damaged"] }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let logged = fx
        .post(
            "/returns",
            &driver_cookie,
            json!({ "has_returns": true, "count": 2, "reasons": ["Business closed"] }),
        )
        .await;
    assert_eq!(logged.status, StatusCode::CREATED);
    assert_eq!(logged.body["notified"], false);
    let incident_id = logged.body["id"].as_str().unwrap().to_string();

    let roster = fx.get("/roster", &cookie).await;
    assert_eq!(roster.body["entries"][0]["pending_returns"], true);

    let notified = fx
        .post(&format!("/returns/{}/notified", incident_id), &cookie, json!({}))
        .await;
    assert_eq!(notified.status, StatusCode::NO_CONTENT);

    let listed = fx.get("/returns", &cookie).await;
    assert_eq!(listed.body[0]["notified"], true);
    assert_eq!(listed.body[0]["count"], 2);
}

//=========================================================================================
// Messaging
//=========================================================================================

#[tokio::test]
async fn chats_are_limited_to_company_members() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", false).await;
    let rival = fx.company("Rival", false).await;
    let a = fx.member(&fleet, Role::Driver, "Avery").await;
    let b = fx.member(&fleet, Role::Driver, "Blake").await;
    let c = fx.member(&fleet, Role::Trainer, "Casey").await;
    let outsider = fx.member(&rival, Role::Driver, "Riley").await;
    let cookie = fx.cookie(&a).await;

    let crowded_direct = fx
        .post(
            "/chats",
            &cookie,
            json!({ "kind": "direct", "members": [b.user_id, c.user_id] }),
        )
        .await;
    assert_eq!(crowded_direct.status, StatusCode::BAD_REQUEST);

    let with_outsider = fx
        .post(
            "/chats",
            &cookie,
            json!({ "kind": "group", "members": [b.user_id, outsider.user_id] }),
        )
        .await;
    assert_eq!(with_outsider.status, StatusCode::BAD_REQUEST);

    let direct = fx
        .post("/chats", &cookie, json!({ "kind": "direct", "members": [b.user_id] }))
        .await;
    assert_eq!(direct.status, StatusCode::CREATED);
    let chat_id = direct.body["id"].as_str().unwrap().to_string();

    let sent = fx
        .post(
            &format!("/chats/{}/messages", chat_id),
            &cookie,
            json!({ "body": "Running late at stop 40" }),
        )
        .await;
    assert_eq!(sent.status, StatusCode::CREATED);

    let blank = fx
        .post(&format!("/chats/{}/messages", chat_id), &cookie, json!({ "body": "  " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let b_cookie = fx.cookie(&b).await;
    let messages = fx.get(&format!("/chats/{}/messages", chat_id), &b_cookie).await;
    assert_eq!(messages.status, StatusCode::OK);
    assert_eq!(messages.body[0]["body"], "Running late at stop 40");
    assert_eq!(messages.body[0]["sender_name"], "Avery");

    let c_cookie = fx.cookie(&c).await;
    let snooping = fx.get(&format!("/chats/{}/messages", chat_id), &c_cookie).await;
    assert_eq!(snooping.status, StatusCode::FORBIDDEN);
    let c_chats = fx.get("/chats", &c_cookie).await;
    assert!(c_chats.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn notices_posts_and_feedback_follow_roles() {
    let fx = TestFixture::new();
    let fleet = fx.company("Fleet", false).await;
    let dispatcher = fx.member(&fleet, Role::Company, "Dana").await;
    let driver = fx.member(&fleet, Role::Driver, "Avery").await;
    let cookie = fx.cookie(&dispatcher).await;
    let driver_cookie = fx.cookie(&driver).await;

    let notice = json!({ "title": "Van 12", "body": "Out of service today" });
    let denied = fx.post("/notices", &driver_cookie, notice.clone()).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(
        fx.post("/notices", &cookie, notice).await.status,
        StatusCode::CREATED
    );
    let notices = fx.get("/notices", &driver_cookie).await;
    assert_eq!(notices.body[0]["title"], "Van 12");

    let post = fx
        .post("/posts", &driver_cookie, json!({ "body": "Great job today team" }))
        .await;
    assert_eq!(post.status, StatusCode::CREATED);
    assert_eq!(fx.get("/posts", &cookie).await.body[0]["author_name"], "Avery");

    let from_dispatcher = fx.post("/feedback", &cookie, json!({ "body": "hi" })).await;
    assert_eq!(from_dispatcher.status, StatusCode::FORBIDDEN);
    let feedback = fx
        .post("/feedback", &driver_cookie, json!({ "body": "More water at the station" }))
        .await;
    assert_eq!(feedback.status, StatusCode::CREATED);
    let listed = fx.get("/feedback", &cookie).await;
    assert_eq!(listed.body[0]["body"], "More water at the station");
}
