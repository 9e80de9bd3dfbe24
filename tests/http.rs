use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use daybook::{
    config::Config, server::REMOTE_USER_HEADER, store::MemoryStore, views::Site,
};

const CONFIG: &str = r#"
    [[apps]]
    kind = "lyra"
    namespace = "rooms"
    description = "Meeting rooms"

    [[apps]]
    kind = "drive"

    [[apps]]
    kind = "food"

    [[users]]
    username = "alice"
    full_name = "Alice Smith"

    [[users]]
    username = "bob"
    full_name = "Bob Jones"
"#;

fn router() -> Router {
    let config: Config = CONFIG.parse().unwrap();
    let site = Site::from_config(&config, Arc::new(MemoryStore::new())).unwrap();
    daybook::server::router(Arc::new(site))
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(user) = user {
        builder = builder.header(REMOTE_USER_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, user: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header(REMOTE_USER_HEADER, user)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn directory_lists_namespaces() {
    let response = router().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["lyra"]["rooms"], "Meeting rooms");
    assert_eq!(body["drive"]["drive"], "Drive bookings");
}

#[tokio::test]
async fn week_view_renders_through_templates() {
    let response = router()
        .oneshot(get("/rooms/date/2024/week/19/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["template"], "lyra/browse_week.html");
    assert_eq!(body["base"], "lyra/base.html");
    assert_eq!(body["current_app"], "rooms");
    assert_eq!(body["context"]["app_name"], "Meeting rooms");
}

#[tokio::test]
async fn booking_round_trip() {
    let app = router();

    let response = app
        .clone()
        .oneshot(post(
            "/rooms/reservation/",
            "alice",
            "start=2024-05-06+09%3A00&stop=2024-05-06+10%3A30&description=Planning",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rooms/reservation/1/");

    let response = app
        .clone()
        .oneshot(get("/rooms/date/2024/5/6/", None))
        .await
        .unwrap();
    let body = json(response).await;
    let event = &body["context"]["days"][0]["event_columns"][0][0];
    assert_eq!(event["description"], "Planning");
    assert_eq!(event["creator_name"], "Alice Smith");
    assert_eq!(event["height"], 6 * 15);

    let response = app
        .clone()
        .oneshot(post("/rooms/reservation/1/remove/", "bob", "confirm=on"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(response).await["context"]["reason"], "admin");

    let response = app
        .clone()
        .oneshot(post("/rooms/reservation/1/remove/", "alice", "confirm=on"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rooms/date/2024/week/19/");

    let response = app
        .oneshot(get("/rooms/reservation/1/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drive_is_for_signed_in_users() {
    let app = router();
    let response = app
        .clone()
        .oneshot(get("/drive/date/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(get("/drive/date/", Some("bob"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["template"], "lyra/index.html");
}

#[tokio::test]
async fn reservations_stay_in_their_namespace() {
    let app = router();
    app.clone()
        .oneshot(post(
            "/rooms/reservation/",
            "alice",
            "start=2024-05-06+09%3A00&stop=2024-05-06+10%3A00&description=Planning",
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(get("/drive/reservation/1/", Some("alice")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn food_menu_print_view() {
    let app = router();
    let response = app
        .clone()
        .oneshot(post(
            "/food/reservation/week-menu/2024/week/19/",
            "alice",
            "0-lunch_main=Pea+soup&4-lunch_main=Salmon",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/food/date/2024/week/19/");

    let response = app
        .oneshot(get("/food/date/2024/week/19/?print", None))
        .await
        .unwrap();
    let body = json(response).await;
    assert_eq!(body["template"], "food/week_print.html");
    assert_eq!(body["context"]["table_rows"][2][5]["description"], "Salmon");
}

#[tokio::test]
async fn feed_exports_icalendar() {
    let app = router();
    app.clone()
        .oneshot(post(
            "/rooms/reservation/",
            "alice",
            "start=2024-05-06+09%3A00&stop=2024-05-06+10%3A00&description=Planning",
        ))
        .await
        .unwrap();

    let response = app.oneshot(get("/rooms/feed.ics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/calendar");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("SUMMARY:Planning"));
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let response = router()
        .oneshot(get("/nowhere/date/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
