//! Router-level tests over the in-memory store.
//!
//! Every request goes through the full middleware stack built by
//! `create_api_router`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use pantry_core::UserId;
use pantry_test_utils::fixtures::{AUTHOR, OTHER_SHOPPER, SHOPPER};
use serde_json::{json, Value};
use tower::ServiceExt;

#[path = "support/auth.rs"]
mod test_auth_support;
#[path = "support/app.rs"]
mod test_app_support;

use test_app_support::test_app;
use test_auth_support::bearer;

async fn send(app: &Router, method: Method, uri: &str, user: Option<UserId>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user));
    }
    let request = builder.body(Body::empty()).expect("request should build");
    app.clone().oneshot(request).await.expect("router is infallible")
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<UserId>,
    body: Value,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user));
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    app.clone().oneshot(request).await.expect("router is infallible")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body should be JSON")
}

// ============================================================================
// SHOPPING LIST DOWNLOAD
// ============================================================================

#[tokio::test]
async fn download_requires_authentication() {
    let (app, _) = test_app();

    let response = send(&app, Method::GET, "/api/recipes/download_shopping_cart", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn download_rejects_garbage_token() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/api/recipes/download_shopping_cart")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .expect("request should build");

    let response = app.oneshot(request).await.expect("router is infallible");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn download_with_empty_cart_is_not_found() {
    let (app, _) = test_app();

    let response = send(
        &app,
        Method::GET,
        "/api/recipes/download_shopping_cart",
        Some(SHOPPER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "SHOPPING_CART_EMPTY");
}

#[tokio::test]
async fn download_returns_pdf_attachment() {
    let (app, seeded) = test_app();
    let ids = &seeded.kitchen_ids;

    for recipe in [ids.soup, ids.stew] {
        let uri = format!("/api/recipes/{}/shopping_cart", recipe);
        let response = send(&app, Method::POST, &uri, Some(SHOPPER)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(
        &app,
        Method::GET,
        "/api/recipes/download_shopping_cart",
        Some(SHOPPER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"shopping_cart.pdf\""
    );
    assert!(body_bytes(response).await.starts_with(b"%PDF"));

    let stats = seeded.cache.stats();
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn download_serves_cached_list_after_cart_change() {
    let (app, seeded) = test_app();
    let ids = &seeded.kitchen_ids;
    let cart = |recipe| format!("/api/recipes/{}/shopping_cart", recipe);
    let download = "/api/recipes/download_shopping_cart";

    send(&app, Method::POST, &cart(ids.soup), Some(SHOPPER)).await;
    let first = send(&app, Method::GET, download, Some(SHOPPER)).await;
    assert_eq!(first.status(), StatusCode::OK);

    // Emptying the cart does not invalidate the cached list.
    let removed = send(&app, Method::DELETE, &cart(ids.soup), Some(SHOPPER)).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let second = send(&app, Method::GET, download, Some(SHOPPER)).await;
    assert_eq!(second.status(), StatusCode::OK);

    let stats = seeded.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

// ============================================================================
// CART AND FAVORITES
// ============================================================================

#[tokio::test]
async fn cart_add_and_remove_lifecycle() {
    let (app, seeded) = test_app();
    let uri = format!("/api/recipes/{}/shopping_cart", seeded.kitchen_ids.soup);

    let added = send(&app, Method::POST, &uri, Some(SHOPPER)).await;
    assert_eq!(added.status(), StatusCode::CREATED);
    let summary = body_json(added).await;
    assert_eq!(summary["name"], "Soup");
    assert_eq!(summary["cooking_time"], 30);
    assert!(summary.get("ingredients").is_none());

    let again = send(&app, Method::POST, &uri, Some(SHOPPER)).await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(again).await["code"], "ALREADY_IN_LIST");

    // Another user cannot remove this entry.
    let foreign = send(&app, Method::DELETE, &uri, Some(OTHER_SHOPPER)).await;
    assert_eq!(foreign.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(foreign).await["code"], "NOT_IN_LIST");

    let removed = send(&app, Method::DELETE, &uri, Some(SHOPPER)).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);

    let missing = send(&app, Method::DELETE, &uri, Some(SHOPPER)).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_unknown_recipe_is_not_found() {
    let (app, _) = test_app();

    let add = send(&app, Method::POST, "/api/recipes/9999/shopping_cart", Some(SHOPPER)).await;
    assert_eq!(add.status(), StatusCode::NOT_FOUND);

    let remove = send(&app, Method::DELETE, "/api/recipes/9999/favorite", Some(SHOPPER)).await;
    assert_eq!(remove.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_toggles_require_authentication() {
    let (app, seeded) = test_app();
    let uri = format!("/api/recipes/{}/favorite", seeded.kitchen_ids.stew);

    let response = send(&app, Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn favorites_show_up_on_recipe_detail() {
    let (app, seeded) = test_app();
    let stew = seeded.kitchen_ids.stew;

    let fav = send(&app, Method::POST, &format!("/api/recipes/{}/favorite", stew), Some(SHOPPER)).await;
    assert_eq!(fav.status(), StatusCode::CREATED);

    let detail = body_json(send(&app, Method::GET, &format!("/api/recipes/{}", stew), Some(SHOPPER)).await).await;
    assert_eq!(detail["name"], "Stew");
    assert_eq!(detail["is_favorited"], true);
    assert_eq!(detail["is_in_shopping_cart"], false);
    assert_eq!(detail["ingredients"].as_array().map(Vec::len), Some(3));

    let anonymous = body_json(send(&app, Method::GET, &format!("/api/recipes/{}", stew), None).await).await;
    assert_eq!(anonymous["is_favorited"], false);
}

// ============================================================================
// RECIPE AUTHORING
// ============================================================================

#[tokio::test]
async fn recipe_lifecycle_is_author_only() {
    let (app, seeded) = test_app();
    let ids = &seeded.kitchen_ids;

    let created = send_json(
        &app,
        Method::POST,
        "/api/recipes",
        Some(AUTHOR),
        json!({
            "name": "Salted apples",
            "text": "Slice and salt.",
            "cooking_time": 5,
            "tags": [ids.breakfast],
            "ingredients": [{ "id": ids.salt_g, "amount": 2 }]
        }),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let recipe = body_json(created).await;
    assert_eq!(recipe["author"], AUTHOR.get());
    assert_eq!(recipe["tags"][0]["slug"], "breakfast");
    assert_eq!(recipe["ingredients"][0]["amount"], 2);
    let id = recipe["id"].as_i64().expect("recipe id");
    let uri = format!("/api/recipes/{}", id);

    let hijack = send_json(&app, Method::PATCH, &uri, Some(SHOPPER), json!({ "name": "Mine" })).await;
    assert_eq!(hijack.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(hijack).await["code"], "FORBIDDEN");

    let patched = send_json(&app, Method::PATCH, &uri, Some(AUTHOR), json!({ "cooking_time": 7 })).await;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched = body_json(patched).await;
    assert_eq!(patched["cooking_time"], 7);
    assert_eq!(patched["name"], "Salted apples");
    assert_eq!(patched["tags"].as_array().map(Vec::len), Some(1));

    let foreign_delete = send(&app, Method::DELETE, &uri, Some(SHOPPER)).await;
    assert_eq!(foreign_delete.status(), StatusCode::FORBIDDEN);

    let deleted = send(&app, Method::DELETE, &uri, Some(AUTHOR)).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = send(&app, Method::GET, &uri, None).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn created_recipe_feeds_the_shopping_list() {
    let (app, seeded) = test_app();
    let salt = seeded.kitchen_ids.salt_g;

    let created = send_json(
        &app,
        Method::POST,
        "/api/recipes",
        Some(AUTHOR),
        json!({
            "name": "Brine",
            "text": "Dissolve.",
            "cooking_time": 1,
            "ingredients": [{ "id": salt, "amount": 40 }]
        }),
    )
    .await;
    let id = body_json(created).await["id"].as_i64().expect("recipe id");

    let added = send(&app, Method::POST, &format!("/api/recipes/{}/shopping_cart", id), Some(SHOPPER)).await;
    assert_eq!(added.status(), StatusCode::CREATED);
    let download = send(&app, Method::GET, "/api/recipes/download_shopping_cart", Some(SHOPPER)).await;
    assert_eq!(download.status(), StatusCode::OK);
}

#[tokio::test]
async fn recipe_writes_are_validated() {
    let (app, seeded) = test_app();
    let body = |ingredient: i64, amount: u32| {
        json!({
            "name": "Broken",
            "text": "",
            "cooking_time": 5,
            "ingredients": [{ "id": ingredient, "amount": amount }]
        })
    };
    let salt = seeded.kitchen_ids.salt_g.get();

    let anonymous = send_json(&app, Method::POST, "/api/recipes", None, body(salt, 1)).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let unknown = send_json(&app, Method::POST, "/api/recipes", Some(AUTHOR), body(9999, 1)).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unknown).await["code"], "INVALID_INPUT");

    let zero = send_json(&app, Method::POST, "/api/recipes", Some(AUTHOR), body(salt, 0)).await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let missing = send_json(&app, Method::PATCH, "/api/recipes/9999", Some(AUTHOR), json!({})).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let listed = body_json(send(&app, Method::GET, "/api/recipes", None).await).await;
    assert_eq!(listed["count"], 3);
}

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

#[tokio::test]
async fn subscribe_list_and_unsubscribe() {
    let (app, seeded) = test_app();
    let subscribe = format!("/api/users/{}/subscribe", AUTHOR);

    let created = send(&app, Method::POST, &format!("{}?recipes_limit=1", subscribe), Some(SHOPPER)).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let author = body_json(created).await;
    assert_eq!(author["id"], AUTHOR.get());
    assert_eq!(author["recipes_count"], 2);
    assert_eq!(author["recipes"].as_array().map(Vec::len), Some(1));
    assert_eq!(author["recipes"][0]["name"], "Stew");
    assert_eq!(author["is_subscribed"], true);

    let again = send(&app, Method::POST, &subscribe, Some(SHOPPER)).await;
    assert_eq!(again.status(), StatusCode::OK);

    let listed = body_json(send(&app, Method::GET, "/api/users/subscriptions", Some(SHOPPER)).await).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["results"][0]["id"], AUTHOR.get());
    assert_eq!(listed["results"][0]["recipes"].as_array().map(Vec::len), Some(2));

    let soup = format!("/api/recipes/{}", seeded.kitchen_ids.soup);
    let detail = body_json(send(&app, Method::GET, &soup, Some(SHOPPER)).await).await;
    assert_eq!(detail["is_subscribed"], true);
    let stranger = body_json(send(&app, Method::GET, &soup, Some(OTHER_SHOPPER)).await).await;
    assert_eq!(stranger["is_subscribed"], false);

    let removed = send(&app, Method::DELETE, &subscribe, Some(SHOPPER)).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let empty = body_json(send(&app, Method::GET, "/api/users/subscriptions", Some(SHOPPER)).await).await;
    assert_eq!(empty["count"], 0);
}

#[tokio::test]
async fn subscribing_to_yourself_is_rejected() {
    let (app, _) = test_app();
    let uri = format!("/api/users/{}/subscribe", SHOPPER);

    let post = send(&app, Method::POST, &uri, Some(SHOPPER)).await;
    assert_eq!(post.status(), StatusCode::BAD_REQUEST);
    let delete = send(&app, Method::DELETE, &uri, Some(SHOPPER)).await;
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);

    let anonymous = send(&app, Method::GET, "/api/users/subscriptions", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// READ ENDPOINTS
// ============================================================================

#[tokio::test]
async fn recipe_list_is_newest_first_and_filterable() {
    let (app, seeded) = test_app();
    let ids = &seeded.kitchen_ids;

    let all = body_json(send(&app, Method::GET, "/api/recipes", None).await).await;
    assert_eq!(all["count"], 3);
    let order: Vec<i64> = all["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect();
    assert_eq!(order, vec![ids.porridge.get(), ids.stew.get(), ids.soup.get()]);

    let breakfast = body_json(send(&app, Method::GET, "/api/recipes?tags=breakfast", None).await).await;
    assert_eq!(breakfast["count"], 1);
    assert_eq!(breakfast["results"][0]["name"], "Porridge");

    let paged = body_json(send(&app, Method::GET, "/api/recipes?page=2&limit=2", None).await).await;
    assert_eq!(paged["count"], 3);
    assert_eq!(paged["results"].as_array().map(Vec::len), Some(1));

    let bad = send(&app, Method::GET, "/api/recipes?page=0", None).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recipe_list_cart_filter_only_for_users() {
    let (app, seeded) = test_app();
    let soup = seeded.kitchen_ids.soup;
    send(&app, Method::POST, &format!("/api/recipes/{}/shopping_cart", soup), Some(SHOPPER)).await;

    let mine = body_json(
        send(&app, Method::GET, "/api/recipes?is_in_shopping_cart=1", Some(SHOPPER)).await,
    )
    .await;
    assert_eq!(mine["count"], 1);
    assert_eq!(mine["results"][0]["is_in_shopping_cart"], true);

    let anonymous = body_json(send(&app, Method::GET, "/api/recipes?is_in_shopping_cart=1", None).await).await;
    assert_eq!(anonymous["count"], 3);
}

#[tokio::test]
async fn tags_are_listed_and_fetched() {
    let (app, seeded) = test_app();

    let tags = body_json(send(&app, Method::GET, "/api/tags", None).await).await;
    assert_eq!(tags.as_array().map(Vec::len), Some(2));

    let uri = format!("/api/tags/{}", seeded.kitchen_ids.breakfast);
    let tag = body_json(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(tag["slug"], "breakfast");

    let missing = send(&app, Method::GET, "/api/tags/9999", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingredient_prefix_search_is_case_insensitive() {
    let (app, seeded) = test_app();

    let salts = body_json(send(&app, Method::GET, "/api/ingredients?name=SA", None).await).await;
    let names: Vec<&str> = salts
        .as_array()
        .expect("ingredient array")
        .iter()
        .filter_map(|i| i["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Salt", "Salt", "Salt"]);

    let everything = body_json(send(&app, Method::GET, "/api/ingredients", None).await).await;
    assert_eq!(everything.as_array().map(Vec::len), Some(4));

    let uri = format!("/api/ingredients/{}", seeded.kitchen_ids.salt_g);
    let salt = body_json(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(salt["measurement_unit"], "g");
}

#[tokio::test]
async fn health_endpoints_answer_without_auth() {
    let (app, _) = test_app();

    let ping = send(&app, Method::GET, "/health/ping", None).await;
    assert_eq!(ping.status(), StatusCode::OK);

    let ready = send(&app, Method::GET, "/health/ready", None).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = body_json(ready).await;
    assert_eq!(body["status"], "healthy");
}
