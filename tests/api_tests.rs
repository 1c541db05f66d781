//! End-to-end tests against a running server with a seeded admin account.
//!
//! Run with: cargo test -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000/api/v1";
const ADMIN_EMAIL: &str = "admin@bookflow.local";
const ADMIN_PASSWORD: &str = "admin123";

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Register a fresh reader and return their token
async fn register_reader(client: &Client) -> String {
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "username": format!("reader{}", suffix),
            "email": format!("reader{}@example.com", suffix),
            "password": "secret123",
            "full_name": "Test Reader"
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["user"]["role"], "user");
    body["token"].as_str().expect("No token in response").to_string()
}

fn unique_isbn() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("978{}", nanos % 10_000_000_000)
}

async fn create_book(client: &Client, token: &str, quantity: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "isbn": unique_isbn(),
            "title": "The Rust Programming Language",
            "author": "Steve Klabnik",
            "total_quantity": quantity
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No book id")
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_book() {
    let client = Client::new();
    let token = register_reader(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "isbn": unique_isbn(), "title": "Forbidden", "author": "Nobody" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_borrow_renew_return_cycle() {
    let client = Client::new();
    let admin = login(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let reader = register_reader(&client).await;
    let book_id = create_book(&client, &admin, 1).await;

    // Borrow the only copy
    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&reader)
        .json(&json!({ "book_id": book_id, "days": 14 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let borrow: Value = response.json().await.expect("Failed to parse response");
    let borrow_id = borrow["id"].as_i64().expect("No borrow id");
    assert_eq!(borrow["status"], "borrowed");

    // Book is now out of stock
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 0);
    assert_eq!(book["status"], "borrowed");

    // A second borrow of the same book is refused
    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&reader)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Renew
    let response = client
        .post(format!("{}/borrows/{}/renew", BASE_URL, borrow_id))
        .bearer_auth(&reader)
        .json(&json!({ "days": 7 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let renewed: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(renewed["renew_count"], 1);
    assert_eq!(renewed["status"], "renewed");

    // Return on time
    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(receipt["record"]["status"], "returned");
    assert_eq!(receipt["overdue_days"], 0);

    // Clean up
    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_reserve_unavailable_book() {
    let client = Client::new();
    let admin = login(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let first = register_reader(&client).await;
    let second = register_reader(&client).await;
    let book_id = create_book(&client, &admin, 1).await;

    // Reserving an available book is refused
    let response = client
        .post(format!("{}/borrows/reserve", BASE_URL))
        .bearer_auth(&second)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&first)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/borrows/reserve", BASE_URL))
        .bearer_auth(&second)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let reservation: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(reservation["status"], "pending");

    // Duplicate pending reservation
    let response = client
        .post(format!("{}/borrows/reserve", BASE_URL))
        .bearer_auth(&second)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .delete(format!(
            "{}/borrows/reservations/{}",
            BASE_URL,
            reservation["id"].as_i64().expect("No reservation id")
        ))
        .bearer_auth(&second)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_search_books_pagination() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books/search?keyword=rust&page=1&limit=5", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["books"].is_array());
    assert_eq!(body["pagination"]["limit"], 5);
}
