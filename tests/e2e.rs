//! End-to-end scenarios (spec §8): each drives the session engine exactly as
//! a client would, over an in-process duplex pipe standing in for stdio.

use std::sync::Arc;

use library_mcp::config::Config;
use library_mcp::domain::{Author, Book, Genre, Isbn13, MembershipStatus, Patron};
use library_mcp::observability::recorder_for;
use library_mcp::outbound::OutboundQueue;
use library_mcp::server::Server;
use library_mcp::store::author_repo::AuthorRepo;
use library_mcp::store::book_repo::BookRepo;
use library_mcp::store::patron_repo::PatronRepo;
use library_mcp::store::Store;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, ReadHalf};

async fn harness() -> (Arc<Server>, ReadHalf<DuplexStream>, Store) {
    let store = Store::in_memory().await.unwrap();
    let (read, write) = tokio::io::duplex(1 << 20);
    let (outbound, _writer) = OutboundQueue::spawn(write);
    let server = Arc::new(Server::new(
        store.clone(),
        Arc::new(Config::default()),
        outbound,
        Arc::from(recorder_for(false)),
    ));
    (server, read, store)
}

async fn next_frame(read: &mut ReadHalf<DuplexStream>) -> Value {
    let mut lines = BufReader::new(&mut *read).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    serde_json::from_str(&line).unwrap()
}

async fn initialize(server: &Server, read: &mut ReadHalf<DuplexStream>) {
    server
        .handle_line(
            &json!({
                "jsonrpc": "2.0", "id": 0, "method": "initialize",
                "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "e2e", "version": "1"}}
            })
            .to_string(),
        )
        .await;
    let response = next_frame(read).await;
    assert_eq!(response["result"]["capabilities"]["resources"]["subscribe"], true);

    server
        .handle_line(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string())
        .await;
}

async fn seed_book(store: &Store, isbn: &str, total: i64, available: i64) {
    AuthorRepo::upsert(
        store.pool(),
        &Author {
            author_id: "a1".to_string(),
            name: "Ada Lovelace".to_string(),
            biography: None,
        },
    )
    .await
    .unwrap();
    BookRepo::upsert(
        store.pool(),
        &Book {
            isbn: Isbn13::parse(isbn).unwrap(),
            title: format!("Book {isbn}"),
            author_id: "a1".to_string(),
            genre: Genre::Fiction,
            publication_year: 2020,
            description: "A library copy used in end-to-end scenarios.".to_string(),
            total_copies: total,
            available_copies: available,
        },
    )
    .await
    .unwrap();
}

async fn seed_patron(store: &Store, patron_id: &str) {
    PatronRepo::upsert(
        store.pool(),
        &Patron {
            patron_id: patron_id.to_string(),
            name: patron_id.to_string(),
            email: format!("{patron_id}@example.com"),
            membership_status: MembershipStatus::Active,
            outstanding_fines: 0.0,
        },
    )
    .await
    .unwrap();
}

async fn call_tool(server: &Server, read: &mut ReadHalf<DuplexStream>, id: i64, name: &str, arguments: Value) -> Value {
    server
        .handle_line(&json!({"jsonrpc": "2.0", "id": id, "method": "tools/call", "params": {"name": name, "arguments": arguments}}).to_string())
        .await;
    next_frame(read).await
}

/// S1: initialize, then a paginated `resources/read` over the book list.
#[tokio::test]
async fn s1_initialize_then_list_books() {
    let (server, mut read, store) = harness().await;
    initialize(&server, &mut read).await;

    seed_book(&store, "9780134190440", 3, 3).await;
    seed_book(&store, "9780136291558", 2, 2).await;
    seed_book(&store, "9780132350884", 1, 1).await;

    server
        .handle_line(&json!({"jsonrpc": "2.0", "id": 1, "method": "resources/read", "params": {"uri": "library://books?page=1&page_size=2"}}).to_string())
        .await;
    let response = next_frame(&mut read).await;
    let text = response["result"]["contents"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["books"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);
}

/// S2: checking out the last available copy drops it to zero, visible on
/// a subsequent resource read.
#[tokio::test]
async fn s2_checkout_happy_path() {
    let (server, mut read, store) = harness().await;
    initialize(&server, &mut read).await;
    seed_book(&store, "9780134190440", 3, 1).await;
    seed_patron(&store, "p_anderson_01").await;

    let response = call_tool(
        &server,
        &mut read,
        1,
        "checkout_book",
        json!({"isbn": "9780134190440", "patron_id": "p_anderson_01"}),
    )
    .await;
    assert!(response["error"].is_null(), "unexpected error: {response:?}");

    server
        .handle_line(&json!({"jsonrpc": "2.0", "id": 2, "method": "resources/read", "params": {"uri": "library://books/9780134190440"}}).to_string())
        .await;
    let response = next_frame(&mut read).await;
    let text = response["result"]["contents"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["book"]["available_copies"], 0);
}

/// S3: two reservations queue in order; returning the checkout fulfills the
/// head of the queue and notifies subscribers.
#[tokio::test]
async fn s3_reservation_queueing_and_fulfillment_notification() {
    let (server, mut read, store) = harness().await;
    initialize(&server, &mut read).await;
    seed_book(&store, "9780134190440", 1, 1).await;
    seed_patron(&store, "p_anderson_01").await;
    seed_patron(&store, "p_b").await;
    seed_patron(&store, "p_c").await;

    let checkout = call_tool(
        &server,
        &mut read,
        1,
        "checkout_book",
        json!({"isbn": "9780134190440", "patron_id": "p_anderson_01"}),
    )
    .await;
    let checkout_body: Value =
        serde_json::from_str(checkout["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    let checkout_id = checkout_body["checkout_id"].as_str().unwrap().to_string();

    server
        .handle_line(&json!({"jsonrpc": "2.0", "id": 10, "method": "resources/subscribe", "params": {"uri": "library://books"}}).to_string())
        .await;
    let _ = next_frame(&mut read).await;

    let reservation_b = call_tool(&server, &mut read, 2, "reserve_book", json!({"isbn": "9780134190440", "patron_id": "p_b"})).await;
    let reservation_b_body: Value =
        serde_json::from_str(reservation_b["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(reservation_b_body["queue_position"], 1);

    let reservation_c = call_tool(&server, &mut read, 3, "reserve_book", json!({"isbn": "9780134190440", "patron_id": "p_c"})).await;
    let reservation_c_body: Value =
        serde_json::from_str(reservation_c["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(reservation_c_body["queue_position"], 2);

    call_tool(&server, &mut read, 4, "return_book", json!({"checkout_id": checkout_id})).await;
    let notification = next_frame(&mut read).await;
    assert_eq!(notification["method"], "notifications/resources/updated");
    assert_eq!(notification["params"]["diff"]["fulfilled_reservation"].is_null(), false);
}

/// S4: sampling unavailable at negotiation time falls back deterministically.
#[tokio::test]
async fn s4_sampling_fallback_to_deterministic_summary() {
    let (server, mut read, store) = harness().await;
    initialize(&server, &mut read).await;
    seed_book(&store, "9780134190440", 1, 1).await;

    let response = call_tool(
        &server,
        &mut read,
        1,
        "generate_book_insights",
        json!({"isbn": "9780134190440", "insight_type": "summary"}),
    )
    .await;
    let body: Value = serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["data"]["fallback_reason"], "no_client_capability");
    assert!(body["content"].as_str().unwrap().contains("Book 9780134190440"));
}

/// S6: two concurrent checkouts for the last copy; exactly one succeeds.
#[tokio::test]
async fn s6_concurrent_checkout_on_last_copy() {
    let (server, mut read, store) = harness().await;
    initialize(&server, &mut read).await;
    seed_book(&store, "9780134190440", 1, 1).await;
    seed_patron(&store, "p_a").await;
    seed_patron(&store, "p_b").await;

    let server_a = server.clone();
    let server_b = server.clone();
    let task_a = tokio::spawn(async move {
        server_a
            .handle_line(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "checkout_book", "arguments": {"isbn": "9780134190440", "patron_id": "p_a"}}}).to_string())
            .await;
    });
    let task_b = tokio::spawn(async move {
        server_b
            .handle_line(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "checkout_book", "arguments": {"isbn": "9780134190440", "patron_id": "p_b"}}}).to_string())
            .await;
    });
    task_a.await.unwrap();
    task_b.await.unwrap();

    let first = next_frame(&mut read).await;
    let second = next_frame(&mut read).await;
    let errors: Vec<&Value> = [&first, &second].into_iter().filter(|r| !r["error"].is_null()).collect();
    let successes: Vec<&Value> = [&first, &second].into_iter().filter(|r| r["error"].is_null()).collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"]["code"], -32003);

    let book = BookRepo::get_by_isbn(store.pool(), "9780134190440").await.unwrap().unwrap();
    assert_eq!(book.available_copies, 0);
}
