use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusty_library_rental::api::extractor::USER_ID_HEADER;
use rusty_library_rental::api::handlers::{AppState, STRIPE_SIGNATURE_HEADER};
use rusty_library_rental::api::router::create_router;
use rusty_library_rental::api::types::*;
use rusty_library_rental::application::payment::{self, RequestContext};
use rusty_library_rental::domain::{PaymentStatus, PaymentType, User};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::{TestLibrary, days_from, fee, signed_checkout_completed, today};

// ============================================================================
// E2Eテスト用のヘルパー関数
// ============================================================================

/// E2Eテスト用のアプリケーションセットアップ
///
/// インメモリのストレージとモックの決済ゲートウェイで実際のAPIルーターを組み立てる。
fn setup_e2e_app(app: &TestLibrary, public_base_url: Option<&str>) -> axum::Router {
    let app_state = Arc::new(AppState {
        service_deps: app.deps.clone(),
        public_base_url: public_base_url.map(|url| RequestContext::parse(url).unwrap()),
    });

    create_router(app_state)
}

fn request(method: &str, uri: &str, user: Option<&User>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "library.test");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.user_id.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// E2Eテスト: 正常系フロー
// ============================================================================

#[tokio::test]
async fn test_e2e_health_check() {
    let app = TestLibrary::new();
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_e2e_full_borrowing_flow() {
    // Arrange
    let app = TestLibrary::new();
    let book = app.add_book(2, "2.00");
    let user = app.add_user(Some(1));
    let router = setup_e2e_app(&app, None);

    // Step 1: 貸出作成（POST /borrowings）
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book": book.book_id.value(),
                "expected_return_date": days_from(today(), 5),
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created: BorrowingCreatedResponse = read_json(response).await;
    assert_eq!(created.book.id, book.book_id.value());
    assert_eq!(created.book.inventory, 1);
    assert_eq!(created.borrow_date, today());
    assert_eq!(created.payments.len(), 1);
    assert_eq!(created.payments[0].status, PaymentStatus::Pending);
    assert_eq!(created.payments[0].payment_type, PaymentType::Payment);
    assert_eq!(created.payments[0].money_to_pay, fee("10.00"));

    // Hostヘッダーからコールバックの戻り先が組み立てられる
    assert_eq!(
        app.gateway.requests()[0].success_url,
        format!("http://library.test/borrowings/{}", created.id)
    );

    // Step 2: Webhookで支払い確定（POST /payments/webhook）
    let (payload, signature) = signed_checkout_completed(&created.payments[0].session_id);
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header(STRIPE_SIGNATURE_HEADER, signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let status: PaymentStatusResponse = read_json(response).await;
    assert_eq!(status.detail, "Payment confirmed");

    // Step 3: 貸出詳細（GET /borrowings/:id）
    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/borrowings/{}", created.id),
            Some(&user),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let detail: BorrowingDetailResponse = read_json(response).await;
    assert!(detail.is_paid);
    assert!(detail.actual_return_date.is_none());
    assert_eq!(detail.payments[0].status, PaymentStatus::Paid);

    // Step 4: 返却（POST /borrowings/:id/return）
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/borrowings/{}/return", created.id),
            Some(&user),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.library.inventory_of(book.book_id), Some(2));

    // Step 5: 返却済みの一覧（GET /borrowings?is_active=false）
    let response = router
        .oneshot(request(
            "GET",
            "/borrowings?is_active=false",
            Some(&user),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let list: Vec<BorrowingSummaryResponse> = read_json(response).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, created.id);
    assert_eq!(list[0].actual_return_date, Some(today()));
    assert_eq!(list[0].book_title, book.title);
}

#[tokio::test]
async fn test_e2e_catalog_management() {
    let app = TestLibrary::new();
    let staff = app.add_staff();
    let reader = app.add_user(None);
    let router = setup_e2e_app(&app, None);

    // スタッフが登録する
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/books",
            Some(&staff),
            Some(json!({
                "title": "Dune",
                "author": "Frank Herbert",
                "cover": "HARD",
                "inventory": 3,
                "daily_fee": "1.25",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: BookResponse = read_json(response).await;
    assert_eq!(created.daily_fee, fee("1.25"));

    // 一般利用者は更新できない
    let response = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/books/{}", created.id),
            Some(&reader),
            Some(json!({ "inventory": 10 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // スタッフは部分更新できる
    let response = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/books/{}", created.id),
            Some(&staff),
            Some(json!({ "inventory": 10 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: BookResponse = read_json(response).await;
    assert_eq!(updated.inventory, 10);
    assert_eq!(updated.title, "Dune");

    // 大文字小文字を区別しない部分一致で検索できる
    let response = router
        .oneshot(request("GET", "/books?title=dun", Some(&reader), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let books: Vec<BookResponse> = read_json(response).await;
    assert_eq!(books, vec![updated]);
}

#[tokio::test]
async fn test_e2e_staff_assesses_fine() {
    let app = TestLibrary::new();
    let book = app.add_book(0, "3.00");
    let staff = app.add_staff();
    let reader = app.add_user(None);
    let seeded = app.add_borrowing(&book, &reader, days_from(today(), -10), days_from(today(), -4));
    let router = setup_e2e_app(&app, Some("https://library.example/api"));

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/borrowings/{}/fine", seeded.borrowing_id),
            Some(&reader),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/borrowings/{}/fine", seeded.borrowing_id),
            Some(&staff),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let fine: PaymentResponse = read_json(response).await;
    assert_eq!(fine.payment_type, PaymentType::Fine);
    assert_eq!(fine.money_to_pay, fee("24.00"));

    // 設定された公開ベースURLが優先される
    assert_eq!(
        app.gateway.requests()[0].cancel_url,
        "https://library.example/api/payments/cancel?session_id={CHECKOUT_SESSION_ID}"
    );

    // 支払い後に同じ延滞日をもう一度請求することはできない
    payment::settle_session(&app.deps, &fine.session_id)
        .await
        .unwrap();
    let response = router
        .oneshot(request(
            "POST",
            &format!("/borrowings/{}/fine", seeded.borrowing_id),
            Some(&staff),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.message, "All overdue days have already been fined.");
    assert_eq!(app.library.payments().len(), 1);
}

// ============================================================================
// E2Eテスト: エラーケース
// ============================================================================

#[tokio::test]
async fn test_e2e_missing_user_header_is_unauthenticated() {
    let app = TestLibrary::new();
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request("GET", "/borrowings", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error, "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_e2e_borrow_with_past_return_date() {
    let app = TestLibrary::new();
    let book = app.add_book(1, "1.00");
    let user = app.add_user(None);
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book_id": book.book_id.value(),
                "expected_return_date": today(),
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error, "VALIDATION_ERROR");
    assert_eq!(
        error.message,
        "The return date must be later than the borrowing date."
    );
    assert_eq!(app.library.inventory_of(book.book_id), Some(1));
}

#[tokio::test]
async fn test_e2e_borrow_beyond_payable_amount() {
    let app = TestLibrary::new();
    let book = app.add_book(1, "100.00");
    let user = app.add_user(None);
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book_id": book.book_id.value(),
                "expected_return_date": days_from(today(), 1_000_001),
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error, "VALIDATION_ERROR");
    assert!(app.gateway.requests().is_empty());
    assert_eq!(app.library.inventory_of(book.book_id), Some(1));
}

#[tokio::test]
async fn test_e2e_borrow_out_of_stock() {
    let app = TestLibrary::new();
    let book = app.add_book(0, "1.00");
    let user = app.add_user(None);
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book_id": book.book_id.value(),
                "expected_return_date": days_from(today(), 3),
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.message, "This book is currently not available.");
    assert!(app.library.payments().is_empty());
}

#[tokio::test]
async fn test_e2e_gateway_outage_is_bad_gateway() {
    let app = TestLibrary::new();
    let book = app.add_book(1, "1.00");
    let user = app.add_user(None);
    app.gateway.set_failing(true);
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book_id": book.book_id.value(),
                "expected_return_date": days_from(today(), 3),
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.library.borrowing_count(), 0);
    assert_eq!(app.library.inventory_of(book.book_id), Some(1));
}

#[tokio::test]
async fn test_e2e_other_users_borrowing_is_not_found() {
    let app = TestLibrary::new();
    let book = app.add_book(1, "1.00");
    let owner = app.add_user(None);
    let stranger = app.add_user(None);
    let seeded = app.add_borrowing(&book, &owner, today(), days_from(today(), 3));
    let router = setup_e2e_app(&app, None);

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/borrowings/{}", seeded.borrowing_id),
            Some(&stranger),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/borrowings/{}/return", seeded.borrowing_id),
            Some(&stranger),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.library.borrowing(seeded.borrowing_id).unwrap().is_active());
}

#[tokio::test]
async fn test_e2e_webhook_with_bad_signature() {
    let app = TestLibrary::new();
    let router = setup_e2e_app(&app, None);
    let (payload, _) = signed_checkout_completed("cs_test_1");

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=deadbeef")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error, "INVALID_WEBHOOK");
}

// ============================================================================
// E2Eテスト: 決済リダイレクト
// ============================================================================

#[tokio::test]
async fn test_e2e_payment_success_requires_session_id() {
    let app = TestLibrary::new();
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request("GET", "/payments/success", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.message, "Session ID is required");
}

#[tokio::test]
async fn test_e2e_payment_success_confirms_paid_session() {
    let app = TestLibrary::new();
    let book = app.add_book(1, "1.00");
    let user = app.add_user(None);
    let router = setup_e2e_app(&app, None);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/borrowings",
            Some(&user),
            Some(json!({
                "book_id": book.book_id.value(),
                "expected_return_date": days_from(today(), 2),
            })),
        ))
        .await
        .unwrap();
    let created: BorrowingCreatedResponse = read_json(response).await;
    let session_id = created.payments[0].session_id.clone();

    // 未払いのうちは確定しない
    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/payments/success?session_id={}", session_id),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.gateway.mark_paid(&session_id);
    let response = router
        .oneshot(request(
            "GET",
            &format!("/payments/success?session_id={}", session_id),
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let status: PaymentStatusResponse = read_json(response).await;
    assert_eq!(status.detail, "Payment completed successfully");
    assert_eq!(status.session_id.as_deref(), Some(session_id.as_str()));
    assert!(app.library.payments()[0].is_paid());
}

#[tokio::test]
async fn test_e2e_payment_cancel() {
    let app = TestLibrary::new();
    let router = setup_e2e_app(&app, None);

    let response = router
        .oneshot(request(
            "GET",
            "/payments/cancel?session_id=cs_test_9",
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let status: PaymentStatusResponse = read_json(response).await;
    assert_eq!(
        status.detail,
        "Payment was cancelled. You can pay later within 24 hours."
    );
    assert_eq!(status.session_id.as_deref(), Some("cs_test_9"));
}
