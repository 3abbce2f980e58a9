use crate::application::{
    ServiceDependencies, borrowing, catalog,
    payment::{self, ReconcileOutcome, RequestContext},
};
use crate::domain::{
    BookId, BorrowingId,
    commands::{AssessFine, ReturnBorrowing, UpdateBook},
};
use crate::ports::BookFilter;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    extractor::{AuthenticatedUser, CallbackContext},
    types::{
        BookResponse, BorrowingCreatedResponse, BorrowingDetailResponse,
        BorrowingSummaryResponse, CreateBookRequest, CreateBorrowingRequest, ListBooksQuery,
        ListBorrowingsQuery, PaymentResponse, PaymentStatusResponse, SessionQuery,
        UpdateBookRequest,
    },
};

/// Stripeが署名を載せるヘッダー
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    /// 設定された公開ベースURL（なければリクエストヘッダーから組み立てる）
    pub public_base_url: Option<RequestContext>,
}

// ============================================================================
// Catalog
// ============================================================================

/// GET /books - 書籍一覧（title / author は部分一致、cover は完全一致）
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let filter = BookFilter::from(query);
    let books = catalog::list_books(&state.service_deps, &filter).await?;

    Ok(Json(books.into_iter().map(Into::into).collect()))
}

/// POST /books - 書籍を登録（スタッフのみ）
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    user.require_staff()?;

    let book = catalog::add_book(&state.service_deps, req.to_command()).await?;

    Ok((StatusCode::CREATED, Json(book.into())))
}

/// GET /books/:id - 書籍詳細
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = catalog::get_book(&state.service_deps, BookId::from_uuid(id)).await?;

    Ok(Json(book.into()))
}

/// PUT /books/:id - 書籍情報を更新（スタッフのみ）
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    user.require_staff()?;

    let cmd = UpdateBook {
        book_id: BookId::from_uuid(id),
        changes: req.into(),
    };
    let book = catalog::update_book(&state.service_deps, cmd).await?;

    Ok(Json(book.into()))
}

// ============================================================================
// Borrowings
// ============================================================================

/// POST /borrowings - 書籍を借りる
///
/// 貸出料金の決済セッションを開き、未払いの支払いとともに返す。
pub async fn create_borrowing(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    CallbackContext(context): CallbackContext,
    Json(req): Json<CreateBorrowingRequest>,
) -> Result<(StatusCode, Json<BorrowingCreatedResponse>), ApiError> {
    let now = Utc::now();
    let cmd = req.to_command(user.id(), now.date_naive());

    let detail = borrowing::borrow_book(&state.service_deps, cmd, context.as_ref(), now).await?;

    Ok((StatusCode::CREATED, Json(detail.into())))
}

/// GET /borrowings - 貸出一覧
///
/// `is_active`で未返却・返却済みを絞り込む。`all=true`はスーパーユーザーのみ有効。
pub async fn list_borrowings(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListBorrowingsQuery>,
) -> Result<Json<Vec<BorrowingSummaryResponse>>, ApiError> {
    let scope = if query.all {
        borrowing::ListScope::All
    } else {
        borrowing::ListScope::Own
    };

    let summaries =
        borrowing::list_borrowings(&state.service_deps, &user.0, scope, query.is_active).await?;

    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// GET /borrowings/:id - 貸出詳細
pub async fn get_borrowing(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BorrowingDetailResponse>, ApiError> {
    let detail =
        borrowing::get_borrowing(&state.service_deps, &user.0, BorrowingId::from_uuid(id)).await?;

    Ok(Json(detail.into()))
}

/// POST /borrowings/:id/return - 書籍を返却
pub async fn return_borrowing(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    CallbackContext(context): CallbackContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let now = Utc::now();
    let cmd = ReturnBorrowing {
        borrowing_id: BorrowingId::from_uuid(id),
        user_id: user.id(),
        returned_on: now.date_naive(),
    };

    borrowing::return_book(&state.service_deps, cmd, context.as_ref(), now).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /borrowings/:id/fine - 延滞料金を請求（スタッフのみ）
pub async fn assess_fine(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    CallbackContext(context): CallbackContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    user.require_staff()?;
    let context = context.ok_or(borrowing::BorrowingApplicationError::MissingRequestContext)?;

    let now = Utc::now();
    let cmd = AssessFine {
        borrowing_id: BorrowingId::from_uuid(id),
        as_of: now.date_naive(),
    };
    let fine = borrowing::assess_fine(&state.service_deps, cmd, &context, now).await?;

    Ok((StatusCode::CREATED, Json(fine.into())))
}

// ============================================================================
// Payments
// ============================================================================

/// POST /payments/webhook - 決済サービスからのWebhook
///
/// 認証ヘッダーではなく署名で検証する。未知のセッションは再送させないため200を返す。
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payment::reconcile_webhook(&state.service_deps, &body, signature).await?;

    let detail = match outcome {
        ReconcileOutcome::Confirmed { .. } => "Payment confirmed",
        ReconcileOutcome::AlreadyPaid => "Payment already confirmed",
        ReconcileOutcome::UnknownSession => "Unknown payment session",
        ReconcileOutcome::Ignored { .. } => "Event ignored",
    };

    Ok(Json(PaymentStatusResponse::new(detail, None)))
}

fn require_session_id(query: SessionQuery) -> Result<String, ApiError> {
    query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Session ID is required".to_string()))
}

/// GET /payments/success - 決済完了後のリダイレクト先
///
/// 決済サービスに支払い済みであることを確認してから確定する。
pub async fn payment_success(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let session_id = require_session_id(query)?;

    payment::confirm_checkout_success(&state.service_deps, &session_id).await?;

    Ok(Json(PaymentStatusResponse::new(
        "Payment completed successfully",
        Some(session_id),
    )))
}

/// GET /payments/cancel - 決済キャンセル時のリダイレクト先
pub async fn payment_cancel(
    Query(query): Query<SessionQuery>,
) -> Json<PaymentStatusResponse> {
    Json(PaymentStatusResponse::new(
        "Payment was cancelled. You can pay later within 24 hours.",
        query.session_id,
    ))
}
