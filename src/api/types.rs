use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::borrowing::BorrowingDetail;
use crate::domain::{
    Book, BookChanges, BookId, CoverType, Payment, PaymentStatus, PaymentType, UserId,
    commands::{AddBook, BorrowBook},
};
use crate::ports::{BookFilter, BorrowingSummary};

// ============================================================================
// Requests
// ============================================================================

/// 書籍登録リクエスト（POST /books）
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: u32,
    pub daily_fee: Decimal,
}

impl CreateBookRequest {
    pub fn to_command(&self) -> AddBook {
        AddBook {
            title: self.title.clone(),
            author: self.author.clone(),
            cover: self.cover,
            inventory: self.inventory,
            daily_fee: self.daily_fee,
        }
    }
}

/// 書籍更新リクエスト（PUT /books/:id）。省略したフィールドは変更しない
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover: Option<CoverType>,
    pub inventory: Option<u32>,
    pub daily_fee: Option<Decimal>,
}

impl From<UpdateBookRequest> for BookChanges {
    fn from(req: UpdateBookRequest) -> Self {
        BookChanges {
            title: req.title,
            author: req.author,
            cover: req.cover,
            inventory: req.inventory,
            daily_fee: req.daily_fee,
        }
    }
}

/// 書籍一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover: Option<CoverType>,
}

impl From<ListBooksQuery> for BookFilter {
    fn from(query: ListBooksQuery) -> Self {
        BookFilter {
            title: query.title.filter(|t| !t.is_empty()),
            author: query.author.filter(|a| !a.is_empty()),
            cover: query.cover,
        }
    }
}

/// 貸出作成リクエスト（POST /borrowings）
#[derive(Debug, Deserialize)]
pub struct CreateBorrowingRequest {
    #[serde(alias = "book")]
    pub book_id: Uuid,
    pub expected_return_date: NaiveDate,
}

impl CreateBorrowingRequest {
    pub fn to_command(&self, user_id: UserId, today: NaiveDate) -> BorrowBook {
        BorrowBook {
            book_id: BookId::from_uuid(self.book_id),
            user_id,
            borrow_date: today,
            expected_return_date: self.expected_return_date,
        }
    }
}

/// 貸出一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListBorrowingsQuery {
    /// trueで未返却のみ、falseで返却済みのみ
    pub is_active: Option<bool>,
    /// 全利用者分（スーパーユーザーのみ有効）
    #[serde(default)]
    pub all: bool,
}

/// 決済リダイレクトのクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: u32,
    pub daily_fee: Decimal,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            title: book.title,
            author: book.author,
            cover: book.cover,
            inventory: book.inventory,
            daily_fee: book.daily_fee,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub borrowing_id: Uuid,
    pub status: PaymentStatus,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub session_url: String,
    pub session_id: String,
    pub money_to_pay: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.payment_id.value(),
            borrowing_id: payment.borrowing_id.value(),
            status: payment.status,
            payment_type: payment.payment_type,
            session_url: payment.session_url,
            session_id: payment.session_id,
            money_to_pay: payment.money_to_pay,
            created_at: payment.created_at,
        }
    }
}

/// 貸出作成レスポンス（POST /borrowings）
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingCreatedResponse {
    pub id: Uuid,
    pub book: BookResponse,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub payments: Vec<PaymentResponse>,
}

impl From<BorrowingDetail> for BorrowingCreatedResponse {
    fn from(detail: BorrowingDetail) -> Self {
        Self {
            id: detail.borrowing.borrowing_id.value(),
            book: detail.book.into(),
            borrow_date: detail.borrowing.borrow_date,
            expected_return_date: detail.borrowing.expected_return_date,
            payments: detail.payments.into_iter().map(Into::into).collect(),
        }
    }
}

/// 貸出一覧の1件（GET /borrowings）
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingSummaryResponse {
    pub id: Uuid,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book_title: String,
}

impl From<BorrowingSummary> for BorrowingSummaryResponse {
    fn from(summary: BorrowingSummary) -> Self {
        Self {
            id: summary.borrowing.borrowing_id.value(),
            borrow_date: summary.borrowing.borrow_date,
            expected_return_date: summary.borrowing.expected_return_date,
            actual_return_date: summary.borrowing.actual_return_date,
            book_title: summary.book_title,
        }
    }
}

/// 貸出詳細（GET /borrowings/:id）
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingDetailResponse {
    pub id: Uuid,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub is_paid: bool,
    pub book: BookResponse,
    pub payments: Vec<PaymentResponse>,
}

impl From<BorrowingDetail> for BorrowingDetailResponse {
    fn from(detail: BorrowingDetail) -> Self {
        Self {
            id: detail.borrowing.borrowing_id.value(),
            borrow_date: detail.borrowing.borrow_date,
            expected_return_date: detail.borrowing.expected_return_date,
            actual_return_date: detail.borrowing.actual_return_date,
            is_paid: detail.borrowing.is_paid,
            book: detail.book.into(),
            payments: detail.payments.into_iter().map(Into::into).collect(),
        }
    }
}

/// 決済リダイレクト・Webhookの応答
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl PaymentStatusResponse {
    pub fn new(detail: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            detail: detail.into(),
            session_id,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
