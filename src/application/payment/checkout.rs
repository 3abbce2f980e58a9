use crate::domain::{
    Book, Borrowing, BorrowingId, Charge, Payment, PaymentType,
    payment::{compute_amount, open_payment},
};
use crate::ports::{CheckoutGateway, CheckoutRequest};
use chrono::{DateTime, Utc};
use url::Url;

use super::errors::{PaymentApplicationError, Result};

/// 決済サービスのコールバックURLを組み立てるためのリクエスト文脈
///
/// 公開ベースURL（末尾は必ず`/`）だけを保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    base_url: Url,
}

impl RequestContext {
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.set_query(None);
        base_url.set_fragment(None);
        Self { base_url }
    }

    pub fn parse(base_url: &str) -> std::result::Result<Self, url::ParseError> {
        Url::parse(base_url).map(Self::new)
    }

    /// プロキシ経由のリクエストヘッダーから文脈を作る（スキーム省略時はhttp）
    pub fn from_forwarded(
        proto: Option<&str>,
        host: &str,
    ) -> std::result::Result<Self, url::ParseError> {
        Self::parse(&format!("{}://{}/", proto.unwrap_or("http"), host))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// 支払い成功時の戻り先（貸出詳細）
    pub fn borrowing_detail_url(&self, borrowing_id: BorrowingId) -> String {
        format!("{}borrowings/{}", self.base_url, borrowing_id)
    }

    /// 支払いキャンセル時の戻り先
    ///
    /// `{CHECKOUT_SESSION_ID}` は決済サービス側で置換される。
    pub fn cancel_url(&self) -> String {
        format!(
            "{}payments/cancel?session_id={{CHECKOUT_SESSION_ID}}",
            self.base_url
        )
    }
}

fn describe(payment_type: PaymentType, borrowing_id: BorrowingId) -> String {
    match payment_type {
        PaymentType::Payment => format!("Payment for Borrowing ID {}", borrowing_id),
        PaymentType::Fine => format!("Fine for Borrowing ID {}", borrowing_id),
    }
}

/// 決済セッションを開き、対応する未払いPaymentを作る
///
/// Paymentの永続化は呼び出し側の責務。
/// 貸出作成・返却では同じトランザクションで保存し、単独の延滞料金請求では直接保存する。
/// 金額が上限を超える場合はゲートウェイを呼ばない。ゲートウェイが失敗した場合はPaymentを作らない。
pub async fn open_checkout_session(
    gateway: &dyn CheckoutGateway,
    book: &Book,
    borrowing: &Borrowing,
    context: &RequestContext,
    charge: Charge,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let (amount, payment_type) = compute_amount(book.daily_fee, borrowing, charge)
        .map_err(|_| PaymentApplicationError::AmountOutOfRange)?;

    let request = CheckoutRequest {
        description: describe(payment_type, borrowing.borrowing_id),
        amount,
        success_url: context.borrowing_detail_url(borrowing.borrowing_id),
        cancel_url: context.cancel_url(),
    };

    let session = gateway
        .create_session(&request)
        .await
        .map_err(PaymentApplicationError::GatewayError)?;

    tracing::info!(
        borrowing_id = %borrowing.borrowing_id,
        session_id = %session.session_id,
        payment_type = payment_type.as_str(),
        %amount,
        "checkout session opened"
    );

    Ok(open_payment(
        borrowing.borrowing_id,
        payment_type,
        amount,
        session.session_id,
        session.url,
        now,
    ))
}

/// ローカル保存に失敗したセッションを失効させる（失敗はログのみ）
pub async fn expire_session_quietly(gateway: &dyn CheckoutGateway, session_id: &str) {
    match gateway.expire_session(session_id).await {
        Ok(()) => tracing::info!(session_id, "orphaned checkout session expired"),
        Err(e) => tracing::warn!(session_id, error = %e, "failed to expire checkout session"),
    }
}
