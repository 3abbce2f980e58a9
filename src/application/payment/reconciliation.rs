use crate::application::ServiceDependencies;
use crate::domain::{LibraryEvent, Payment, PaymentConfirmed};
use crate::ports::{SignatureError, Settlement};
use serde::Deserialize;

use super::errors::{PaymentApplicationError, Result};

/// 支払い確定を起こすWebhookイベント種別
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
struct WebhookEventData {
    object: serde_json::Value,
}

/// 照合処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// PENDING → PAID に遷移した
    Confirmed {
        payment: Payment,
        borrowing_newly_paid: bool,
    },
    /// 既に確定済み（再送）
    AlreadyPaid,
    /// 対応する支払いがない
    UnknownSession,
    /// 対象外のイベント種別
    Ignored { event_type: String },
}

/// 決済サービスからのWebhookを検証し、支払いを確定する
///
/// 署名が無効ならいかなる状態も変更しない。
/// 同じセッションの再送は何もせず`AlreadyPaid`を返す。
pub async fn reconcile_webhook(
    deps: &ServiceDependencies,
    payload: &[u8],
    signature_header: Option<&str>,
) -> Result<ReconcileOutcome> {
    let signature_header = signature_header.ok_or(SignatureError::MalformedHeader)?;
    deps.webhook_verifier.verify(payload, signature_header)?;

    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentApplicationError::MalformedPayload(e.to_string()))?;

    if event.event_type != CHECKOUT_COMPLETED {
        tracing::debug!(event_type = %event.event_type, "webhook event ignored");
        return Ok(ReconcileOutcome::Ignored {
            event_type: event.event_type,
        });
    }

    let session_id = event
        .data
        .object
        .get("id")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            PaymentApplicationError::MalformedPayload("missing checkout session id".to_string())
        })?;

    settle_session(deps, session_id).await
}

/// 支払い成功リダイレクトを処理する
///
/// リダイレクトは偽装できるため、決済サービスに支払い済みか問い合わせてから確定する。
pub async fn confirm_checkout_success(
    deps: &ServiceDependencies,
    session_id: &str,
) -> Result<ReconcileOutcome> {
    let payment = deps
        .payments
        .find_by_session_id(session_id)
        .await
        .map_err(PaymentApplicationError::RepositoryError)?
        .ok_or(PaymentApplicationError::PaymentSessionNotFound)?;

    if payment.is_paid() {
        return Ok(ReconcileOutcome::AlreadyPaid);
    }

    let paid = deps
        .checkout_gateway
        .is_session_paid(session_id)
        .await
        .map_err(PaymentApplicationError::GatewayError)?;

    if !paid {
        return Err(PaymentApplicationError::PaymentNotCompleted);
    }

    settle_session(deps, session_id).await
}

/// セッションIDの支払いを確定し、遷移した場合のみ通知を発行する
pub async fn settle_session(
    deps: &ServiceDependencies,
    session_id: &str,
) -> Result<ReconcileOutcome> {
    let settlement = deps
        .payments
        .settle(session_id)
        .await
        .map_err(PaymentApplicationError::RepositoryError)?;

    match settlement {
        Settlement::Settled {
            payment,
            borrowing_newly_paid,
        } => {
            tracing::info!(
                session_id,
                borrowing_id = %payment.borrowing_id,
                borrowing_newly_paid,
                "payment settled"
            );
            publish_confirmation(deps, &payment).await;

            Ok(ReconcileOutcome::Confirmed {
                payment,
                borrowing_newly_paid,
            })
        }
        Settlement::AlreadyPaid => {
            tracing::debug!(session_id, "payment already settled");
            Ok(ReconcileOutcome::AlreadyPaid)
        }
        Settlement::UnknownSession => {
            tracing::warn!(session_id, "no payment matches checkout session");
            Ok(ReconcileOutcome::UnknownSession)
        }
    }
}

// 確定はコミット済みのため、ここでの失敗は通知を諦めるだけ
async fn publish_confirmation(deps: &ServiceDependencies, payment: &Payment) {
    match deps.borrowings.get_by_id(payment.borrowing_id).await {
        Ok(Some(borrowing)) => {
            deps.notifier
                .publish(LibraryEvent::PaymentConfirmed(PaymentConfirmed {
                    borrowing_id: payment.borrowing_id,
                    user_id: borrowing.user_id,
                    payment_type: payment.payment_type,
                    amount: payment.money_to_pay,
                }))
        }
        Ok(None) => tracing::warn!(
            borrowing_id = %payment.borrowing_id,
            "settled payment references a missing borrowing"
        ),
        Err(e) => tracing::warn!(
            borrowing_id = %payment.borrowing_id,
            error = %e,
            "failed to load borrowing for payment notification"
        ),
    }
}
