//! Stripe Checkout アダプター
//!
//! 決済セッションの作成・失効・照会（`CheckoutGateway`）と、
//! Webhook署名の検証（`WebhookVerifier`）を提供する。

mod checkout;
mod webhook;

pub use checkout::StripeCheckoutGateway;
pub use webhook::{StripeWebhookVerifier, sign_payload};
