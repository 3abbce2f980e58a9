mod checkout;
mod errors;
mod reconciliation;

pub use checkout::{RequestContext, expire_session_quietly, open_checkout_session};
pub use errors::{PaymentApplicationError, Result};
pub use reconciliation::{
    CHECKOUT_COMPLETED, ReconcileOutcome, confirm_checkout_success, reconcile_webhook,
    settle_session,
};
