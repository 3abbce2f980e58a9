use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Borrowing, BorrowingId, ChargeError, PaymentId, SettlePaymentError};

/// 延滞料金の倍率（日額料金 × 延滞日数 × 倍率）
pub const FINE_MULTIPLIER: u32 = 2;

/// 1回の支払いで請求できる上限額 99,999,999.99（payments.money_to_pay の NUMERIC(10, 2) に合わせる）
pub const MAX_PAYMENT_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// 支払いステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// 支払い種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    /// 貸出料金
    Payment,
    /// 延滞料金
    Fine,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Payment => "PAYMENT",
            PaymentType::Fine => "FINE",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(PaymentType::Payment),
            "FINE" => Ok(PaymentType::Fine),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

/// 請求の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// 貸出期間分の料金
    Rental,
    /// 延滞日数分の延滞料金
    Fine { overdue_days: u32 },
}

/// Payment - 1回の決済セッションに対応する請求
///
/// 金額は作成時に確定し、以後変更されない。
/// ステータスは PENDING → PAID の一方向のみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub borrowing_id: BorrowingId,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub session_url: String,
    pub session_id: String,
    pub money_to_pay: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// 純粋関数：請求金額と種別を計算する
///
/// - 貸出料金：日額料金 × (返却予定日 - 貸出日) の日数
/// - 延滞料金：日額料金 × 延滞日数 × FINE_MULTIPLIER
///
/// 十進固定小数点で計算し、負の日数は0として扱う。
/// MAX_PAYMENT_AMOUNT を超える金額は`ChargeError::AmountOutOfRange`。
pub fn compute_amount(
    daily_fee: Decimal,
    borrowing: &Borrowing,
    charge: Charge,
) -> Result<(Decimal, PaymentType), ChargeError> {
    let (amount, payment_type) = match charge {
        Charge::Rental => {
            let days = Decimal::from(borrowing.rental_days().max(0));
            (daily_fee.checked_mul(days), PaymentType::Payment)
        }
        Charge::Fine { overdue_days } => {
            let amount = daily_fee
                .checked_mul(Decimal::from(overdue_days))
                .and_then(|a| a.checked_mul(Decimal::from(FINE_MULTIPLIER)));
            (amount, PaymentType::Fine)
        }
    };

    match amount.map(|a| a.round_dp(2)) {
        Some(amount) if amount <= MAX_PAYMENT_AMOUNT => Ok((amount, payment_type)),
        _ => Err(ChargeError::AmountOutOfRange),
    }
}

/// 純粋関数：決済セッションに対応する未払いPaymentを作成する
pub fn open_payment(
    borrowing_id: BorrowingId,
    payment_type: PaymentType,
    money_to_pay: Decimal,
    session_id: String,
    session_url: String,
    created_at: DateTime<Utc>,
) -> Payment {
    Payment {
        payment_id: PaymentId::new(),
        borrowing_id,
        status: PaymentStatus::Pending,
        payment_type,
        session_url,
        session_id,
        money_to_pay,
        created_at,
    }
}

/// 純粋関数：支払いを確定する
pub fn settle_payment(payment: &Payment) -> Result<Payment, SettlePaymentError> {
    if payment.is_paid() {
        return Err(SettlePaymentError::AlreadyPaid);
    }

    Ok(Payment {
        status: PaymentStatus::Paid,
        ..payment.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookId, UserId};
    use chrono::{Duration, NaiveDate};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn borrowing_for_days(days: i64) -> Borrowing {
        let borrow_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Borrowing {
            borrowing_id: BorrowingId::new(),
            book_id: BookId::new(),
            user_id: UserId::new(),
            borrow_date,
            expected_return_date: borrow_date + Duration::days(days),
            actual_return_date: None,
            is_paid: false,
            fined_days: 0,
        }
    }

    // TDD: compute_amount() のテスト
    #[test]
    fn test_rental_amount_is_fee_times_days() {
        let (amount, payment_type) =
            compute_amount(dec("2.00"), &borrowing_for_days(5), Charge::Rental).unwrap();
        assert_eq!(amount, dec("10.00"));
        assert_eq!(payment_type, PaymentType::Payment);
    }

    #[test]
    fn test_fine_amount_is_fee_times_days_times_multiplier() {
        let (amount, payment_type) = compute_amount(
            dec("3.00"),
            &borrowing_for_days(7),
            Charge::Fine { overdue_days: 4 },
        )
        .unwrap();
        assert_eq!(amount, dec("24.00"));
        assert_eq!(payment_type, PaymentType::Fine);
    }

    #[test]
    fn test_rental_amount_has_no_float_drift() {
        let (amount, _) = compute_amount(dec("0.10"), &borrowing_for_days(3), Charge::Rental).unwrap();
        assert_eq!(amount, dec("0.30"));
    }

    #[test]
    fn test_rental_amount_never_negative() {
        let (amount, _) =
            compute_amount(dec("5.00"), &borrowing_for_days(-2), Charge::Rental).unwrap();
        assert_eq!(amount, Decimal::ZERO);
    }

    #[test]
    fn test_amount_above_storable_maximum_is_rejected() {
        assert_eq!(MAX_PAYMENT_AMOUNT, dec("99999999.99"));

        // 100.00 × 1,000,001日 = 100,000,100.00
        let result = compute_amount(dec("100.00"), &borrowing_for_days(1_000_001), Charge::Rental);
        assert_eq!(result, Err(ChargeError::AmountOutOfRange));

        let (amount, _) =
            compute_amount(dec("99.99"), &borrowing_for_days(1_000_000), Charge::Rental).unwrap();
        assert_eq!(amount, dec("99990000.00"));
    }

    // TDD: settle_payment() のテスト
    #[test]
    fn test_settle_payment_transitions_to_paid() {
        let payment = open_payment(
            BorrowingId::new(),
            PaymentType::Payment,
            dec("10.00"),
            "cs_test_1".to_string(),
            "https://checkout.example/cs_test_1".to_string(),
            Utc::now(),
        );
        assert_eq!(payment.status, PaymentStatus::Pending);

        let settled = settle_payment(&payment).unwrap();
        assert_eq!(settled.status, PaymentStatus::Paid);
        assert_eq!(settled.money_to_pay, payment.money_to_pay);
    }

    #[test]
    fn test_settle_payment_fails_when_already_paid() {
        let payment = open_payment(
            BorrowingId::new(),
            PaymentType::Fine,
            dec("4.00"),
            "cs_test_2".to_string(),
            "https://checkout.example/cs_test_2".to_string(),
            Utc::now(),
        );
        let settled = settle_payment(&payment).unwrap();

        assert_eq!(
            settle_payment(&settled).unwrap_err(),
            SettlePaymentError::AlreadyPaid
        );
    }

    #[test]
    fn test_status_and_type_parse_from_storage_strings() {
        assert_eq!(PaymentStatus::from_str("PAID").unwrap(), PaymentStatus::Paid);
        assert_eq!(PaymentType::from_str("FINE").unwrap(), PaymentType::Fine);
        assert!(PaymentStatus::from_str("REFUNDED").is_err());
    }
}
