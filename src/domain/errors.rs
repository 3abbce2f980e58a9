/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 返却予定日が貸出日以前
    ReturnDateNotAfterBorrowDate,
    /// 在庫がない
    BookNotAvailable,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 既に返却済み
    AlreadyReturned,
}

/// 延滞料金のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessFineError {
    /// 延滞していない
    NotOverdue,
    /// 延滞日数はすべて請求済み
    AlreadyFined,
}

/// 支払い状態遷移のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlePaymentError {
    /// 既に支払い済み（PAID → PAID は不可）
    AlreadyPaid,
}

/// 請求金額のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeError {
    /// 支払い金額の上限（MAX_PAYMENT_AMOUNT）を超える
    AmountOutOfRange,
}

/// 書籍データのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    EmptyTitle,
    EmptyAuthor,
    /// 日額料金が負
    NegativeDailyFee,
}
