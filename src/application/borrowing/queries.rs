use crate::application::ServiceDependencies;
use crate::domain::{BorrowingId, User};
use crate::ports::BorrowingSummary;

use super::borrowing_service::BorrowingDetail;
use super::errors::{BorrowingApplicationError, Result};

/// 一覧の対象範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListScope {
    /// 自分の貸出のみ
    #[default]
    Own,
    /// 全利用者の貸出（スーパーユーザーのみ有効）
    All,
}

/// 貸出一覧（貸出日の新しい順）
///
/// スーパーユーザー以外が`ListScope::All`を指定しても自分の貸出だけを返す。
pub async fn list_borrowings(
    deps: &ServiceDependencies,
    requester: &User,
    scope: ListScope,
    active: Option<bool>,
) -> Result<Vec<BorrowingSummary>> {
    let summaries = if scope == ListScope::All && requester.is_superuser {
        deps.borrowings.find_all(active).await
    } else {
        deps.borrowings.find_by_user(requester.user_id, active).await
    };

    summaries.map_err(BorrowingApplicationError::RepositoryError)
}

/// 貸出詳細
///
/// 所有者とスーパーユーザーのみ参照でき、それ以外は存在しない扱い。
pub async fn get_borrowing(
    deps: &ServiceDependencies,
    requester: &User,
    borrowing_id: BorrowingId,
) -> Result<BorrowingDetail> {
    let borrowing = deps
        .borrowings
        .get_by_id(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?
        .filter(|b| b.is_owned_by(requester.user_id) || requester.is_superuser)
        .ok_or(BorrowingApplicationError::BorrowingNotFound)?;

    let book = deps
        .books
        .get_by_id(borrowing.book_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?
        .ok_or(BorrowingApplicationError::BookNotFound)?;

    let payments = deps
        .payments
        .find_by_borrowing(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?;

    Ok(BorrowingDetail {
        borrowing,
        book,
        payments,
    })
}
