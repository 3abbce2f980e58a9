use crate::application::payment::{RequestContext, expire_session_quietly, open_checkout_session};
use crate::application::{FinePolicy, ServiceDependencies};
use crate::domain::{
    self, Book, BookId, Borrowing, BorrowingCreated, BorrowingId, Charge, FineAssessed,
    LibraryEvent, Payment, PaymentType, commands::*,
};
use crate::ports::{Closure, FineRecording, NewFine, Reservation};
use chrono::{DateTime, Utc};

use super::errors::{BorrowingApplicationError, Result};

/// 貸出と、その書籍・支払い一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingDetail {
    pub borrowing: Borrowing,
    pub book: Book,
    pub payments: Vec<Payment>,
}

/// 返却結果（ポリシーにより延滞料金の支払いを伴う）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedBorrowing {
    pub borrowing: Borrowing,
    pub fine: Option<Payment>,
}

async fn load_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.books
        .get_by_id(book_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?
        .ok_or(BorrowingApplicationError::BookNotFound)
}

async fn load_borrowing(
    deps: &ServiceDependencies,
    borrowing_id: BorrowingId,
) -> Result<Borrowing> {
    deps.borrowings
        .get_by_id(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?
        .ok_or(BorrowingApplicationError::BorrowingNotFound)
}

/// 書籍を借りる
///
/// 処理順序：
/// 1. 検証（リクエスト文脈・書籍の存在・返却予定日・在庫）
/// 2. 決済セッションを開く（失敗したら何も保存しない）
/// 3. 在庫の条件付き減算・貸出・支払いを1トランザクションで保存
/// 4. コミット後に`BorrowingCreated`を発行
///
/// 3で在庫が尽きていた場合（同時貸出に負けた場合）や保存に失敗した場合は、
/// 開いたセッションを失効させてからエラーを返す。
pub async fn borrow_book(
    deps: &ServiceDependencies,
    cmd: BorrowBook,
    context: Option<&RequestContext>,
    now: DateTime<Utc>,
) -> Result<BorrowingDetail> {
    let context = context.ok_or(BorrowingApplicationError::MissingRequestContext)?;
    let book = load_book(deps, cmd.book_id).await?;

    let borrowing = domain::borrowing::borrow_book(
        &book,
        cmd.user_id,
        cmd.borrow_date,
        cmd.expected_return_date,
    )?;

    let payment = open_checkout_session(
        deps.checkout_gateway.as_ref(),
        &book,
        &borrowing,
        context,
        Charge::Rental,
        now,
    )
    .await?;

    match deps
        .borrowings
        .create_with_payment(&borrowing, &payment)
        .await
    {
        Ok(Reservation::Reserved) => {}
        Ok(Reservation::OutOfStock) => {
            tracing::info!(book_id = %book.book_id, "lost the race for the last copy");
            expire_session_quietly(deps.checkout_gateway.as_ref(), &payment.session_id).await;
            return Err(BorrowingApplicationError::BookNotAvailable);
        }
        Ok(Reservation::InvalidReturnWindow) => {
            expire_session_quietly(deps.checkout_gateway.as_ref(), &payment.session_id).await;
            return Err(BorrowingApplicationError::ReturnDateNotAfterBorrowDate);
        }
        Err(e) => {
            expire_session_quietly(deps.checkout_gateway.as_ref(), &payment.session_id).await;
            return Err(BorrowingApplicationError::RepositoryError(e));
        }
    }

    tracing::info!(
        borrowing_id = %borrowing.borrowing_id,
        book_id = %book.book_id,
        user_id = %borrowing.user_id,
        "borrowing created"
    );

    deps.notifier.publish(LibraryEvent::BorrowingCreated(BorrowingCreated {
        borrowing_id: borrowing.borrowing_id,
        book_id: book.book_id,
        book_title: book.title.clone(),
        user_id: borrowing.user_id,
        borrow_date: borrowing.borrow_date,
        expected_return_date: borrowing.expected_return_date,
    }));

    let book = Book {
        inventory: book.inventory.saturating_sub(1),
        ..book
    };

    Ok(BorrowingDetail {
        borrowing,
        book,
        payments: vec![payment],
    })
}

/// 書籍を返却する
///
/// 所有者以外からの返却は、存在しない貸出と同じく`BorrowingNotFound`。
/// `FinePolicy::OnReturn`で未請求の延滞日がある場合のみ、その日数分の決済セッションを開き
/// 返却と同じトランザクションで保存する。
pub async fn return_book(
    deps: &ServiceDependencies,
    cmd: ReturnBorrowing,
    context: Option<&RequestContext>,
    now: DateTime<Utc>,
) -> Result<ReturnedBorrowing> {
    let borrowing = load_borrowing(deps, cmd.borrowing_id).await?;
    if !borrowing.is_owned_by(cmd.user_id) {
        return Err(BorrowingApplicationError::BorrowingNotFound);
    }

    let mut returned = domain::borrowing::return_borrowing(&borrowing, cmd.returned_on)?;
    let overdue_days = domain::borrowing::unfined_overdue_days(&returned, cmd.returned_on);

    let fine = if deps.fine_policy == FinePolicy::OnReturn && overdue_days > 0 {
        let context = context.ok_or(BorrowingApplicationError::MissingRequestContext)?;
        let book = load_book(deps, returned.book_id).await?;
        Some(
            open_checkout_session(
                deps.checkout_gateway.as_ref(),
                &book,
                &returned,
                context,
                Charge::Fine { overdue_days },
                now,
            )
            .await?,
        )
    } else {
        None
    };

    let fined_days_after = borrowing.fined_days.saturating_add(overdue_days);
    let closure = deps
        .borrowings
        .close(
            returned.borrowing_id,
            cmd.returned_on,
            fine.as_ref().map(|payment| NewFine {
                payment,
                fined_days_before: borrowing.fined_days,
                fined_days_after,
            }),
        )
        .await;

    let failure = match closure {
        Ok(Closure::Closed) => None,
        Ok(Closure::AlreadyReturned) => Some(BorrowingApplicationError::AlreadyReturned),
        Ok(Closure::FinesChanged) => Some(BorrowingApplicationError::FineConflict),
        Err(e) => Some(BorrowingApplicationError::RepositoryError(e)),
    };
    if let Some(err) = failure {
        if let Some(fine) = &fine {
            expire_session_quietly(deps.checkout_gateway.as_ref(), &fine.session_id).await;
        }
        return Err(err);
    }

    tracing::info!(
        borrowing_id = %returned.borrowing_id,
        overdue_days,
        fined = fine.is_some(),
        "borrowing returned"
    );

    if let Some(fine) = &fine {
        returned.fined_days = fined_days_after;
        publish_fine(deps, &returned, fine, overdue_days);
    }

    Ok(ReturnedBorrowing {
        borrowing: returned,
        fine,
    })
}

/// 延滞料金を請求する（スタッフ操作）
///
/// 延滞日数は返却済みなら実返却日、未返却なら`as_of`を基準に数え、
/// 請求済みの日数を除いた分だけを請求する。
/// 未払いの延滞料金が既にある場合は重複して請求しない。
/// 検査と保存はストレージで原子的に行い、同時請求は1件だけが通る。
pub async fn assess_fine(
    deps: &ServiceDependencies,
    cmd: AssessFine,
    context: &RequestContext,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let borrowing = load_borrowing(deps, cmd.borrowing_id).await?;
    let overdue_days = domain::borrowing::assess_overdue(&borrowing, cmd.as_of)?;

    let existing = deps
        .payments
        .find_by_borrowing(borrowing.borrowing_id)
        .await
        .map_err(BorrowingApplicationError::RepositoryError)?;
    if existing
        .iter()
        .any(|p| p.payment_type == PaymentType::Fine && !p.is_paid())
    {
        return Err(BorrowingApplicationError::FineAlreadyPending);
    }

    let book = load_book(deps, borrowing.book_id).await?;
    let fine = open_checkout_session(
        deps.checkout_gateway.as_ref(),
        &book,
        &borrowing,
        context,
        Charge::Fine { overdue_days },
        now,
    )
    .await?;

    let recording = deps
        .borrowings
        .add_fine(
            borrowing.borrowing_id,
            NewFine {
                payment: &fine,
                fined_days_before: borrowing.fined_days,
                fined_days_after: borrowing.fined_days.saturating_add(overdue_days),
            },
        )
        .await;

    let failure = match recording {
        Ok(FineRecording::Recorded) => None,
        Ok(FineRecording::PendingFineExists) => Some(BorrowingApplicationError::FineAlreadyPending),
        Ok(FineRecording::FinesChanged) => Some(BorrowingApplicationError::FineConflict),
        Err(e) => Some(BorrowingApplicationError::RepositoryError(e)),
    };
    if let Some(err) = failure {
        expire_session_quietly(deps.checkout_gateway.as_ref(), &fine.session_id).await;
        return Err(err);
    }

    tracing::info!(
        borrowing_id = %borrowing.borrowing_id,
        overdue_days,
        amount = %fine.money_to_pay,
        "fine assessed"
    );
    publish_fine(deps, &borrowing, &fine, overdue_days);

    Ok(fine)
}

fn publish_fine(
    deps: &ServiceDependencies,
    borrowing: &Borrowing,
    fine: &Payment,
    overdue_days: u32,
) {
    deps.notifier.publish(LibraryEvent::FineAssessed(FineAssessed {
        borrowing_id: borrowing.borrowing_id,
        user_id: borrowing.user_id,
        overdue_days,
        amount: fine.money_to_pay,
        session_url: fine.session_url.clone(),
    }));
}
