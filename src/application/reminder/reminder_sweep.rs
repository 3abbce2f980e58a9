use crate::application::ServiceDependencies;
use crate::domain::{BorrowingOverdue, LibraryEvent, ReturnDueTomorrow};
use crate::ports::PortError;
use chrono::{Days, NaiveDate};

/// 1回のスイープで発行した通知の件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub due_tomorrow: usize,
    pub overdue: usize,
}

/// 返却リマインドのスイープ
///
/// 未返却かつ通知先のある利用者の貸出について：
/// - 返却予定日が明日 → 前日リマインド
/// - 返却予定日が今日より前 → 延滞通知（毎日繰り返す）
pub async fn run_reminder_sweep(
    deps: &ServiceDependencies,
    today: NaiveDate,
) -> Result<SweepReport, PortError> {
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or("date out of range")?;

    let due = deps.borrowings.find_due_on(tomorrow).await?;
    let overdue = deps.borrowings.find_overdue_as_of(today).await?;

    let report = SweepReport {
        due_tomorrow: due.len(),
        overdue: overdue.len(),
    };

    for candidate in due {
        deps.notifier
            .publish(LibraryEvent::ReturnDueTomorrow(ReturnDueTomorrow {
                borrowing_id: candidate.borrowing_id,
                chat_id: candidate.chat_id,
                book_title: candidate.book_title,
                expected_return_date: candidate.expected_return_date,
            }));
    }

    for candidate in overdue {
        deps.notifier
            .publish(LibraryEvent::BorrowingOverdue(BorrowingOverdue {
                borrowing_id: candidate.borrowing_id,
                chat_id: candidate.chat_id,
                book_title: candidate.book_title,
                expected_return_date: candidate.expected_return_date,
            }));
    }

    tracing::info!(
        %today,
        due_tomorrow = report.due_tomorrow,
        overdue = report.overdue,
        "reminder sweep finished"
    );

    Ok(report)
}
