//! 通知メッセージの文面
//!
//! イベントから送信テキストを組み立てる純粋関数群。

use crate::domain::{
    BookSaved, BorrowingCreated, BorrowingOverdue, FineAssessed, PaymentConfirmed, PaymentType,
    ReturnDueTomorrow,
};

pub fn borrowing_created(event: &BorrowingCreated) -> String {
    format!(
        "📚 New Borrowing:\n\
         Book: {}\n\
         Borrow date: {}\n\
         Expected return: {}\n\
         Book ID: {}\n\
         User ID: {}",
        event.book_title,
        event.borrow_date,
        event.expected_return_date,
        event.book_id,
        event.user_id
    )
}

pub fn book_saved(event: &BookSaved) -> String {
    let heading = if event.created {
        "📚 New Book Added:"
    } else {
        "✏️ Book Updated:"
    };
    let book = &event.book;

    format!(
        "{}\n\
         Title: {}\n\
         Author: {}\n\
         Cover: {}\n\
         Inventory: {}\n\
         Daily Fee: ${}",
        heading,
        book.title,
        book.author,
        book.cover.label(),
        book.inventory,
        book.daily_fee
    )
}

pub fn return_due_tomorrow(event: &ReturnDueTomorrow) -> String {
    format!(
        "📚 Reminder: Your book '{}' is due tomorrow!\n\
         Please return it to the library by {}.",
        event.book_title, event.expected_return_date
    )
}

pub fn borrowing_overdue(event: &BorrowingOverdue) -> String {
    format!(
        "⚠️ Overdue Notice: Your book '{}' is overdue!\n\
         It was due on {}.\n\
         Please return it to the library as soon as possible.",
        event.book_title, event.expected_return_date
    )
}

pub fn payment_confirmed(event: &PaymentConfirmed) -> String {
    let what = match event.payment_type {
        PaymentType::Payment => "Payment",
        PaymentType::Fine => "Fine payment",
    };
    format!(
        "✅ {} received: ${} for Borrowing ID {}.",
        what, event.amount, event.borrowing_id
    )
}

pub fn fine_assessed(event: &FineAssessed) -> String {
    format!(
        "⚠️ A fine of ${} was assessed for Borrowing ID {} ({} days overdue).\n\
         Pay here: {}",
        event.amount, event.borrowing_id, event.overdue_days, event.session_url
    )
}
