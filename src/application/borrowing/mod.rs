mod borrowing_service;
mod errors;
mod queries;

pub use borrowing_service::{
    BorrowingDetail, ReturnedBorrowing, assess_fine, borrow_book, return_book,
};
pub use errors::{BorrowingApplicationError, Result};
pub use queries::{ListScope, get_borrowing, list_borrowings};
