use crate::domain::borrowing::validate_return_window;
use crate::domain::payment::settle_payment;
use crate::domain::{Book, BookId, Borrowing, BorrowingId, Payment, PaymentType, User, UserId};
use crate::ports::{
    BookFilter, BookRepository, BorrowingRepository, BorrowingSummary, Closure, FineRecording,
    NewFine, PaymentRepository, ReminderCandidate, Reservation, Result, Settlement,
    UserDirectory,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    books: HashMap<BookId, Book>,
    borrowings: HashMap<BorrowingId, Borrowing>,
    payments: Vec<Payment>,
    users: HashMap<UserId, User>,
}

impl State {
    fn summarize(&self, borrowing: &Borrowing) -> BorrowingSummary {
        BorrowingSummary {
            borrowing: borrowing.clone(),
            book_title: self
                .books
                .get(&borrowing.book_id)
                .map(|b| b.title.clone())
                .unwrap_or_default(),
        }
    }

    fn summaries(&self, keep: impl Fn(&Borrowing) -> bool) -> Vec<BorrowingSummary> {
        let mut summaries: Vec<BorrowingSummary> = self
            .borrowings
            .values()
            .filter(|b| keep(b))
            .map(|b| self.summarize(b))
            .collect();
        summaries.sort_by(|a, b| b.borrowing.borrow_date.cmp(&a.borrowing.borrow_date));
        summaries
    }

    fn reminder_candidates(&self, keep: impl Fn(&Borrowing) -> bool) -> Vec<ReminderCandidate> {
        let mut candidates: Vec<ReminderCandidate> = self
            .borrowings
            .values()
            .filter(|b| b.is_active() && keep(b))
            .filter_map(|b| {
                let chat_id = self.users.get(&b.user_id)?.chat_id?;
                Some(ReminderCandidate {
                    borrowing_id: b.borrowing_id,
                    user_id: b.user_id,
                    chat_id,
                    book_title: self.summarize(b).book_title,
                    expected_return_date: b.expected_return_date,
                })
            })
            .collect();
        candidates.sort_by_key(|c| c.expected_return_date);
        candidates
    }

    fn session_taken(&self, session_id: &str) -> bool {
        self.payments.iter().any(|p| p.session_id == session_id)
    }

    fn ensure_new_session(&self, payment: &Payment) -> Result<()> {
        if self.session_taken(&payment.session_id) {
            return Err(format!("duplicate checkout session {}", payment.session_id).into());
        }
        Ok(())
    }

    fn has_pending_fine(&self, borrowing_id: BorrowingId) -> bool {
        self.payments.iter().any(|p| {
            p.borrowing_id == borrowing_id && p.payment_type == PaymentType::Fine && !p.is_paid()
        })
    }
}

/// 全ストレージポートのインメモリ実装
///
/// 1つのMutexの中で検査と更新を行うことで、PostgreSQL実装の
/// 条件付きUPDATEと同じ原子性を再現する。テストとローカル実行用。
#[derive(Default)]
pub struct InMemoryLibrary {
    state: Mutex<State>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_book(&self, book: Book) {
        self.state().books.insert(book.book_id, book);
    }

    pub fn seed_user(&self, user: User) {
        self.state().users.insert(user.user_id, user);
    }

    /// 任意の日付の貸出を直接登録する（在庫は変更しない）
    pub fn seed_borrowing(&self, borrowing: Borrowing) {
        self.state().borrowings.insert(borrowing.borrowing_id, borrowing);
    }

    pub fn inventory_of(&self, book_id: BookId) -> Option<u32> {
        self.state().books.get(&book_id).map(|b| b.inventory)
    }

    pub fn borrowing(&self, borrowing_id: BorrowingId) -> Option<Borrowing> {
        self.state().borrowings.get(&borrowing_id).cloned()
    }

    pub fn borrowing_count(&self) -> usize {
        self.state().borrowings.len()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state().payments.clone()
    }
}

#[async_trait]
impl BookRepository for InMemoryLibrary {
    async fn insert(&self, book: &Book) -> Result<()> {
        let mut state = self.state();
        if state.books.contains_key(&book.book_id) {
            return Err(format!("book {} already exists", book.book_id).into());
        }
        state.books.insert(book.book_id, book.clone());
        Ok(())
    }

    async fn update(&self, book: &Book) -> Result<bool> {
        let mut state = self.state();
        match state.books.get_mut(&book.book_id) {
            Some(stored) => {
                *stored = book.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state().books.get(&book_id).cloned())
    }

    async fn search(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let mut books: Vec<Book> = self
            .state()
            .books
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }
}

#[async_trait]
impl BorrowingRepository for InMemoryLibrary {
    async fn create_with_payment(
        &self,
        borrowing: &Borrowing,
        payment: &Payment,
    ) -> Result<Reservation> {
        // PostgreSQLのCHECK制約に相当
        if validate_return_window(borrowing.borrow_date, borrowing.expected_return_date).is_err() {
            return Ok(Reservation::InvalidReturnWindow);
        }

        let mut state = self.state();
        state.ensure_new_session(payment)?;

        let book = state
            .books
            .get_mut(&borrowing.book_id)
            .ok_or_else(|| format!("book {} not found", borrowing.book_id))?;
        if book.inventory == 0 {
            return Ok(Reservation::OutOfStock);
        }
        book.inventory -= 1;

        state
            .borrowings
            .insert(borrowing.borrowing_id, borrowing.clone());
        state.payments.push(payment.clone());
        Ok(Reservation::Reserved)
    }

    async fn close(
        &self,
        borrowing_id: BorrowingId,
        returned_on: NaiveDate,
        fine: Option<NewFine<'_>>,
    ) -> Result<Closure> {
        let mut state = self.state();
        if let Some(fine) = &fine {
            state.ensure_new_session(fine.payment)?;
        }

        let borrowing = state
            .borrowings
            .get_mut(&borrowing_id)
            .ok_or_else(|| format!("borrowing {} not found", borrowing_id))?;
        if borrowing.actual_return_date.is_some() {
            return Ok(Closure::AlreadyReturned);
        }
        if let Some(fine) = &fine {
            if borrowing.fined_days != fine.fined_days_before {
                return Ok(Closure::FinesChanged);
            }
            borrowing.fined_days = fine.fined_days_after;
        }
        borrowing.actual_return_date = Some(returned_on);
        let book_id = borrowing.book_id;

        if let Some(book) = state.books.get_mut(&book_id) {
            book.inventory += 1;
        }
        if let Some(fine) = fine {
            state.payments.push(fine.payment.clone());
        }
        Ok(Closure::Closed)
    }

    async fn add_fine(
        &self,
        borrowing_id: BorrowingId,
        fine: NewFine<'_>,
    ) -> Result<FineRecording> {
        let mut state = self.state();
        state.ensure_new_session(fine.payment)?;
        if state.has_pending_fine(borrowing_id) {
            return Ok(FineRecording::PendingFineExists);
        }

        let borrowing = state
            .borrowings
            .get_mut(&borrowing_id)
            .ok_or_else(|| format!("borrowing {} not found", borrowing_id))?;
        if borrowing.fined_days != fine.fined_days_before {
            return Ok(FineRecording::FinesChanged);
        }
        borrowing.fined_days = fine.fined_days_after;

        state.payments.push(fine.payment.clone());
        Ok(FineRecording::Recorded)
    }

    async fn get_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        Ok(self.state().borrowings.get(&borrowing_id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        active: Option<bool>,
    ) -> Result<Vec<BorrowingSummary>> {
        Ok(self.state().summaries(|b| {
            b.user_id == user_id && active.is_none_or(|a| a == b.is_active())
        }))
    }

    async fn find_all(&self, active: Option<bool>) -> Result<Vec<BorrowingSummary>> {
        Ok(self
            .state()
            .summaries(|b| active.is_none_or(|a| a == b.is_active())))
    }

    async fn find_due_on(&self, due_on: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        Ok(self
            .state()
            .reminder_candidates(|b| b.expected_return_date == due_on))
    }

    async fn find_overdue_as_of(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        Ok(self
            .state()
            .reminder_candidates(|b| b.expected_return_date < today))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryLibrary {
    async fn find_by_borrowing(&self, borrowing_id: BorrowingId) -> Result<Vec<Payment>> {
        Ok(self
            .state()
            .payments
            .iter()
            .filter(|p| p.borrowing_id == borrowing_id)
            .cloned()
            .collect())
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .state()
            .payments
            .iter()
            .find(|p| p.session_id == session_id)
            .cloned())
    }

    async fn settle(&self, session_id: &str) -> Result<Settlement> {
        let mut state = self.state();
        let Some(index) = state
            .payments
            .iter()
            .position(|p| p.session_id == session_id)
        else {
            return Ok(Settlement::UnknownSession);
        };

        let Ok(settled) = settle_payment(&state.payments[index]) else {
            return Ok(Settlement::AlreadyPaid);
        };
        state.payments[index] = settled.clone();

        let borrowing_newly_paid = match state.borrowings.get_mut(&settled.borrowing_id) {
            Some(borrowing) if !borrowing.is_paid => {
                borrowing.is_paid = true;
                true
            }
            _ => false,
        };

        Ok(Settlement::Settled {
            payment: settled,
            borrowing_newly_paid,
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryLibrary {
    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.state().users.get(&user_id).cloned())
    }

    async fn find_with_delivery_address(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .state()
            .users
            .values()
            .filter(|u| u.has_delivery_address())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}
