//! PostgreSQLアダプターのテスト
//!
//! DATABASE_URLのデータベースを使うため既定では無視される。
//! `cargo test -- --ignored` で実行する。

use chrono::Utc;
use rusty_library_rental::adapters::postgres::{
    PostgresBookRepository, PostgresBorrowingRepository, PostgresPaymentRepository,
    PostgresUserDirectory,
};
use rusty_library_rental::domain::payment::open_payment;
use rusty_library_rental::domain::{
    Book, BookId, Borrowing, BorrowingId, CoverType, Payment, PaymentType, User, UserId,
};
use rusty_library_rental::ports::{
    BookFilter, BookRepository, BorrowingRepository, Closure, FineRecording, NewFine,
    PaymentRepository, Reservation, Settlement, UserDirectory,
};
use serial_test::serial;
use sqlx::PgPool;

mod common;

use common::{days_from, fee, today};

/// データベースのクリーンアップ
///
/// テストの独立性を保つため、各テスト前にすべてのデータを削除します。
async fn cleanup_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE payments, borrowings, books, users CASCADE")
        .execute(pool)
        .await
        .expect("Failed to truncate tables");
}

async fn insert_user(pool: &PgPool, chat_id: Option<i64>) -> User {
    let user = User {
        user_id: UserId::new(),
        email: format!("{}@library.test", UserId::new()),
        chat_id,
        is_staff: false,
        is_superuser: false,
    };
    sqlx::query(
        "INSERT INTO users (id, email, chat_id, is_staff, is_superuser) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user.user_id.value())
    .bind(&user.email)
    .bind(user.chat_id)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .execute(pool)
    .await
    .expect("Failed to insert user");
    user
}

async fn insert_book(books: &PostgresBookRepository, inventory: u32) -> Book {
    let book = Book {
        book_id: BookId::new(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        cover: CoverType::Hard,
        inventory,
        daily_fee: fee("1.50"),
    };
    books.insert(&book).await.unwrap();
    book
}

fn new_borrowing(book: &Book, user: &User, borrow_offset: i64, due_offset: i64) -> Borrowing {
    Borrowing {
        borrowing_id: BorrowingId::new(),
        book_id: book.book_id,
        user_id: user.user_id,
        borrow_date: days_from(today(), borrow_offset),
        expected_return_date: days_from(today(), due_offset),
        actual_return_date: None,
        is_paid: false,
        fined_days: 0,
    }
}

fn new_payment(borrowing: &Borrowing, session_id: &str) -> Payment {
    open_charge(borrowing, PaymentType::Payment, session_id)
}

fn open_charge(borrowing: &Borrowing, payment_type: PaymentType, session_id: &str) -> Payment {
    open_payment(
        borrowing.borrowing_id,
        payment_type,
        fee("4.50"),
        session_id.to_string(),
        format!("https://checkout.test/pay/{}", session_id),
        Utc::now(),
    )
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_book_search_is_case_insensitive() {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let book = insert_book(&books, 2).await;

    let found = books
        .search(&BookFilter {
            title: Some("dUN".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let none = books
        .search(&BookFilter {
            cover: Some(CoverType::Soft),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(found, vec![book]);
    assert!(none.is_empty());
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_last_copy_is_reserved_once() {
    // Arrange
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let payments = PostgresPaymentRepository::new(pool.clone());
    let book = insert_book(&books, 1).await;
    let alice = insert_user(&pool, None).await;
    let bob = insert_user(&pool, None).await;

    let first = new_borrowing(&book, &alice, 0, 3);
    let second = new_borrowing(&book, &bob, 0, 3);
    let first_payment = new_payment(&first, "cs_pg_1");
    let second_payment = new_payment(&second, "cs_pg_2");

    // Act: 同時に在庫を確保する
    let (a, b) = tokio::join!(
        borrowings.create_with_payment(&first, &first_payment),
        borrowings.create_with_payment(&second, &second_payment),
    );

    // Assert
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|r| *r == Reservation::OutOfStock);
    assert_eq!(outcomes, vec![Reservation::Reserved, Reservation::OutOfStock]);

    let stored = books.get_by_id(book.book_id).await.unwrap().unwrap();
    assert_eq!(stored.inventory, 0);

    let persisted = [
        payments.find_by_session_id("cs_pg_1").await.unwrap(),
        payments.find_by_session_id("cs_pg_2").await.unwrap(),
    ];
    assert_eq!(persisted.iter().filter(|p| p.is_some()).count(), 1);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_settle_transitions_once() {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let payments = PostgresPaymentRepository::new(pool.clone());
    let book = insert_book(&books, 1).await;
    let user = insert_user(&pool, None).await;
    let borrowing = new_borrowing(&book, &user, 0, 3);
    let payment = new_payment(&borrowing, "cs_pg_settle");
    borrowings
        .create_with_payment(&borrowing, &payment)
        .await
        .unwrap();

    let first = payments.settle("cs_pg_settle").await.unwrap();
    let second = payments.settle("cs_pg_settle").await.unwrap();
    let unknown = payments.settle("cs_pg_missing").await.unwrap();

    match first {
        Settlement::Settled {
            payment: settled,
            borrowing_newly_paid,
        } => {
            assert!(settled.is_paid());
            assert_eq!(settled.money_to_pay, fee("4.50"));
            assert!(borrowing_newly_paid);
        }
        other => panic!("Expected Settled, got {:?}", other),
    }
    assert_eq!(second, Settlement::AlreadyPaid);
    assert_eq!(unknown, Settlement::UnknownSession);

    let stored = borrowings
        .get_by_id(borrowing.borrowing_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_paid);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_close_restores_inventory_once() {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let book = insert_book(&books, 1).await;
    let user = insert_user(&pool, None).await;
    let borrowing = new_borrowing(&book, &user, 0, 3);
    borrowings
        .create_with_payment(&borrowing, &new_payment(&borrowing, "cs_pg_close"))
        .await
        .unwrap();

    let first = borrowings
        .close(borrowing.borrowing_id, today(), None)
        .await
        .unwrap();
    let second = borrowings
        .close(borrowing.borrowing_id, today(), None)
        .await
        .unwrap();

    assert_eq!(first, Closure::Closed);
    assert_eq!(second, Closure::AlreadyReturned);
    let stored = books.get_by_id(book.book_id).await.unwrap().unwrap();
    assert_eq!(stored.inventory, 1);

    let summaries = borrowings
        .find_by_user(user.user_id, Some(false))
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].book_title, "Dune");
    assert_eq!(summaries[0].borrowing.actual_return_date, Some(today()));
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_reminder_queries() {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let users = PostgresUserDirectory::new(pool.clone());
    let book = insert_book(&books, 5).await;
    let reader = insert_user(&pool, Some(314)).await;
    let silent = insert_user(&pool, None).await;

    let due = new_borrowing(&book, &reader, -3, 1);
    let overdue = new_borrowing(&book, &reader, -9, -3);
    let no_address = new_borrowing(&book, &silent, -9, -3);
    for (i, borrowing) in [&due, &overdue, &no_address].into_iter().enumerate() {
        borrowings
            .create_with_payment(borrowing, &new_payment(borrowing, &format!("cs_pg_r{}", i)))
            .await
            .unwrap();
    }

    let due_tomorrow = borrowings
        .find_due_on(days_from(today(), 1))
        .await
        .unwrap();
    let overdue_now = borrowings.find_overdue_as_of(today()).await.unwrap();
    let subscribers = users.find_with_delivery_address().await.unwrap();

    assert_eq!(due_tomorrow.len(), 1);
    assert_eq!(due_tomorrow[0].borrowing_id, due.borrowing_id);
    assert_eq!(due_tomorrow[0].chat_id, 314);
    assert_eq!(overdue_now.len(), 1);
    assert_eq!(overdue_now[0].borrowing_id, overdue.borrowing_id);
    assert_eq!(subscribers, vec![reader]);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_invalid_return_window_is_reported() {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let book = insert_book(&books, 1).await;
    let user = insert_user(&pool, None).await;
    let invalid = new_borrowing(&book, &user, 0, 0);

    let outcome = borrowings
        .create_with_payment(&invalid, &new_payment(&invalid, "cs_pg_window"))
        .await
        .unwrap();

    // CHECK制約違反はロールバックされ、在庫も戻る
    assert_eq!(outcome, Reservation::InvalidReturnWindow);
    let stored = books.get_by_id(book.book_id).await.unwrap().unwrap();
    assert_eq!(stored.inventory, 1);
    assert!(borrowings.get_by_id(invalid.borrowing_id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_fine_is_recorded_once_per_coverage() {
    // Arrange
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let books = PostgresBookRepository::new(pool.clone());
    let borrowings = PostgresBorrowingRepository::new(pool.clone());
    let payments = PostgresPaymentRepository::new(pool.clone());
    let book = insert_book(&books, 1).await;
    let user = insert_user(&pool, None).await;
    let borrowing = new_borrowing(&book, &user, -9, -3);
    borrowings
        .create_with_payment(&borrowing, &new_payment(&borrowing, "cs_pg_rent"))
        .await
        .unwrap();

    let first = open_charge(&borrowing, PaymentType::Fine, "cs_pg_fine_1");
    let second = open_charge(&borrowing, PaymentType::Fine, "cs_pg_fine_2");
    fn coverage(payment: &Payment) -> NewFine<'_> {
        NewFine {
            payment,
            fined_days_before: 0,
            fined_days_after: 3,
        }
    }

    // Act: 同じ請求済み日数を前提に同時に保存する
    let (a, b) = tokio::join!(
        borrowings.add_fine(borrowing.borrowing_id, coverage(&first)),
        borrowings.add_fine(borrowing.borrowing_id, coverage(&second)),
    );

    // Assert
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|r| *r != FineRecording::Recorded);
    assert_eq!(outcomes[0], FineRecording::Recorded);
    assert_ne!(outcomes[1], FineRecording::Recorded);

    let fines: Vec<Payment> = payments
        .find_by_borrowing(borrowing.borrowing_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.payment_type == PaymentType::Fine)
        .collect();
    assert_eq!(fines.len(), 1);

    // 支払い後、古い請求済み日数を前提にした請求は通らない
    payments.settle(&fines[0].session_id).await.unwrap();
    let third = open_charge(&borrowing, PaymentType::Fine, "cs_pg_fine_3");
    let stale = borrowings
        .add_fine(borrowing.borrowing_id, coverage(&third))
        .await
        .unwrap();
    assert_eq!(stale, FineRecording::FinesChanged);

    let stored = borrowings
        .get_by_id(borrowing.borrowing_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.fined_days, 3);
}
