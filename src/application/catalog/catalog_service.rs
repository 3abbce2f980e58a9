use crate::application::ServiceDependencies;
use crate::domain::{self, Book, BookId, BookSaved, LibraryEvent, commands::*};
use crate::ports::BookFilter;

use super::errors::{CatalogApplicationError, Result};

fn publish_saved(deps: &ServiceDependencies, book: &Book, created: bool) {
    deps.notifier.publish(LibraryEvent::BookSaved(BookSaved {
        book: book.clone(),
        created,
    }));
}

/// 書籍を登録し、全購読者へ告知する
pub async fn add_book(deps: &ServiceDependencies, cmd: AddBook) -> Result<Book> {
    let book = domain::book::register_book(
        cmd.title,
        cmd.author,
        cmd.cover,
        cmd.inventory,
        cmd.daily_fee,
    )?;

    deps.books
        .insert(&book)
        .await
        .map_err(CatalogApplicationError::RepositoryError)?;

    tracing::info!(book_id = %book.book_id, title = %book.title, "book added");
    publish_saved(deps, &book, true);

    Ok(book)
}

/// 書籍情報を更新し、全購読者へ告知する
pub async fn update_book(deps: &ServiceDependencies, cmd: UpdateBook) -> Result<Book> {
    let current = get_book(deps, cmd.book_id).await?;
    let revised = domain::book::revise_book(&current, &cmd.changes)?;

    let updated = deps
        .books
        .update(&revised)
        .await
        .map_err(CatalogApplicationError::RepositoryError)?;
    if !updated {
        return Err(CatalogApplicationError::BookNotFound);
    }

    tracing::info!(book_id = %revised.book_id, "book updated");
    publish_saved(deps, &revised, false);

    Ok(revised)
}

pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.books
        .get_by_id(book_id)
        .await
        .map_err(CatalogApplicationError::RepositoryError)?
        .ok_or(CatalogApplicationError::BookNotFound)
}

pub async fn list_books(deps: &ServiceDependencies, filter: &BookFilter) -> Result<Vec<Book>> {
    deps.books
        .search(filter)
        .await
        .map_err(CatalogApplicationError::RepositoryError)
}
