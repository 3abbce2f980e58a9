mod catalog_service;
mod errors;

pub use catalog_service::{add_book, get_book, list_books, update_book};
pub use errors::{CatalogApplicationError, Result};
