//! In-memory catalog index
//!
//! Books are partitioned by author (the available set) and by borrower
//! (current holdings). A book is in exactly one of those places at a time;
//! the checkout coordinator moves it between them under the write lock.
//!
//! Each book placed in an author's set carries a per-author sequence number,
//! the lowest positive number not used by another book currently in that set.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexSet;

use crate::models::{Book, Holding};

#[derive(Debug, Default)]
pub struct CatalogIndex {
    by_author: HashMap<String, Vec<Book>>,
    holdings: HashMap<String, Vec<Book>>,
    authors: IndexSet<String>,
}

/// Lowest positive sequence number not used by `books`
fn lowest_free_sequence(books: &[Book]) -> i32 {
    let used: HashSet<i32> = books.iter().map(|b| b.sequence).collect();
    (1..).find(|n| !used.contains(n)).unwrap_or(1)
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index with `books`. Holdings start empty.
    ///
    /// Borrower assignments are not persisted, so books the store still
    /// flags as checked out land in the available set with the flag kept.
    pub fn bulk_load(&mut self, books: Vec<Book>) {
        self.by_author.clear();
        self.holdings.clear();
        self.authors.clear();

        for book in books {
            self.place(book);
        }
    }

    /// Place a new book in its author's set, assigning its sequence number
    pub fn add_book(&mut self, book: Book) -> Book {
        self.place(book)
    }

    /// Put a returned book back into its author's set.
    ///
    /// The book keeps its previous sequence number unless another book took
    /// it in the meantime.
    pub fn restore_to_available(&mut self, mut book: Book) -> Book {
        book.checked_out = false;
        let taken = self
            .by_author
            .get(&book.author)
            .map(|books| books.iter().any(|b| b.sequence == book.sequence))
            .unwrap_or(false);
        if book.sequence < 1 || taken {
            book.sequence = 0;
        }
        self.place(book)
    }

    fn place(&mut self, mut book: Book) -> Book {
        self.register_author(&book.author);
        let books = self.by_author.entry(book.author.clone()).or_default();
        if book.sequence < 1 {
            book.sequence = lowest_free_sequence(books);
        }
        books.push(book.clone());
        book
    }

    /// Remove the available book with the given global index
    pub fn remove_from_available(&mut self, index: i32) -> Option<Book> {
        let (author, position) = self.by_author.iter().find_map(|(author, books)| {
            books
                .iter()
                .position(|b| b.index == index)
                .map(|position| (author.clone(), position))
        })?;

        let books = self.by_author.get_mut(&author)?;
        let book = books.remove(position);
        if books.is_empty() {
            self.by_author.remove(&author);
        }
        Some(book)
    }

    pub fn assign_to_borrower(&mut self, borrower: &str, book: Book) {
        self.holdings
            .entry(borrower.to_string())
            .or_default()
            .push(book);
    }

    /// Remove the book from the borrower's holding. The entry disappears with its last book.
    pub fn remove_from_borrower(&mut self, borrower: &str, index: i32) -> Option<Book> {
        let books = self.holdings.get_mut(borrower)?;
        let position = books.iter().position(|b| b.index == index)?;
        let book = books.remove(position);
        if books.is_empty() {
            self.holdings.remove(borrower);
        }
        Some(book)
    }

    /// Move a held book back into its author's set in one step
    pub fn return_to_available(&mut self, borrower: &str, index: i32) -> Option<Book> {
        let book = self.remove_from_borrower(borrower, index)?;
        Some(self.restore_to_available(book))
    }

    pub fn is_held_by(&self, borrower: &str, index: i32) -> bool {
        self.holdings
            .get(borrower)
            .map(|books| books.iter().any(|b| b.index == index))
            .unwrap_or(false)
    }

    /// Whether the book is placed anywhere, available or held
    pub fn contains(&self, index: i32) -> bool {
        self.by_author
            .values()
            .chain(self.holdings.values())
            .flatten()
            .any(|b| b.index == index)
    }

    /// Rewrite title and author of a placed book, wherever it sits.
    ///
    /// An available book whose author changes moves to the new author's set
    /// and gets a fresh sequence number there.
    pub fn relocate(&mut self, index: i32, title: &str, author: &str) -> Option<Book> {
        if let Some(mut book) = self.remove_from_available(index) {
            if book.author != author {
                book.sequence = 0;
            }
            book.title = title.to_string();
            book.author = author.to_string();
            return Some(self.place(book));
        }

        let book = self
            .holdings
            .values_mut()
            .flat_map(|books| books.iter_mut())
            .find(|b| b.index == index)?;
        book.title = title.to_string();
        book.author = author.to_string();
        let book = book.clone();
        self.register_author(author);
        Some(book)
    }

    /// Register an author. Returns false if already known.
    pub fn register_author(&mut self, name: &str) -> bool {
        if self.authors.contains(name) {
            return false;
        }
        self.authors.insert(name.to_string())
    }

    /// Registered authors, in registration order
    pub fn authors(&self) -> Vec<String> {
        self.authors.iter().cloned().collect()
    }

    /// Authors that currently have at least one available book, sorted
    pub fn distinct_authors(&self) -> Vec<String> {
        let mut authors: Vec<String> = self
            .by_author
            .iter()
            .filter(|(_, books)| !books.is_empty())
            .map(|(author, _)| author.clone())
            .collect();
        authors.sort();
        authors
    }

    /// Available books of one author, by sequence number
    pub fn books_by_author(&self, author: &str) -> Vec<Book> {
        let mut books = self.by_author.get(author).cloned().unwrap_or_default();
        books.sort_by_key(|b| b.sequence);
        books
    }

    /// Books held by `borrower`; empty when the borrower holds nothing
    pub fn books_held_by(&self, borrower: &str) -> Vec<Book> {
        self.holdings.get(borrower).cloned().unwrap_or_default()
    }

    /// All available books, by global index
    pub fn available_books(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self.by_author.values().flatten().cloned().collect();
        books.sort_by_key(|b| b.index);
        books
    }

    /// Every non-empty holding, by borrower name
    pub fn holdings(&self) -> Vec<Holding> {
        let sorted: BTreeMap<&String, &Vec<Book>> = self.holdings.iter().collect();
        sorted
            .into_iter()
            .map(|(borrower, books)| Holding {
                borrower: borrower.clone(),
                books: books.clone(),
            })
            .collect()
    }
}
