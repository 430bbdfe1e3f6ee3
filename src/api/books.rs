//! Book catalog and checkout endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppResult, models::Book};

use super::{parse_index, AuthenticatedUser};

/// New or updated book details
#[derive(Deserialize, ToSchema)]
pub struct BookRequest {
    pub title: String,
    pub author: String,
}

/// Checkout or return request
#[derive(Deserialize, Default, ToSchema)]
pub struct BorrowRequest {
    /// Borrower name; defaults to the authenticated user
    pub username: Option<String>,
}

/// Checkout/return response
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub message: String,
    pub borrower: String,
    pub book: Book,
}

fn borrower_of(request: Option<Json<BorrowRequest>>, default: String) -> String {
    request
        .and_then(|Json(request)| request.username)
        .unwrap_or(default)
}

/// List every stored book
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books in the book table", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_stored_books().await?;
    Ok(Json(books))
}

/// Add a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book added", body = Book),
        (status = 400, description = "Missing title or author"),
        (status = 409, description = "Book already exists")
    )
)]
pub async fn add_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<BookRequest>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state
        .services
        .checkout
        .add_book(&request.title, &request.author)
        .await?;

    Ok((StatusCode::CREATED, Json(book)))
}

/// Update title and author of a book
#[utoipa::path(
    put,
    path = "/books/{index}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("index" = i32, Path, description = "Global book index")
    ),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid index, title or author"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Another book has this title and author")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(index): Path<String>,
    Json(request): Json<BookRequest>,
) -> AppResult<Json<Book>> {
    let index = parse_index(&index)?;
    let book = state
        .services
        .checkout
        .update_book(index, &request.title, &request.author)
        .await?;

    Ok(Json(book))
}

/// Check out a book
#[utoipa::path(
    post,
    path = "/books/{index}/checkout",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("index" = i32, Path, description = "Global book index")
    ),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book checked out", body = BorrowResponse),
        (status = 400, description = "Invalid index or username"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book already checked out"),
        (status = 500, description = "Book store and catalog diverged"),
        (status = 503, description = "Book store unavailable")
    )
)]
pub async fn checkout_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(index): Path<String>,
    request: Option<Json<BorrowRequest>>,
) -> AppResult<Json<BorrowResponse>> {
    let index = parse_index(&index)?;
    let borrower = borrower_of(request, claims.sub);

    let book = state.services.checkout.checkout(index, &borrower).await?;

    Ok(Json(BorrowResponse {
        message: "Book taken successfully".to_string(),
        borrower: borrower.trim().to_string(),
        book,
    }))
}

/// Return a book
#[utoipa::path(
    post,
    path = "/books/{index}/return",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("index" = i32, Path, description = "Global book index")
    ),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book returned", body = BorrowResponse),
        (status = 400, description = "Invalid index or username"),
        (status = 409, description = "Book not held by this borrower"),
        (status = 500, description = "Book store and catalog diverged"),
        (status = 503, description = "Book store unavailable")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(index): Path<String>,
    request: Option<Json<BorrowRequest>>,
) -> AppResult<Json<BorrowResponse>> {
    let index = parse_index(&index)?;
    let borrower = borrower_of(request, claims.sub);

    let book = state.services.checkout.return_book(index, &borrower).await?;

    Ok(Json(BorrowResponse {
        message: "Book returned successfully".to_string(),
        borrower: borrower.trim().to_string(),
        book,
    }))
}
