//! Borrower holdings endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::models::{Book, Holding};

/// List every borrower with the books they hold
#[utoipa::path(
    get,
    path = "/borrowers",
    tag = "borrowers",
    responses(
        (status = 200, description = "Current holdings by borrower", body = Vec<Holding>)
    )
)]
pub async fn list_holdings(State(state): State<crate::AppState>) -> Json<Vec<Holding>> {
    Json(state.services.catalog.list_holdings().await)
}

/// List the books held by a borrower
#[utoipa::path(
    get,
    path = "/borrowers/{username}/books",
    tag = "borrowers",
    params(
        ("username" = String, Path, description = "Borrower name")
    ),
    responses(
        (status = 200, description = "Books held; empty when the borrower holds none", body = Vec<Book>)
    )
)]
pub async fn list_borrower_books(
    State(state): State<crate::AppState>,
    Path(username): Path<String>,
) -> Json<Vec<Book>> {
    Json(state.services.catalog.list_books_held_by(&username).await)
}
