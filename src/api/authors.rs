//! Author endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppResult, models::Book};

use super::AuthenticatedUser;

#[derive(Deserialize, ToSchema)]
pub struct AuthorRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// List registered authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    responses(
        (status = 200, description = "Registered authors, in registration order", body = Vec<String>)
    )
)]
pub async fn list_authors(State(state): State<crate::AppState>) -> Json<Vec<String>> {
    Json(state.services.catalog.list_authors().await)
}

/// List authors that have at least one available book
#[utoipa::path(
    get,
    path = "/authors/distinct",
    tag = "authors",
    responses(
        (status = 200, description = "Authors of available books", body = Vec<String>)
    )
)]
pub async fn list_distinct_authors(State(state): State<crate::AppState>) -> Json<Vec<String>> {
    Json(state.services.catalog.list_distinct_authors().await)
}

/// List the available books of an author
#[utoipa::path(
    get,
    path = "/authors/{name}/books",
    tag = "authors",
    params(
        ("name" = String, Path, description = "Author name")
    ),
    responses(
        (status = 200, description = "Available books ordered by per-author sequence number", body = Vec<Book>)
    )
)]
pub async fn list_author_books(
    State(state): State<crate::AppState>,
    Path(name): Path<String>,
) -> Json<Vec<Book>> {
    Json(state.services.catalog.list_books_by_author(&name).await)
}

/// Register an author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author added", body = MessageResponse),
        (status = 400, description = "Author name is required")
    )
)]
pub async fn add_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<AuthorRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    state.services.checkout.add_author(&request.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Author added successfully".to_string(),
        }),
    ))
}
