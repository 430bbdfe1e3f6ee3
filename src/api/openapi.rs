//! OpenAPI documentation

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::{auth, authors, books, borrowers, health, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "0.3.0",
        description = "Library catalog and checkout REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Books
        books::list_books,
        books::add_book,
        books::update_book,
        books::checkout_book,
        books::return_book,
        // Authors
        authors::list_authors,
        authors::list_distinct_authors,
        authors::list_author_books,
        authors::add_author,
        // Borrowers
        borrowers::list_holdings,
        borrowers::list_borrower_books,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
    ),
    components(
        schemas(
            // Auth
            auth::CredentialsRequest,
            auth::TokenResponse,
            // Books
            crate::models::Book,
            crate::models::Holding,
            books::BookRequest,
            books::BorrowRequest,
            books::BorrowResponse,
            // Authors
            authors::AuthorRequest,
            authors::MessageResponse,
            // Users
            crate::models::UserInfo,
            crate::models::CreateUser,
            crate::models::UpdateUser,
            users::PaginatedUsers,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Catalog, checkout and return"),
        (name = "authors", description = "Author registry"),
        (name = "borrowers", description = "Current holdings"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}
