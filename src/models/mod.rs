//! Data models for Bookshelf

pub mod book;
pub mod user;

pub use book::{Book, Holding};
pub use user::{CreateUser, UpdateUser, User, UserClaims, UserInfo, UserQuery};
