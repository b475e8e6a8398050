//! Dispatcher tree and update handlers

pub mod callbacks;
pub mod commands;
pub mod documents;
pub mod links;
pub mod schema;
pub mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
