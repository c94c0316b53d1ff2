//! HTTP request handlers.

pub mod articles;
pub mod auth;
pub mod courses;
pub mod database;
pub mod events;
pub mod health;
pub mod users;
pub mod videos;
pub mod webhooks;
