//! Database models (SQLx).

pub mod article;
pub mod course;
pub mod event;
pub mod user;
pub mod video;
