//! Business logic services.

pub mod article_service;
pub mod audit_service;
pub mod auth_service;
pub mod aws_sign;
pub mod course_service;
pub mod event_bus;
pub mod maintenance_service;
pub mod metrics_service;
pub mod mux_client;
pub mod scheduler_service;
pub mod thumbnail_service;
pub mod transcoder_client;
pub mod video_service;
