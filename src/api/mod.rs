//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use crate::config::Config;
use crate::services::audit_service::AuditService;
use crate::services::auth_service::AuthService;
use crate::services::article_service::ArticleService;
use crate::services::course_service::CourseService;
use crate::services::event_bus::EventBus;
use crate::services::maintenance_service::MaintenanceService;
use crate::services::mux_client::MuxClient;
use crate::services::thumbnail_service::ThumbnailService;
use crate::services::transcoder_client::TranscoderClient;
use crate::services::video_service::VideoService;
use crate::storage::StorageBackend;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    pub storage: Arc<dyn StorageBackend>,
    pub bus: Arc<EventBus>,
    pub auth: Arc<AuthService>,
    pub audit: Arc<AuditService>,
    pub videos: Arc<VideoService>,
    pub articles: Arc<ArticleService>,
    pub courses: Arc<CourseService>,
    pub maintenance: Arc<MaintenanceService>,
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Wire up the full service graph from the primitives. The streaming
    /// and transcoder clients are optional; when absent the corresponding
    /// pipeline stages are skipped at runtime.
    pub fn build(
        config: Arc<Config>,
        db: PgPool,
        storage: Arc<dyn StorageBackend>,
        mux: Option<Arc<MuxClient>>,
        transcoder: Option<Arc<TranscoderClient>>,
    ) -> Self {
        let bus = Arc::new(EventBus::new(256));
        let auth = Arc::new(AuthService::new(db.clone(), Arc::clone(&config)));
        let audit = Arc::new(AuditService::new(db.clone(), Arc::clone(&bus)));
        let thumbnails = Arc::new(ThumbnailService::new(
            Arc::clone(&storage),
            transcoder.clone(),
            &config,
        ));
        let videos = Arc::new(VideoService::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&storage),
            thumbnails,
            mux,
            transcoder,
            Arc::clone(&audit),
        ));
        let articles = Arc::new(ArticleService::new(db.clone(), Arc::clone(&audit)));
        let courses = Arc::new(CourseService::new(db.clone(), Arc::clone(&audit)));
        let maintenance = Arc::new(MaintenanceService::new(db.clone(), Arc::clone(&audit)));

        Self {
            config,
            db,
            storage,
            bus,
            auth,
            audit,
            videos,
            articles,
            courses,
            maintenance,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle for rendering /metrics output.
    pub fn set_metrics_handle(&mut self, handle: PrometheusHandle) {
        self.metrics_handle = Some(Arc::new(handle));
    }
}

pub type SharedState = Arc<AppState>;
