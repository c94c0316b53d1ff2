//! Background task scheduler.
//!
//! Runs periodic tasks: reconciliation of in-flight video pipelines
//! and metric gauge updates.

use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::config::Config;
use crate::services::metrics_service;
use crate::services::video_service::VideoService;

/// Database gauge stats for Prometheus metrics.
#[derive(Debug, sqlx::FromRow)]
struct GaugeStats {
    pub videos: i64,
    pub articles: i64,
    pub courses: i64,
    pub users: i64,
}

/// Spawn all background scheduler tasks. Fire-and-forget; the tasks
/// run for the life of the process.
pub fn spawn_all(db: PgPool, config: Arc<Config>, videos: Arc<VideoService>) {
    // Pipeline reconciler: polls upstream services for videos stuck in
    // processing when a webhook was missed or dropped.
    {
        let videos = Arc::clone(&videos);
        let interval_secs = config.reconcile_interval_secs.max(30);
        tokio::spawn(async move {
            // Initial delay to let the server start up
            tokio::time::sleep(Duration::from_secs(30)).await;
            let mut ticker = interval(Duration::from_secs(interval_secs));

            loop {
                ticker.tick().await;
                tracing::debug!("Running pipeline reconciliation");

                match videos.list_in_flight().await {
                    Ok(in_flight) => {
                        if !in_flight.is_empty() {
                            tracing::info!("Reconciling {} in-flight videos", in_flight.len());
                        }
                        for video in &in_flight {
                            if let Err(e) = videos.reconcile(video).await {
                                tracing::warn!("Reconciliation failed for {}: {}", video.id, e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Could not list in-flight videos: {}", e);
                    }
                }
            }
        });
    }

    // Gauge metrics updater (every 5 minutes)
    {
        let db = db.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let mut ticker = interval(Duration::from_secs(300)); // 5 minutes

            loop {
                ticker.tick().await;
                if let Err(e) = update_gauge_metrics(&db).await {
                    tracing::warn!("Failed to update gauge metrics: {}", e);
                }
            }
        });
    }

    tracing::info!("Background schedulers started: pipeline reconciler, gauge metrics");
}

/// Update Prometheus gauge metrics from database state.
async fn update_gauge_metrics(db: &PgPool) -> crate::error::Result<()> {
    let stats = sqlx::query_as::<_, GaugeStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM videos) as videos,
            (SELECT COUNT(*) FROM articles) as articles,
            (SELECT COUNT(*) FROM courses) as courses,
            (SELECT COUNT(*) FROM users) as users
        "#,
    )
    .fetch_one(db)
    .await?;

    metrics_service::set_catalog_gauges(stats.videos, stats.articles, stats.courses, stats.users);
    metrics_service::set_db_pool_gauges(db);

    Ok(())
}
