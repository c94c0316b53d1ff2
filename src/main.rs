//! Lectern - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rand::Rng;

use lectern_backend::{
    api,
    config::Config,
    db,
    error::{AppError, Result},
    services::{
        auth_service::AuthService,
        aws_sign::SigningCredentials,
        metrics_service,
        mux_client::MuxClient,
        scheduler_service,
        transcoder_client::{discover_endpoint, RetryConfig, TranscoderClient, TranscoderConfig},
    },
    storage::{
        filesystem::FilesystemStorage,
        s3::{S3Config, S3Storage},
        StorageBackend,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing; the OTLP exporter is attached only when an endpoint is set
    let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let _otel_guard = telemetry::init_tracing(otel_endpoint.as_deref(), "lectern-backend");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting Lectern");

    // Connect to database
    let db_pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations complete");

    // Provision admin user on first boot
    provision_admin_user(&db_pool, &config).await?;

    // Select the media storage backend
    let storage: Arc<dyn StorageBackend> = match config.storage_backend.as_str() {
        "s3" => {
            let bucket = config.s3_bucket.clone().ok_or_else(|| {
                AppError::Config("S3_BUCKET must be set when STORAGE_BACKEND=s3".to_string())
            })?;
            let region = config
                .s3_region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string());
            tracing::info!(bucket = %bucket, "Using S3 media storage");
            Arc::new(S3Storage::new(S3Config::new(
                bucket,
                region,
                config.s3_endpoint.clone(),
            ))?)
        }
        "filesystem" => {
            tracing::info!(path = %config.storage_path, "Using filesystem media storage");
            Arc::new(FilesystemStorage::new(&config.storage_path))
        }
        other => {
            return Err(AppError::Config(format!(
                "Unknown storage backend: {}",
                other
            )));
        }
    };

    // Initialize the Mux client; streaming ingest is skipped when unset
    let mux = match (&config.mux_token_id, &config.mux_token_secret) {
        (Some(token_id), Some(token_secret)) => {
            let client = MuxClient::new(token_id.clone(), token_secret.clone())?;
            tracing::info!("Mux streaming ingest enabled");
            Some(Arc::new(client))
        }
        _ => {
            tracing::info!("Mux credentials not configured, streaming ingest disabled");
            None
        }
    };

    // Initialize the MediaConvert client; without it thumbnail generation
    // falls through to ffmpeg, client images, and the placeholder
    let transcoder = match (
        &config.mediaconvert_role_arn,
        &config.aws_region,
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
    ) {
        (Some(role_arn), Some(region), Some(key_id), Some(secret)) => {
            let credentials = SigningCredentials {
                access_key_id: key_id.clone(),
                secret_access_key: secret.clone(),
            };
            // Job calls must go to the account endpoint; discover it
            // when the deployment does not pin one.
            let endpoint = match &config.mediaconvert_endpoint {
                Some(endpoint) => endpoint.clone(),
                None => {
                    let discovered = discover_endpoint(region, &credentials).await?;
                    tracing::info!(endpoint = %discovered, "Discovered MediaConvert account endpoint");
                    discovered
                }
            };
            let client = TranscoderClient::new(TranscoderConfig {
                endpoint,
                region: region.clone(),
                role_arn: role_arn.clone(),
                queue: config.mediaconvert_queue.clone(),
                credentials,
                timeout_secs: 30,
                retry: RetryConfig::default(),
            })?;
            tracing::info!("MediaConvert thumbnail jobs enabled");
            Some(Arc::new(client))
        }
        _ => {
            tracing::info!("MediaConvert not configured, transcoder thumbnails disabled");
            None
        }
    };

    // Initialize Prometheus metrics recorder
    let metrics_handle = metrics_service::init_metrics();
    tracing::info!("Prometheus metrics recorder initialized");

    // Create application state
    let config = Arc::new(config);
    let mut app_state = api::AppState::build(
        Arc::clone(&config),
        db_pool.clone(),
        storage,
        mux,
        transcoder,
    );
    app_state.set_metrics_handle(metrics_handle);
    let state = Arc::new(app_state);

    // Spawn background schedulers (pipeline reconciler, catalog gauges)
    scheduler_service::spawn_all(db_pool, Arc::clone(&config), state.videos.clone());

    // Build router
    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(axum::middleware::from_fn(
            metrics_service::metrics_middleware,
        ))
        .layer({
            // In production the frontend is served from the same origin, so
            // credentials + same-origin work without an explicit allow-origin.
            // In development the Next.js dev server runs on a different port,
            // so we must whitelist that origin and enable credentials.
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "development" {
                let origins: Vec<_> = std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".into())
                    .split(',')
                    .map(|s| s.trim().parse().expect("invalid CORS origin"))
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
                    .allow_credentials(true)
            } else {
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        })
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Provision the initial admin account on first boot.
///
/// When `ADMIN_PASSWORD` is not configured a random password is generated,
/// written under the storage path, and the account is flagged so the first
/// login forces a rotation via POST /api/auth/change-password.
async fn provision_admin_user(db: &sqlx::PgPool, config: &Config) -> Result<()> {
    use std::path::Path;

    let password_file = Path::new(&config.storage_path).join("admin.password");

    // Check if an admin user already exists
    let admin_row: Option<(bool,)> =
        sqlx::query_as("SELECT must_change_password FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(db)
            .await?;

    if let Some((must_change,)) = admin_row {
        if must_change {
            tracing::warn!("Admin user has not rotated the generated password yet");
            if password_file.exists() {
                tracing::info!("Admin password file: {}", password_file.display());
            }
        }
        return Ok(());
    }

    // No admin yet, create one
    let (password, must_change) = match &config.admin_password {
        Some(p) if !p.is_empty() => (p.clone(), false),
        _ => {
            const CHARSET: &[u8] =
                b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789!@#$%&*";
            let mut rng = rand::rng();
            let p: String = (0..20)
                .map(|_| {
                    let idx = rng.random_range(0..CHARSET.len());
                    CHARSET[idx] as char
                })
                .collect();
            (p, true)
        }
    };

    let password_hash = AuthService::hash_password(&password)?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, display_name, role, must_change_password)
        VALUES ($1, $2, 'Administrator', 'admin', $3)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(&config.admin_email)
    .bind(&password_hash)
    .bind(must_change)
    .execute(db)
    .await?;

    if must_change {
        // Write password to a file so operators can retrieve it
        if let Err(e) = std::fs::write(&password_file, format!("{}\n", password)) {
            tracing::error!("Failed to write admin password file: {}", e);
            // Fall back to logging the password directly
            tracing::info!("Generated admin password: {}", password);
        } else {
            tracing::info!("Admin password written to: {}", password_file.display());
        }
        tracing::info!(
            "\n\
            ===========================================================\n\
            \n\
              Initial admin user created.\n\
            \n\
              Email:     {}\n\
              Password:  see file {}\n\
            \n\
              Read it:   docker exec lectern-backend cat {}\n\
            \n\
              Change it after first login:\n\
              POST /api/auth/change-password\n\
            \n\
            ===========================================================",
            config.admin_email,
            password_file.display(),
            password_file.display(),
        );
    } else {
        tracing::info!("Admin user created with password from ADMIN_PASSWORD");
    }

    Ok(())
}
