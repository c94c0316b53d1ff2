//! Lectern - Admin CLI
//!
//! Operational commands for inspecting and applying maintenance schema
//! patches and recovering admin access without the web API.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::Rng;

use lectern_backend::{
    db,
    error::{AppError, Result},
    services::{
        audit_service::AuditService, auth_service::AuthService, event_bus::EventBus,
        maintenance_service::MaintenanceService,
    },
};

/// Lectern operational tooling
#[derive(Parser, Debug)]
#[command(name = "lectern-admin")]
#[command(about = "Operational commands for a Lectern deployment", long_about = None)]
struct AdminCli {
    #[command(subcommand)]
    command: AdminCommand,

    /// Database URL (can also be set via DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Inspect or apply maintenance schema patches
    Migrate {
        #[command(subcommand)]
        command: MigrateCommand,
    },

    /// Reset the admin password
    ResetAdminPassword {
        /// Admin account email (can also be set via ADMIN_EMAIL env var)
        #[arg(long, env = "ADMIN_EMAIL", default_value = "admin@lectern.local")]
        email: String,

        /// New password; a random one is generated and printed when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Show each shipped patch against the ledger
    Status,

    /// Apply every patch the ledger does not already record
    Apply,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = AdminCli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: AdminCli) -> Result<()> {
    let database_url = cli
        .database_url
        .clone()
        .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;
    let pool = db::create_pool(&database_url, 5).await?;

    match cli.command {
        AdminCommand::Migrate { command } => {
            let bus = Arc::new(EventBus::new(16));
            let audit = Arc::new(AuditService::new(pool.clone(), bus));
            let maintenance = MaintenanceService::new(pool.clone(), audit);

            match command {
                MigrateCommand::Status => {
                    let statuses = maintenance.status().await?;
                    for status in statuses {
                        let state = if status.drifted {
                            "drifted"
                        } else if status.applied {
                            "applied"
                        } else {
                            "pending"
                        };
                        match status.applied_at {
                            Some(at) => println!("{:<44} {:<8} {}", status.name, state, at),
                            None => println!("{:<44} {}", status.name, state),
                        }
                    }
                }
                MigrateCommand::Apply => {
                    let (actor_id, actor_email) = resolve_admin_actor(&pool).await?;
                    let report = maintenance.apply_pending(actor_id, &actor_email).await?;
                    println!("Applied: {}", report.applied.len());
                    for name in &report.applied {
                        println!("  {}", name);
                    }
                    println!("Skipped: {}", report.skipped.len());
                }
            }
        }
        AdminCommand::ResetAdminPassword { email, password } => {
            reset_admin_password(&pool, &email, password).await?;
        }
    }

    Ok(())
}

/// Maintenance runs are audited, and the events table requires a real
/// user row for the actor. CLI runs are attributed to the admin account.
async fn resolve_admin_actor(pool: &sqlx::PgPool) -> Result<(uuid::Uuid, String)> {
    let row: Option<(uuid::Uuid, String)> = sqlx::query_as(
        "SELECT id, email FROM users WHERE role = 'admin' AND is_active
         ORDER BY created_at LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| {
        AppError::NotFound(
            "No admin account exists yet; start the server once to provision it".to_string(),
        )
    })
}

async fn reset_admin_password(
    pool: &sqlx::PgPool,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let (password, generated) = match password {
        Some(p) if !p.is_empty() => (p, false),
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

    let updated = sqlx::query(
        "UPDATE users SET password_hash = $2, must_change_password = $3, updated_at = NOW()
         WHERE email = $1 AND role = 'admin'",
    )
    .bind(email)
    .bind(&password_hash)
    .bind(generated)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound(format!(
            "No admin account with email {}",
            email
        )));
    }

    if generated {
        println!("Password for {} reset to: {}", email, password);
        println!("The account must change it at next login.");
    } else {
        println!("Password for {} updated.", email);
    }

    Ok(())
}
