pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;

use std::net::SocketAddr;

pub use config::Config;
use db::Store;
use services::{AccountService, NewAccount, SeaOrmAccountService};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "serve" | "-s" | "--serve" => run_server(config).await,

        "create-superuser" => {
            if args.len() < 5 {
                println!("Usage: userbase create-superuser <username> <email> <password>");
                return Ok(());
            }
            cmd_create_superuser(&config, &args[2], &args[3], &args[4]).await
        }

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        unknown => {
            println!("Unknown command: {}", unknown);
            print_help();
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Userbase v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let state = api::create_app_state_from_config(config).await?;
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("🌐 API server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            error!("Server error: {}", e);
        }
    });

    info!("Server running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Server stopped");

    Ok(())
}

async fn cmd_create_superuser(
    config: &Config,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let service = SeaOrmAccountService::new(store, config.clone());

    let account = service
        .create_superuser(NewAccount {
            username: username.to_string(),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            ..NewAccount::default()
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create superuser: {e}"))?;

    println!("✓ Superuser '{}' created (id {})", account.username, account.id);
    Ok(())
}

fn print_help() {
    println!("Userbase - User Account Service");
    println!();
    println!("USAGE:");
    println!("  userbase <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  serve                                      Run the HTTP API server");
    println!("  create-superuser <username> <email> <pw>   Create an admin account");
    println!("  init                                       Create default config file");
    println!("  help                                       Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  userbase init                              # Write config.toml");
    println!("  userbase serve                             # Start the API on the configured port");
    println!("  userbase create-superuser admin admin@example.com s3cret");
}
