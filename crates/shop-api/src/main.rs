//! # Shop Server
//!
//! Order and payment fulfillment API.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAYPAL_CLIENT_ID=...
//! export PAYPAL_CLIENT_SECRET=...
//! export ACCESS_TOKEN_SECRET=...
//! export REFRESH_TOKEN_SECRET=...
//!
//! # Run the server
//! shop-server
//! ```

use shop_api::{routes, state::AppState};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::from_env().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    let (products, users) = state
        .store
        .read(|t| (t.products().count(), t.users().count()))
        .await;
    info!("Products loaded: {}, users loaded: {}", products, users);

    if !is_prod {
        issue_dev_credentials(&state).await;
    }

    let app = routes::create_router(state);

    info!("Shop server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

/// Log a credential pair for every seeded user so a local run is usable
/// without the external login service.
async fn issue_dev_credentials(state: &AppState) {
    let users = state
        .store
        .read(|t| {
            t.users()
                .map(|u| (u.id, u.name.clone()))
                .collect::<Vec<_>>()
        })
        .await;

    for (user_id, name) in users {
        match state.identity.rotate_refresh(user_id).await {
            Ok(pair) => info!(
                %user_id,
                name = %name,
                access_token = %pair.access_token,
                refresh_token = %pair.refresh_token,
                "development credentials"
            ),
            Err(e) => error!(%user_id, "could not issue credentials: {}", e),
        }
    }
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        () = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}

fn print_banner() {
    println!(
        r#"
  Shop Server
  ━━━━━━━━━━━━━━━━━━━━━━━
  Orders, stock and payments
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
