use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex as AsyncMutex;

use yuragi_haptic_core::api::broadcast::BroadcastHub;
use yuragi_haptic_core::api::{router, AppState};
use yuragi_haptic_core::config::Config;
use yuragi_haptic_core::engine::controller::Controller;
use yuragi_haptic_core::engine::yuragi::YuragiAnimator;
use yuragi_haptic_core::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let config = Config::from_env();
  let _log_guard = logging::init(&config);

  tracing::info!(
    sample_rate = config.sample_rate,
    block_size = config.block_size,
    environment = ?config.environment,
    "starting yuragi haptic core"
  );

  let controller = Arc::new(
    Controller::new(config.sample_rate, config.block_size).context("failed to construct audio controller")?,
  );

  if let Err(e) = controller.start_streaming() {
    tracing::warn!(error = %e, "audio streaming unavailable at startup; serving render-only");
  }

  let animator = AsyncMutex::new(YuragiAnimator::new(Arc::clone(&controller)));
  let broadcast = BroadcastHub::new();

  let bind_addr = config.bind_addr.clone();
  let state = Arc::new(AppState { controller, animator, broadcast, config });
  let app = router(state);

  let listener = tokio::net::TcpListener::bind(&bind_addr).await.context("failed to bind listener")?;
  tracing::info!(addr = %bind_addr, "listening");

  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }
  tracing::info!("shutdown signal received");
}
