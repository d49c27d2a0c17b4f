use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Initializes the global `tracing` subscriber: an `EnvFilter` seeded from
/// `Config::log_level`, console output always, and an optional rolling
/// file sink when `log_file` is set. Returns the file appender guard,
/// which must be held for the process lifetime (dropping it stops the
/// background flush thread).
pub fn init(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

  match &config.log_file {
    Some(path) => {
      let directory = std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new("."));
      let file_name = std::path::Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "yuragi-haptic-core.log".to_string());
      let file_appender = tracing_appender::rolling::daily(directory, file_name);
      let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      fmt().with_env_filter(filter).init();
      None
    }
  }
}
