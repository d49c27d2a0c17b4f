use std::env;

/// Deployment environment, read from `ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
  Development,
  Production,
}

/// Process-wide configuration, populated from environment variables.
/// Every field here is a declared, typed env var with a documented
/// default; there are no other runtime-tunable knobs.
#[derive(Debug, Clone)]
pub struct Config {
  pub sample_rate: u32,
  pub block_size: usize,
  pub min_frequency_hz: f32,
  pub max_frequency_hz: f32,
  pub cors_origins: Vec<String>,
  pub log_level: String,
  pub log_file: Option<String>,
  pub api_key: Option<String>,
  pub allowed_hosts: Vec<String>,
  pub environment: Environment,
  pub bind_addr: String,
}

impl Config {
  pub fn from_env() -> Self {
    Self {
      sample_rate: env_var("YURAGI_SAMPLE_RATE", 44_100),
      block_size: env_var("YURAGI_BLOCK_SIZE", 512),
      min_frequency_hz: env_var("YURAGI_MIN_FREQUENCY_HZ", crate::engine::waveform::MIN_FREQUENCY_HZ),
      max_frequency_hz: env_var("YURAGI_MAX_FREQUENCY_HZ", crate::engine::waveform::MAX_FREQUENCY_HZ),
      cors_origins: env_list("YURAGI_CORS_ORIGINS", vec!["*".to_string()]),
      log_level: env::var("YURAGI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
      log_file: env::var("YURAGI_LOG_FILE").ok(),
      api_key: env::var("YURAGI_API_KEY").ok(),
      allowed_hosts: env_list("YURAGI_ALLOWED_HOSTS", vec!["*".to_string()]),
      environment: match env::var("YURAGI_ENVIRONMENT").as_deref() {
        Ok("production") => Environment::Production,
        _ => Environment::Development,
      },
      bind_addr: env::var("YURAGI_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
    }
  }
}

fn env_var<T: std::str::FromStr>(key: &str, default: T) -> T {
  env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
  match env::var(key) {
    Ok(v) if !v.trim().is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
    _ => default,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_without_env_overrides() {
    let cfg = Config::from_env();
    assert!(cfg.sample_rate > 0);
    assert!(cfg.block_size > 0);
    assert_eq!(cfg.environment, Environment::Development);
  }
}
