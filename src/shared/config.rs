use anyhow::bail;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fiscal: FiscalConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FiscalConfig {
    /// Calendar month (1-12) the fiscal year starts on. The national fiscal
    /// year starts in July, so Q1 covers JUL-SEP.
    pub start_month: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub filter: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok();

        let start_month = match env::var("FISCAL_START_MONTH") {
            Ok(raw) => raw.parse::<u32>()?,
            Err(_) => 7,
        };
        if !(1..=12).contains(&start_month) {
            bail!("FISCAL_START_MONTH must be between 1 and 12, got {start_month}");
        }

        Ok(Self {
            fiscal: FiscalConfig { start_month },
            log: LogConfig {
                filter: env::var("LOG_FILTER").unwrap_or_else(|_| "planserver=info".to_string()),
            },
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fiscal: FiscalConfig { start_month: 7 },
            log: LogConfig {
                filter: "planserver=info".to_string(),
            },
        }
    }
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
