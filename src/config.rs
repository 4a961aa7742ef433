use clap::Parser;
use std::time::Duration;

use crate::rate_limit::ThrottleSettings;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "resource-gateway")]
#[command(about = "Rate limited, caching gateway in front of a resource store")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Base URL of the backing resource store
    // Example: "localhost:9000"; omit to keep resources in memory
    #[arg(short, long)]
    pub store_url: Option<String>,

    // Store request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub store_timeout: u64,

    // Rate limit max requests per window, per client
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // How long a client stays blocked after exceeding the limit, in seconds
    #[arg(long, default_value_t = 60)]
    pub ban_timeout: u64,
}

impl Args {
    pub fn throttle_settings(&self) -> ThrottleSettings {
        ThrottleSettings {
            max_requests_per_interval: self.rate_limit,
            interval: Duration::from_secs(self.rate_window),
            ban_timeout: Duration::from_secs(self.ban_timeout),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout)
    }
}
