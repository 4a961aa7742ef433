mod health;
mod metrics;
mod resources;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use resources::{get_resource_handler, put_resource_handler};
