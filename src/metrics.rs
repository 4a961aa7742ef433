use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of requests").unwrap();
    pub static ref THROTTLED_TOTAL: Counter =
        register_counter!("gateway_throttled_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref STORE_FETCHES: Counter =
        register_counter!("gateway_store_fetches_total", "Fetches issued to the backing store").unwrap();
    pub static ref STORE_WRITES: Counter =
        register_counter!("gateway_store_writes_total", "Writes issued to the backing store").unwrap();
    pub static ref STORE_ERRORS: Counter =
        register_counter!("gateway_store_errors_total", "Failed store fetches and writes").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("gateway_cache_entries", "Current number of entries in cache").unwrap();
}

// Render every registered metric in the prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
