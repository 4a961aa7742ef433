use crate::service::ApiService;
use crate::store::JsonStore;

// app's shared state
pub struct AppState {
    pub service: ApiService<JsonStore>,
}
