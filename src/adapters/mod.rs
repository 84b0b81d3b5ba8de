// Adapters layer: concrete implementations for external systems (HTTP API, local session storage).

pub mod http;
pub mod storage;

pub use http::ApiClient;
pub use storage::LocalStorage;
