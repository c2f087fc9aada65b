pub mod app_config;
pub mod envelope;
pub mod http_client;

pub use app_config::Config;
pub use http_client::BackendClient;
