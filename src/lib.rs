pub mod api;
pub mod config;
pub mod http_client;
pub mod raven_api_client;
pub mod services;
pub mod vehicle_lookup;

pub use services::session;
pub use services::settings;
