pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used items
pub use api::{CatalogSource, CfwGuideApi};
pub use config::Settings;
pub use error::{CommandError, ConfigError, FetchError};
pub use models::cache::{CachedFetch, TtlCache};
pub use models::cooldown::{CooldownRegistry, Rate};
pub use services::catalog_service::CatalogService;
pub use services::cooldowns::{CommandCooldowns, Invoker};
pub use utils::clock::{Clock, ManualClock, SystemClock};
