pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod extract;
pub mod reporter;
pub mod state;
pub mod types;

/// NHL web API base URL (public, no auth required)
pub const NHL_API_BASE: &str = "https://api-web.nhle.com/v1";

/// Discord REST API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
