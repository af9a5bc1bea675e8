#[allow(clippy::module_inception)]
mod config;

pub use self::config::{
    default_tokens, ChainSettings, MonitorSettings, PriceFeedSettings, Settings, TokenSettings,
    MAX_TOKEN_DECIMALS,
};
