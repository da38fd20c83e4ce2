mod settings;

pub use settings::{
    JwtConfig, LogConfig, OtelConfig, PushConfig, ServerConfig, Settings, StoreConfig,
};
