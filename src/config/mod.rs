pub mod settings;

pub use settings::{ChatConfig, ServerConfig, Settings, UpstreamConfig, UpstreamType};
