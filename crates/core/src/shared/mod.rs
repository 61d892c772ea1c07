pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod monitor_config;
pub mod region;
pub mod timecode;
pub mod video_metadata;
