pub mod monitoring;
pub mod recognition;
pub mod shared;
pub mod video;
