pub mod ai;
pub mod scout;

pub use ai::AiConfig;
pub use scout::{FallbackPolicy, ScoutConfig};
