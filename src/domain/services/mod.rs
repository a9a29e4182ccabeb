mod aggregator;
pub mod prompts;
mod relay;
mod session_manager;

pub use aggregator::*;
pub use relay::*;
pub use session_manager::*;
