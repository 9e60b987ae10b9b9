pub mod artifact;
pub mod config;
pub mod config_loader;
pub mod context;
pub mod error;
pub mod interaction;
pub mod retry;
pub mod state_machine;
pub mod tool_paths;
pub mod traits;

pub use artifact::*;
pub use config::*;
pub use config_loader::{ConfigLoadOptions, ConfigLoader, ConfigValidationResult};
pub use context::RunContext;
pub use error::*;
pub use interaction::*;
pub use retry::*;
pub use state_machine::{RunPhase, RunRecord, RunStateMachine};
pub use tool_paths::ToolPaths;
pub use traits::*;
