pub mod catalog;
pub mod directory;
pub mod runtime;

pub use catalog::tool_catalog;
pub use directory::{DemoDirectory, ResidentDirectory};
pub use runtime::{ToolContext, ToolRuntime, TelephonyControl};
