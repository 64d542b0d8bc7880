//! CLI module for Claude Code process spawning and stream parsing.

mod content;
mod events;
mod options;
mod process;
mod stream;
mod usage;

pub use content::*;
pub use events::*;
pub use options::*;
pub use process::*;
pub use stream::*;
pub use usage::*;
