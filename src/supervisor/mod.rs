//! Process supervision: running a command and routing its output.

mod builder;
mod error;
mod result;
mod runner;
mod state;

pub use builder::*;
pub use error::*;
pub use result::*;
pub use runner::*;
pub use state::*;
