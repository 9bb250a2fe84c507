//! Child process plumbing: command lines, spawn options, spawning, and line
//! decoding.

mod command;
mod decode;
mod options;
mod spawn;

pub use command::*;
pub use decode::*;
pub use options::*;
pub use spawn::*;
