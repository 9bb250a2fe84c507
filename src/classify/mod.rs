//! Line classification: mapping one line of child output to a severity level.

mod classifier;
mod level;

pub use classifier::*;
pub use level::*;
