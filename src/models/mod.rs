//! Model seams for the tracking core
//!
//! Process dynamics and batched observation scoring. The filter owns
//! neither: models are configured once per session and only invoked.

pub mod observation;
pub mod process;

pub use observation::*;
pub use process::*;
