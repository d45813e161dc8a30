//! Small platform helpers shared by the editor crates.

pub mod fs;
pub mod source;
