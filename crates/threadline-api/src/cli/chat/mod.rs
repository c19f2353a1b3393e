//! Interactive CLI chat for Threadline.

pub mod input;
pub mod loop_runner;
pub mod renderer;
