//! Post-processing chains
//!
//! A chain runs an ordered list of fullscreen steps over two ping-pong
//! buffers. The main chain ends at the display; the bloom and outline chains
//! stay offscreen and are composited into the main chain's input.

mod chain;
mod pingpong;
mod step;

pub use chain::PostprocessChain;
pub use pingpong::PingPong;
pub use step::{BlendMode, ChainTarget, ParamValue, PostprocessConfig, PostprocessStep, StepRecord};
