//! Backend abstraction layer
//!
//! Provides the trait and types every backend implements: wgpu for real
//! output and a recording backend for deterministic headless runs.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use recording::RecordingBackend;
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
