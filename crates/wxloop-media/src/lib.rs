//! Media layer for wxloop.
//!
//! This crate provides:
//! - The `MediaResource` abstraction over playable video loops
//! - `StreamOptimizer`, the pool that prepares resources and reclaims idle ones
//! - An in-process virtual backend used by the simulator and tests

pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod options;
pub mod resource;
pub mod virtual_media;

pub use error::{MediaError, MediaResult};
pub use optimizer::{ActiveVideoHandle, HandleInfo, PoolStats, StreamOptimizer};
pub use options::{OptimizeOptions, PoolConfig, Priority};
pub use resource::{MediaEvent, MediaFactory, MediaResource, PlaybackFlags, PreloadStrategy};
pub use virtual_media::{VirtualMediaFactory, VirtualMediaResource};
