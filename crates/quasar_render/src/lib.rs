//! # Quasar Render
//!
//! Vulkan rendering backend for real-time applications. The crate owns the GPU
//! device, the presentable image chain, per-frame CPU/GPU synchronization and
//! the submission pipeline that turns draw requests into displayed frames.
//!
//! ## Features
//!
//! - **Device selection**: deterministic GPU scoring with queue-family mapping
//! - **Swapchain management**: recreation on resize, out-of-date and suspend
//! - **Frames in flight**: fence/semaphore ring bounded to N frames
//! - **Resource factory**: staging uploads, memory-type selection, mip chains
//! - **Typed events**: closed event variants dispatched by tag
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quasar_render::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), EngineError> {
//!         renderer.upload_mesh(&MeshData::quad())?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _delta_time: f32) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::init("My App", 1280, 720)?;
//!     engine.run(&mut MyApp)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod engine;
pub mod events;
pub mod foundation;
pub mod platform;
pub mod render;

/// Commonly used types
pub mod prelude {
    pub use crate::assets::{MeshData, TextureData, Vertex};
    pub use crate::config::{Config, ConfigError, EngineConfig, RendererConfig};
    pub use crate::engine::{Application, Engine, EngineError};
    pub use crate::events::{Event, EventBus, EventHandler, EventKind};
    pub use crate::platform::PlatformCapabilities;
    pub use crate::render::{
        FrameOutcome, FrameStats, Renderer, VulkanError, VulkanResult, Window,
    };
}
