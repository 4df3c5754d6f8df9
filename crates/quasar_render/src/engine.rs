//! Engine: window, renderer and the main loop
//!
//! [`Engine`] owns the window and the renderer and drives an [`Application`]
//! through poll, update and draw until the window closes or the application
//! asks to exit.

use thiserror::Error;

use crate::assets::AssetError;
use crate::config::{ConfigError, EngineConfig};
use crate::events::{Event, EventBus};
use crate::foundation::{logging, time::FrameTimer};
use crate::render::{FrameOutcome, Renderer, VulkanError, Window, WindowError};

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Renderer failure
    #[error("Renderer error: {0}")]
    Render(#[from] VulkanError),

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Asset loading failure
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Application-defined failure
    #[error("Application error: {0}")]
    Application(String),
}

/// Application lifecycle trait
///
/// Implement this to drive the engine. The renderer is handed over once for
/// resource uploads; afterwards the engine draws a frame per update.
pub trait Application {
    /// Called once after the renderer is up
    fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), EngineError>;

    /// Called every frame before drawing, with seconds since the last frame
    fn update(&mut self, delta_time: f32);

    /// Inspect a window event. Return true to consume it before it reaches
    /// the event bus.
    fn handle_event(&mut self, _event: &Event) -> bool {
        false
    }

    /// Return true to leave the main loop
    fn should_exit(&self) -> bool {
        false
    }
}

/// What a window event means for the window and renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowAction {
    Close,
    Resize { width: u32, height: u32 },
    Suspend,
    Resume,
}

const fn window_action(event: &Event) -> Option<WindowAction> {
    match *event {
        Event::Quit => Some(WindowAction::Close),
        Event::Resized { width, height } => Some(WindowAction::Resize { width, height }),
        Event::Suspended => Some(WindowAction::Suspend),
        Event::Resumed => Some(WindowAction::Resume),
        _ => None,
    }
}

/// Main engine struct
pub struct Engine {
    renderer: Renderer,
    window: Window,
    events: EventBus,
    timer: FrameTimer,
    config: EngineConfig,
}

impl Engine {
    /// Open a `width` x `height` window titled `app_name` and bring up the renderer
    pub fn init(app_name: &str, width: u32, height: u32) -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::new(app_name, width, height))
    }

    /// Create an engine from a full configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        logging::init(&config.log_level);
        config.validate()?;

        log::info!("Initializing engine...");
        let window = Window::new(&config.window)?;
        let app_name = config.renderer.application_name.clone();
        let renderer = Renderer::init(&app_name, &window, config.renderer.clone())?;

        Ok(Self {
            renderer,
            window,
            events: EventBus::new(),
            timer: FrameTimer::new(),
            config,
        })
    }

    /// Run the main loop until the window closes or `app` asks to exit
    pub fn run<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        app.initialize(&mut self.renderer)?;

        log::info!("Starting main loop...");
        self.timer.reset_clock();

        while !self.window.should_close() && !app.should_exit() {
            let events = if self.window.is_suspended() {
                // Nothing to draw while minimized; block instead of spinning
                self.window.wait_events()
            } else {
                self.window.poll_events()
            };
            for event in events {
                self.apply_window_event(&event);
                if !app.handle_event(&event) {
                    self.events.send(event);
                }
            }
            self.events.dispatch_deferred();

            if let Some(fps) = self.timer.tick() {
                log::debug!("FPS: {:.1}", fps);
            }
            let delta_time = self.timer.delta_time();
            app.update(delta_time);

            if let FrameOutcome::Skipped(reason) = self.renderer.draw_frame(delta_time)? {
                log::trace!("Frame skipped: {:?}", reason);
            }
        }

        self.renderer.shutdown();
        log::info!("Engine shutdown complete");
        Ok(())
    }

    fn apply_window_event(&mut self, event: &Event) {
        match window_action(event) {
            Some(WindowAction::Close) => self.window.set_should_close(true),
            Some(WindowAction::Resize { width, height }) => self.renderer.notify_resized(width, height),
            Some(WindowAction::Suspend) => self.renderer.set_suspended(true),
            Some(WindowAction::Resume) => {
                self.renderer.set_suspended(false);
                self.timer.reset_clock();
            }
            None => {}
        }
    }

    /// The renderer
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// The window
    pub const fn window(&self) -> &Window {
        &self.window
    }

    /// Event bus for registering handlers
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Configuration the engine was created with
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_events_map_to_actions() {
        assert_eq!(window_action(&Event::Quit), Some(WindowAction::Close));
        assert_eq!(
            window_action(&Event::Resized { width: 800, height: 600 }),
            Some(WindowAction::Resize { width: 800, height: 600 })
        );
        assert_eq!(window_action(&Event::Suspended), Some(WindowAction::Suspend));
        assert_eq!(window_action(&Event::Resumed), Some(WindowAction::Resume));
        assert_eq!(window_action(&Event::KeyPressed { key: 32 }), None);
    }

    #[test]
    fn test_errors_convert_into_engine_error() {
        let err: EngineError = VulkanError::NoSuitableDevice.into();
        assert!(matches!(err, EngineError::Render(_)));

        let err: EngineError = ConfigError::Invalid("bad".to_string()).into();
        assert_eq!(err.to_string(), "Config error: Invalid configuration: bad");
    }
}
