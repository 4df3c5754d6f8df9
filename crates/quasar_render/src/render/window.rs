//! Window management using GLFW
//!
//! The window is the renderer's windowing collaborator: it supplies the
//! surface, the drawable extent and resize/suspend notifications, which are
//! translated into typed [`Event`]s.

use ash::vk;
use thiserror::Error;

use crate::config::WindowConfig;
use crate::events::Event;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW reports no Vulkan support on this system
    #[error("Vulkan is not supported by the window system")]
    VulkanUnsupported,

    /// Surface creation through GLFW failed
    #[error("Failed to create Vulkan surface: {0:?}")]
    SurfaceCreation(vk::Result),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Tracks drawable-area transitions to derive suspend/resume events
#[derive(Debug, Default, Clone, Copy)]
pub struct DrawableTracker {
    suspended: bool,
}

impl DrawableTracker {
    /// Events produced by a framebuffer resize to `width` x `height`
    pub fn on_resize(&mut self, width: u32, height: u32) -> Vec<Event> {
        let zero_area = width == 0 || height == 0;
        match (self.suspended, zero_area) {
            (false, true) => {
                self.suspended = true;
                vec![Event::Suspended]
            }
            (true, true) => Vec::new(),
            (true, false) => {
                self.suspended = false;
                vec![Event::Resumed, Event::Resized { width, height }]
            }
            (false, false) => vec![Event::Resized { width, height }],
        }
    }

    /// Whether the drawable area is currently zero-sized
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    tracker: DrawableTracker,
}

impl Window {
    /// Create a window configured for Vulkan (no client API)
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_scroll_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created window '{}' ({}x{})", config.title, config.width, config.height);

        Ok(Self {
            glfw,
            window,
            events,
            tracker: DrawableTracker::default(),
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Set whether the window should close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window events without blocking
    pub fn poll_events(&mut self) -> Vec<Event> {
        self.glfw.poll_events();
        self.drain_events()
    }

    /// Block until at least one window event arrives.
    ///
    /// Used while suspended so a minimized application does not spin.
    pub fn wait_events(&mut self) -> Vec<Event> {
        self.glfw.wait_events();
        self.drain_events()
    }

    fn drain_events(&mut self) -> Vec<Event> {
        let mut translated = Vec::new();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Close => translated.push(Event::Quit),
                glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => {
                    translated.push(Event::KeyPressed { key: key as i32 });
                }
                glfw::WindowEvent::Key(key, _, glfw::Action::Release, _) => {
                    translated.push(Event::KeyReleased { key: key as i32 });
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let button = button as i32 as u8;
                    if action == glfw::Action::Press {
                        translated.push(Event::ButtonPressed { button });
                    } else if action == glfw::Action::Release {
                        translated.push(Event::ButtonReleased { button });
                    }
                }
                #[allow(clippy::cast_possible_truncation)]
                glfw::WindowEvent::CursorPos(x, y) => {
                    translated.push(Event::MouseMoved { x: x as f32, y: y as f32 });
                }
                #[allow(clippy::cast_possible_truncation)]
                glfw::WindowEvent::Scroll(_, y) => {
                    translated.push(Event::MouseWheel { delta: y as f32 });
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    let width = u32::try_from(width).unwrap_or(0);
                    let height = u32::try_from(height).unwrap_or(0);
                    translated.extend(self.tracker.on_resize(width, height));
                }
                _ => {}
            }
        }
        translated
    }

    /// Drawable size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (
            u32::try_from(width).unwrap_or(0),
            u32::try_from(height).unwrap_or(0),
        )
    }

    /// Whether the drawable area is zero-sized
    pub const fn is_suspended(&self) -> bool {
        self.tracker.is_suspended()
    }

    /// Instance extensions the window system needs for presentation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(WindowError::VulkanUnsupported)
    }

    /// Create a Vulkan surface for this window
    pub fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreation(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimize_then_restore() {
        let mut tracker = DrawableTracker::default();

        assert_eq!(tracker.on_resize(0, 0), vec![Event::Suspended]);
        assert!(tracker.is_suspended());
        assert!(tracker.on_resize(0, 600).is_empty());
        assert_eq!(
            tracker.on_resize(800, 600),
            vec![Event::Resumed, Event::Resized { width: 800, height: 600 }]
        );
        assert!(!tracker.is_suspended());
    }

    #[test]
    fn test_plain_resize() {
        let mut tracker = DrawableTracker::default();
        assert_eq!(tracker.on_resize(1024, 768), vec![Event::Resized { width: 1024, height: 768 }]);
    }
}
