//! Typed event bus
//!
//! Key principles:
//! - Closed set of event variants; payloads are typed fields, not lookups
//! - Handlers register for one [`EventKind`] and only see matching events
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Immediate and deferred delivery

use std::collections::{HashMap, VecDeque};

/// Application and window events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// The application should shut down
    Quit,
    /// Keyboard key pressed (platform key code)
    KeyPressed {
        /// Platform key code
        key: i32,
    },
    /// Keyboard key released
    KeyReleased {
        /// Platform key code
        key: i32,
    },
    /// Mouse button pressed
    ButtonPressed {
        /// Button index, 0 = left
        button: u8,
    },
    /// Mouse button released
    ButtonReleased {
        /// Button index, 0 = left
        button: u8,
    },
    /// Cursor moved, in window coordinates
    MouseMoved {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Scroll wheel moved
    MouseWheel {
        /// Vertical scroll amount
        delta: f32,
    },
    /// Drawable area changed to a non-zero size, in pixels
    Resized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// Drawable area became zero-sized (minimized)
    Suspended,
    /// Drawable area became visible again
    Resumed,
}

/// Tag identifying an [`Event`] variant, used as the dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Quit`]
    Quit,
    /// [`Event::KeyPressed`]
    KeyPressed,
    /// [`Event::KeyReleased`]
    KeyReleased,
    /// [`Event::ButtonPressed`]
    ButtonPressed,
    /// [`Event::ButtonReleased`]
    ButtonReleased,
    /// [`Event::MouseMoved`]
    MouseMoved,
    /// [`Event::MouseWheel`]
    MouseWheel,
    /// [`Event::Resized`]
    Resized,
    /// [`Event::Suspended`]
    Suspended,
    /// [`Event::Resumed`]
    Resumed,
}

impl Event {
    /// The variant tag of this event
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Quit => EventKind::Quit,
            Self::KeyPressed { .. } => EventKind::KeyPressed,
            Self::KeyReleased { .. } => EventKind::KeyReleased,
            Self::ButtonPressed { .. } => EventKind::ButtonPressed,
            Self::ButtonReleased { .. } => EventKind::ButtonReleased,
            Self::MouseMoved { .. } => EventKind::MouseMoved,
            Self::MouseWheel { .. } => EventKind::MouseWheel,
            Self::Resized { .. } => EventKind::Resized,
            Self::Suspended => EventKind::Suspended,
            Self::Resumed => EventKind::Resumed,
        }
    }
}

/// Event handler trait
///
/// Returns true if the event was consumed, which stops forwarding to the
/// remaining handlers of that kind.
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &Event) -> bool;
}

impl<F> EventHandler for F
where
    F: FnMut(&Event) -> bool,
{
    fn on_event(&mut self, event: &Event) -> bool {
        self(event)
    }
}

/// Event bus with a dispatch table keyed by [`EventKind`]
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Box<dyn EventHandler>>>,
    deferred: VecDeque<Event>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers are invoked in registration order.
    pub fn subscribe(&mut self, kind: EventKind, handler: impl EventHandler + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Deliver an event now. Returns whether a handler consumed it.
    pub fn send(&mut self, event: Event) -> bool {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return false;
        };

        handlers.iter_mut().any(|handler| handler.on_event(&event))
    }

    /// Queue an event for the next [`dispatch_deferred`](Self::dispatch_deferred)
    pub fn post(&mut self, event: Event) {
        self.deferred.push_back(event);
    }

    /// Deliver queued events in FIFO order.
    ///
    /// Returns the events nobody consumed so the caller can apply its own
    /// default handling.
    pub fn dispatch_deferred(&mut self) -> Vec<Event> {
        let pending = std::mem::take(&mut self.deferred);
        pending
            .into_iter()
            .filter(|event| !self.send(*event))
            .collect()
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Drop all queued events; handlers stay registered
    pub fn clear(&mut self) {
        self.deferred.clear();
    }
}
