//! Input abstraction layer.
//!
//! Normalizes mouse, touch, and pen events into a unified `InputEvent`
//! consumed by the editor. Coordinates are device pixels relative to the
//! canvas surface.

/// Host-assigned pointer id (`PointerEvent.pointerId`).
pub type PointerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

impl PointerButton {
    /// Map `MouseEvent.button` (0 primary, 1 middle, 2 secondary).
    pub fn from_dom(button: i16) -> Self {
        match button {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    /// ⌘ on macOS, Ctrl elsewhere.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        pointer: PointerId,
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerMove {
        pointer: PointerId,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    PointerUp {
        pointer: PointerId,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    /// The host lost the pointer (touch cancel, capture lost, window blur).
    PointerCancel { pointer: PointerId },
    DoubleClick { x: f64, y: f64 },
    /// Wheel or pinch. `zoom` is a factor; 1.0 means "just scroll".
    Scroll { x: f64, y: f64, dx: f64, dy: f64, zoom: f64 },
    KeyDown { key: String, modifiers: Modifiers },
    KeyUp { key: String, modifiers: Modifiers },
    /// Committed text from the host's input element (label editing).
    TextInput { text: String },
}

impl InputEvent {
    /// Primary-button down with no modifiers.
    pub fn down(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::PointerDown {
            pointer,
            x,
            y,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn moved(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::PointerMove {
            pointer,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn up(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::PointerUp {
            pointer,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key(key: &str) -> Self {
        Self::KeyDown {
            key: key.to_string(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Extract position if this is a positioned event.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. }
            | Self::DoubleClick { x, y }
            | Self::Scroll { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }

    /// Pointer that produced this event, for capture checks.
    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            Self::PointerDown { pointer, .. }
            | Self::PointerMove { pointer, .. }
            | Self::PointerUp { pointer, .. }
            | Self::PointerCancel { pointer } => Some(*pointer),
            _ => None,
        }
    }
}
