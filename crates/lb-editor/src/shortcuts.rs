//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. The map lives
//! in Rust so the WASM host and native tests resolve keys identically.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    Delete,
    SelectAll,
    /// Open the label editor on the single selected element.
    EditLabel,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,
    /// Space held: pointer-down pans instead of selecting.
    PanStart,

    // ── UI ──
    /// Cancel the live gesture or pending connection, else deselect.
    Cancel,
}

/// Resolves key events into shortcut actions.
///
/// Platform-aware: `meta` (⌘) and `ctrl` both count as the command key.
pub struct ShortcutMap;

impl ShortcutMap {
    /// `key` is the `KeyboardEvent.key` value (e.g. `"a"`, `"Delete"`).
    /// Returns `None` if the combo has no binding.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        if modifiers.command() {
            return match key {
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" | "_" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ZoomReset),
                _ => None,
            };
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Cancel),
            "Enter" | "F2" => Some(ShortcutAction::EditLabel),
            " " => Some(ShortcutAction::PanStart),
            _ => None,
        }
    }
}
