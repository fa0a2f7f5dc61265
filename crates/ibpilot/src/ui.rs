//! The widget capability surface the automation depends on.
//!
//! The host process implements [`UiFacade`] on top of whatever toolkit or
//! accessibility bridge reaches the workstation's windows. Every method is
//! synchronous and may only be called from a turn of the UI lane.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;

/// Opaque identity of a top-level window. Holding one never keeps the window alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRef(pub u64);

/// Opaque identity of a component inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef(pub u64);

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    Frame,
    Dialog,
    Other,
}

/// Where a positional lookup (such as the n-th text field) starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Window(WindowRef),
    Component(ComponentRef),
}

impl From<WindowRef> for Scope {
    fn from(window: WindowRef) -> Self {
        Scope::Window(window)
    }
}

impl From<ComponentRef> for Scope {
    fn from(component: ComponentRef) -> Self {
        Scope::Component(component)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// A key press with modifiers, e.g. Ctrl+Alt+R.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    pub key: Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    F4,
}

impl KeyChord {
    pub const fn ctrl_alt(c: char) -> Self {
        Self {
            modifiers: Modifiers {
                ctrl: true,
                alt: true,
                shift: false,
            },
            key: Key::Char(c),
        }
    }

    pub const fn alt_f4() -> Self {
        Self {
            modifiers: Modifiers {
                ctrl: false,
                alt: true,
                shift: false,
            },
            key: Key::F4,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::F4 => f.write_str("F4"),
        }
    }
}

pub trait UiFacade: Send {
    fn window_kind(&self, window: WindowRef) -> WindowKind;

    fn title(&self, window: WindowRef) -> Option<String>;

    fn is_visible(&self, window: WindowRef) -> bool;

    fn set_visible(&self, window: WindowRef, visible: bool);

    /// Any component whose label or accessible name matches `label`.
    fn find_component(&self, window: WindowRef, label: &str) -> Option<ComponentRef>;

    /// A static text label containing `text`.
    fn find_label(&self, window: WindowRef, text: &str) -> Option<ComponentRef>;

    fn find_button(&self, window: WindowRef, label: &str) -> Option<ComponentRef>;

    fn find_toggle_button(&self, window: WindowRef, label: &str) -> Option<ComponentRef>;

    fn find_check_box(&self, window: WindowRef, label: &str) -> Option<ComponentRef>;

    /// The `index`-th editable text field below `scope`, in tab order.
    fn find_text_field(&self, scope: Scope, index: usize) -> Option<ComponentRef>;

    /// A menu item reached through `path`, e.g. `["Edit", "Global Configuration..."]`.
    fn find_menu_item(&self, window: WindowRef, path: &[&str]) -> Option<ComponentRef>;

    /// Activates a button, toggles a checkbox or toggle button, or fires a menu item.
    fn click(&self, component: ComponentRef);

    fn is_enabled(&self, component: ComponentRef) -> bool;

    fn is_selected(&self, component: ComponentRef) -> bool;

    fn set_selected(&self, component: ComponentRef, selected: bool);

    fn get_text(&self, component: ComponentRef) -> Option<String>;

    fn set_text(&self, component: ComponentRef, value: &str);

    fn focus(&self, component: ComponentRef);

    /// Selects a node in a settings tree, returning false if the path is absent.
    fn select_config_section(&self, window: WindowRef, path: &[&str]) -> bool;

    fn send_keystroke(&self, window: WindowRef, chord: KeyChord);

    fn title_contains(&self, window: WindowRef, text: &str) -> bool {
        self.title(window)
            .map(|title| title.contains(text))
            .unwrap_or(false)
    }

    /// Clicks the enabled button labelled `label`; false if absent or disabled.
    fn click_button(&self, window: WindowRef, label: &str) -> bool {
        match self.find_button(window, label) {
            Some(button) if self.is_enabled(button) => {
                self.click(button);
                true
            }
            _ => false,
        }
    }
}

/// Short description of a window for log lines.
pub fn describe(ui: &dyn UiFacade, window: WindowRef) -> String {
    match ui.title(window) {
        Some(title) if !title.is_empty() => format!("'{title}'"),
        _ => window.to_string(),
    }
}

/// Selects `checkbox` state, clicking only when it differs.
pub fn ensure_check_box(
    ui: &dyn UiFacade,
    window: WindowRef,
    label: &str,
    selected: bool,
) -> Result<bool, AutomationError> {
    let check_box = ui
        .find_check_box(window, label)
        .ok_or_else(|| AutomationError::not_found(format!("'{label}' checkbox")))?;
    let changed = ui.is_selected(check_box) != selected;
    if changed {
        ui.set_selected(check_box, selected);
    }
    Ok(changed)
}

/// Clicks the toggle button `label` unless it is already selected.
pub fn ensure_toggle(
    ui: &dyn UiFacade,
    window: WindowRef,
    label: &str,
) -> Result<(), AutomationError> {
    let button = ui
        .find_toggle_button(window, label)
        .ok_or_else(|| AutomationError::not_found(format!("'{label}' toggle button")))?;
    if !ui.is_selected(button) {
        ui.click(button);
    }
    Ok(())
}
