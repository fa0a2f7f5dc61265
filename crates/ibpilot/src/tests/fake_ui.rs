//! In-memory widget tree standing in for the workstation's UI.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ui::{ComponentRef, KeyChord, Scope, UiFacade, WindowKind, WindowRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Button,
    Toggle,
    CheckBox,
    TextField,
    Label,
    MenuItem,
    Container,
}

#[derive(Debug)]
struct Widget {
    window: WindowRef,
    parent: Option<ComponentRef>,
    kind: WidgetKind,
    label: String,
    enabled: bool,
    selected: bool,
    text: String,
    disable_on_click: bool,
}

#[derive(Debug)]
struct FakeWindow {
    kind: WindowKind,
    title: String,
    visible: bool,
    sections: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    windows: HashMap<u64, FakeWindow>,
    widgets: Vec<Widget>,
    next_window: u64,
    clicks: Vec<String>,
    keystrokes: Vec<(WindowRef, KeyChord)>,
    focused: Option<ComponentRef>,
    selected_section: Option<String>,
}

impl State {
    fn widget(&self, component: ComponentRef) -> Option<&Widget> {
        self.widgets.get(component.0 as usize)
    }

    fn widget_mut(&mut self, component: ComponentRef) -> Option<&mut Widget> {
        self.widgets.get_mut(component.0 as usize)
    }

    fn find(&self, window: WindowRef, kind: WidgetKind, matches: impl Fn(&str) -> bool) -> Option<ComponentRef> {
        self.widgets
            .iter()
            .position(|w| w.window == window && w.kind == kind && matches(&w.label))
            .map(|i| ComponentRef(i as u64))
    }
}

/// Cloneable handle; every clone sees the same widget tree.
#[derive(Clone, Default)]
pub struct FakeUi {
    state: Arc<Mutex<State>>,
}

impl FakeUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn UiFacade> {
        Box::new(self.clone())
    }

    pub fn add_window(&self, kind: WindowKind, title: &str) -> WindowRef {
        let mut state = self.state.lock();
        state.next_window += 1;
        let window = WindowRef(state.next_window);
        state.windows.insert(
            window.0,
            FakeWindow {
                kind,
                title: title.to_string(),
                visible: true,
                sections: Vec::new(),
            },
        );
        window
    }

    fn add_widget(
        &self,
        window: WindowRef,
        parent: Option<ComponentRef>,
        kind: WidgetKind,
        label: &str,
    ) -> ComponentRef {
        let mut state = self.state.lock();
        state.widgets.push(Widget {
            window,
            parent,
            kind,
            label: label.to_string(),
            enabled: true,
            selected: false,
            text: String::new(),
            disable_on_click: false,
        });
        ComponentRef(state.widgets.len() as u64 - 1)
    }

    pub fn add_button(&self, window: WindowRef, label: &str) -> ComponentRef {
        self.add_widget(window, None, WidgetKind::Button, label)
    }

    pub fn add_toggle(&self, window: WindowRef, label: &str) -> ComponentRef {
        self.add_widget(window, None, WidgetKind::Toggle, label)
    }

    pub fn add_check_box(&self, window: WindowRef, label: &str, selected: bool) -> ComponentRef {
        let check_box = self.add_widget(window, None, WidgetKind::CheckBox, label);
        self.set_selected(check_box, selected);
        check_box
    }

    pub fn add_label(&self, window: WindowRef, text: &str) -> ComponentRef {
        self.add_widget(window, None, WidgetKind::Label, text)
    }

    pub fn add_container(&self, window: WindowRef, label: &str) -> ComponentRef {
        self.add_widget(window, None, WidgetKind::Container, label)
    }

    pub fn add_text_field(&self, window: WindowRef, parent: Option<ComponentRef>) -> ComponentRef {
        self.add_widget(window, parent, WidgetKind::TextField, "")
    }

    pub fn add_menu_item(&self, window: WindowRef, path: &[&str]) -> ComponentRef {
        self.add_widget(window, None, WidgetKind::MenuItem, &path.join(" > "))
    }

    pub fn add_section(&self, window: WindowRef, path: &[&str]) {
        if let Some(w) = self.state.lock().windows.get_mut(&window.0) {
            w.sections.push(path.join("/"));
        }
    }

    pub fn set_title(&self, window: WindowRef, title: &str) {
        if let Some(w) = self.state.lock().windows.get_mut(&window.0) {
            w.title = title.to_string();
        }
    }

    /// The button goes disabled as soon as it is clicked, like a login button.
    pub fn disable_on_click(&self, component: ComponentRef) {
        if let Some(widget) = self.state.lock().widget_mut(component) {
            widget.disable_on_click = true;
        }
    }

    pub fn set_enabled(&self, component: ComponentRef, enabled: bool) {
        if let Some(widget) = self.state.lock().widget_mut(component) {
            widget.enabled = enabled;
        }
    }

    /// Labels of every clicked component, in click order.
    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn click_count(&self, label: &str) -> usize {
        self.state.lock().clicks.iter().filter(|c| c.as_str() == label).count()
    }

    pub fn keystrokes(&self) -> Vec<(WindowRef, KeyChord)> {
        self.state.lock().keystrokes.clone()
    }

    pub fn focused(&self) -> Option<ComponentRef> {
        self.state.lock().focused
    }

    pub fn text(&self, component: ComponentRef) -> String {
        self.state
            .lock()
            .widget(component)
            .map(|w| w.text.clone())
            .unwrap_or_default()
    }

    pub fn selected(&self, component: ComponentRef) -> bool {
        self.state.lock().widget(component).is_some_and(|w| w.selected)
    }

    pub fn window_visible(&self, window: WindowRef) -> bool {
        self.state.lock().windows.get(&window.0).is_some_and(|w| w.visible)
    }

    pub fn selected_section(&self) -> Option<String> {
        self.state.lock().selected_section.clone()
    }
}

impl UiFacade for FakeUi {
    fn window_kind(&self, window: WindowRef) -> WindowKind {
        self.state
            .lock()
            .windows
            .get(&window.0)
            .map(|w| w.kind)
            .unwrap_or(WindowKind::Other)
    }

    fn title(&self, window: WindowRef) -> Option<String> {
        self.state.lock().windows.get(&window.0).map(|w| w.title.clone())
    }

    fn is_visible(&self, window: WindowRef) -> bool {
        self.window_visible(window)
    }

    fn set_visible(&self, window: WindowRef, visible: bool) {
        if let Some(w) = self.state.lock().windows.get_mut(&window.0) {
            w.visible = visible;
        }
    }

    fn find_component(&self, window: WindowRef, label: &str) -> Option<ComponentRef> {
        let state = self.state.lock();
        state
            .widgets
            .iter()
            .position(|w| w.window == window && w.label == label)
            .map(|i| ComponentRef(i as u64))
    }

    fn find_label(&self, window: WindowRef, text: &str) -> Option<ComponentRef> {
        self.state
            .lock()
            .find(window, WidgetKind::Label, |label| label.contains(text))
    }

    fn find_button(&self, window: WindowRef, label: &str) -> Option<ComponentRef> {
        self.state.lock().find(window, WidgetKind::Button, |l| l == label)
    }

    fn find_toggle_button(&self, window: WindowRef, label: &str) -> Option<ComponentRef> {
        self.state.lock().find(window, WidgetKind::Toggle, |l| l == label)
    }

    fn find_check_box(&self, window: WindowRef, label: &str) -> Option<ComponentRef> {
        self.state.lock().find(window, WidgetKind::CheckBox, |l| l == label)
    }

    fn find_text_field(&self, scope: Scope, index: usize) -> Option<ComponentRef> {
        let state = self.state.lock();
        state
            .widgets
            .iter()
            .enumerate()
            .filter(|(_, w)| w.kind == WidgetKind::TextField)
            .filter(|(_, w)| match scope {
                Scope::Window(window) => w.window == window,
                Scope::Component(parent) => w.parent == Some(parent),
            })
            .nth(index)
            .map(|(i, _)| ComponentRef(i as u64))
    }

    fn find_menu_item(&self, window: WindowRef, path: &[&str]) -> Option<ComponentRef> {
        let wanted = path.join(" > ");
        self.state.lock().find(window, WidgetKind::MenuItem, |l| l == wanted)
    }

    fn click(&self, component: ComponentRef) {
        let mut state = self.state.lock();
        let Some(widget) = state.widget_mut(component) else {
            return;
        };
        match widget.kind {
            WidgetKind::Toggle | WidgetKind::CheckBox => widget.selected = !widget.selected,
            WidgetKind::Button if widget.disable_on_click => widget.enabled = false,
            _ => {}
        }
        let label = widget.label.clone();
        state.clicks.push(label);
    }

    fn is_enabled(&self, component: ComponentRef) -> bool {
        self.state.lock().widget(component).is_some_and(|w| w.enabled)
    }

    fn is_selected(&self, component: ComponentRef) -> bool {
        self.selected(component)
    }

    fn set_selected(&self, component: ComponentRef, selected: bool) {
        if let Some(widget) = self.state.lock().widget_mut(component) {
            widget.selected = selected;
        }
    }

    fn get_text(&self, component: ComponentRef) -> Option<String> {
        self.state.lock().widget(component).map(|w| w.text.clone())
    }

    fn set_text(&self, component: ComponentRef, value: &str) {
        if let Some(widget) = self.state.lock().widget_mut(component) {
            widget.text = value.to_string();
        }
    }

    fn focus(&self, component: ComponentRef) {
        self.state.lock().focused = Some(component);
    }

    fn select_config_section(&self, window: WindowRef, path: &[&str]) -> bool {
        let wanted = path.join("/");
        let mut state = self.state.lock();
        let found = state
            .windows
            .get(&window.0)
            .is_some_and(|w| w.sections.contains(&wanted));
        if found {
            state.selected_section = Some(wanted);
        }
        found
    }

    fn send_keystroke(&self, window: WindowRef, chord: KeyChord) {
        self.state.lock().keystrokes.push((window, chord));
    }
}
