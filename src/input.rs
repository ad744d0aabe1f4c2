// ═══════════════════════════════════════════════════════════════════════════
// KEYBINDINGS AND POINTER MAPPING
// ═══════════════════════════════════════════════════════════════════════════

use std::collections::HashMap;

use crate::components::tools::Tool;

/// Keys the editor reacts to.  Character keys are stored upper-cased.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Delete,
    Backspace,
    Escape,
}

impl Key {
    pub fn char(c: char) -> Self {
        Key::Char(c.to_ascii_uppercase())
    }

    fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Delete => "Delete".to_string(),
            Key::Backspace => "Backspace".to_string(),
            Key::Escape => "Escape".to_string(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Delete" => Some(Key::Delete),
            "Backspace" => Some(Key::Backspace),
            "Escape" | "Esc" => Some(Key::Escape),
            _ => {
                let mut chars = s.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Some(Key::char(c))
            }
        }
    }
}

/// A physical key press as reported by the host.  `ctrl` and `meta` are
/// both accepted as the command modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false, meta: false, shift: false, alt: false }
    }
    pub fn ctrl(key: Key) -> Self {
        Self { ctrl: true, ..Self::plain(key) }
    }
    pub fn meta(key: Key) -> Self {
        Self { meta: true, ..Self::plain(key) }
    }
    pub fn ctrl_shift(key: Key) -> Self {
        Self { ctrl: true, shift: true, ..Self::plain(key) }
    }
}

/// A bindable key combination.  `ctrl` stands for Ctrl on Windows/Linux and
/// Cmd on macOS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: Key,
}

impl KeyCombo {
    pub fn key(key: Key) -> Self {
        Self { ctrl: false, shift: false, alt: false, key }
    }
    pub fn ctrl_key(key: Key) -> Self {
        Self { ctrl: true, shift: false, alt: false, key }
    }
    pub fn ctrl_shift_key(key: Key) -> Self {
        Self { ctrl: true, shift: true, alt: false, key }
    }

    pub fn matches(&self, press: &KeyPress) -> bool {
        self.key == press.key
            && self.ctrl == (press.ctrl || press.meta)
            && self.shift == press.shift
            && self.alt == press.alt
    }

    /// Human-readable display string
    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("Ctrl".to_string()); }
        if self.shift { parts.push("Shift".to_string()); }
        if self.alt { parts.push("Alt".to_string()); }
        parts.push(self.key.name());
        parts.join("+")
    }

    /// Serialize to config string, e.g. `ctrl+shift+key:Z`
    pub fn to_config_string(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("ctrl".to_string()); }
        if self.shift { parts.push("shift".to_string()); }
        if self.alt { parts.push("alt".to_string()); }
        parts.push(format!("key:{}", self.key.name()));
        parts.join("+")
    }

    pub fn from_config_string(s: &str) -> Option<Self> {
        let mut ctrl = false;
        let mut shift = false;
        let mut alt = false;
        let mut key = None;
        for part in s.split('+') {
            let part = part.trim();
            match part {
                "ctrl" => ctrl = true,
                "shift" => shift = true,
                "alt" => alt = true,
                _ => key = Some(Key::parse(part.strip_prefix("key:")?)?),
            }
        }
        Some(Self { ctrl, shift, alt, key: key? })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditorAction {
    Undo,
    Redo,
    Save,
    Open,
    Copy,
    Cut,
    Paste,
    SelectAll,
    DeleteSelection,
    CancelSelection,
    Clear,
    ViewInBlack,
    BrushSizeDecrease,
    BrushSizeIncrease,
    ToolBrush,
    ToolPencil,
    ToolEraser,
    ToolSpray,
    ToolBucket,
    ToolEyedropper,
    ToolRectangle,
    ToolCircle,
    ToolLine,
    ToolText,
    ToolSelect,
    ToolMove,
}

impl EditorAction {
    pub fn all() -> &'static [EditorAction] {
        use EditorAction::*;
        &[
            Undo, Redo, Save, Open, Copy, Cut, Paste, SelectAll, DeleteSelection,
            CancelSelection, Clear, ViewInBlack, BrushSizeDecrease, BrushSizeIncrease,
            ToolBrush, ToolPencil, ToolEraser, ToolSpray, ToolBucket, ToolEyedropper,
            ToolRectangle, ToolCircle, ToolLine, ToolText, ToolSelect, ToolMove,
        ]
    }

    /// Name used in `keybind.<Name>=` config lines.
    pub fn config_name(&self) -> String {
        format!("{:?}", self)
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.config_name() == name)
    }

    /// Tool selected by this action, if it is a tool shortcut.
    pub fn tool(&self) -> Option<Tool> {
        match self {
            EditorAction::ToolBrush => Some(Tool::Brush),
            EditorAction::ToolPencil => Some(Tool::Pencil),
            EditorAction::ToolEraser => Some(Tool::Eraser),
            EditorAction::ToolSpray => Some(Tool::Spray),
            EditorAction::ToolBucket => Some(Tool::Bucket),
            EditorAction::ToolEyedropper => Some(Tool::Eyedropper),
            EditorAction::ToolRectangle => Some(Tool::Rectangle),
            EditorAction::ToolCircle => Some(Tool::Circle),
            EditorAction::ToolLine => Some(Tool::Line),
            EditorAction::ToolText => Some(Tool::Text),
            EditorAction::ToolSelect => Some(Tool::Select),
            EditorAction::ToolMove => Some(Tool::Move),
            _ => None,
        }
    }
}

/// Action → key combos.  An action may have several combos (redo has two).
#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<EditorAction, Vec<KeyCombo>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use EditorAction::*;
        let c = |ch| Key::char(ch);
        let mut bindings = HashMap::new();
        bindings.insert(Undo, vec![KeyCombo::ctrl_key(c('Z'))]);
        bindings.insert(Redo, vec![KeyCombo::ctrl_shift_key(c('Z')), KeyCombo::ctrl_key(c('Y'))]);
        bindings.insert(Save, vec![KeyCombo::ctrl_key(c('S'))]);
        bindings.insert(Open, vec![KeyCombo::ctrl_key(c('O'))]);
        bindings.insert(Copy, vec![KeyCombo::ctrl_key(c('C'))]);
        bindings.insert(Cut, vec![KeyCombo::ctrl_key(c('X'))]);
        bindings.insert(Paste, vec![KeyCombo::ctrl_key(c('V'))]);
        bindings.insert(SelectAll, vec![KeyCombo::ctrl_key(c('A'))]);
        bindings.insert(DeleteSelection, vec![KeyCombo::key(Key::Delete), KeyCombo::key(Key::Backspace)]);
        bindings.insert(CancelSelection, vec![KeyCombo::key(Key::Escape)]);
        bindings.insert(BrushSizeDecrease, vec![KeyCombo::key(c('['))]);
        bindings.insert(BrushSizeIncrease, vec![KeyCombo::key(c(']'))]);
        bindings.insert(ToolBrush, vec![KeyCombo::key(c('B'))]);
        bindings.insert(ToolEraser, vec![KeyCombo::key(c('E'))]);
        bindings.insert(ToolRectangle, vec![KeyCombo::key(c('R'))]);
        bindings.insert(ToolCircle, vec![KeyCombo::key(c('C'))]);
        bindings.insert(ToolText, vec![KeyCombo::key(c('T'))]);
        bindings.insert(ToolSelect, vec![KeyCombo::key(c('S'))]);
        bindings.insert(ToolEyedropper, vec![KeyCombo::key(c('I'))]);
        bindings.insert(ToolSpray, vec![KeyCombo::key(c('P'))]);
        bindings.insert(ToolBucket, vec![KeyCombo::key(c('F'))]);
        bindings.insert(ToolMove, vec![KeyCombo::key(c('M'))]);
        bindings.insert(ToolLine, vec![KeyCombo::key(c('L'))]);
        Self { bindings }
    }
}

impl KeyBindings {
    pub fn get(&self, action: EditorAction) -> &[KeyCombo] {
        self.bindings.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace every combo bound to `action`.
    pub fn set(&mut self, action: EditorAction, combos: Vec<KeyCombo>) {
        if combos.is_empty() {
            self.bindings.remove(&action);
        } else {
            self.bindings.insert(action, combos);
        }
    }

    /// First action (in `EditorAction::all` order) bound to this press.
    pub fn action_for(&self, press: &KeyPress) -> Option<EditorAction> {
        EditorAction::all()
            .iter()
            .copied()
            .find(|a| self.get(*a).iter().any(|combo| combo.matches(press)))
    }

    /// Serialize all bindings for config file
    pub fn to_config_lines(&self) -> Vec<String> {
        EditorAction::all()
            .iter()
            .filter_map(|action| {
                let combos = self.bindings.get(action)?;
                let joined: Vec<String> = combos.iter().map(KeyCombo::to_config_string).collect();
                Some(format!("keybind.{}={}", action.config_name(), joined.join(",")))
            })
            .collect()
    }

    /// Load a single keybind line from config.  Unknown actions and
    /// malformed combos leave the binding untouched.
    pub fn load_config_line(&mut self, action_name: &str, combo_str: &str) -> bool {
        let Some(action) = EditorAction::from_config_name(action_name) else {
            return false;
        };
        let combos: Option<Vec<KeyCombo>> = combo_str
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(KeyCombo::from_config_string)
            .collect();
        match combos {
            Some(combos) => {
                self.set(action, combos);
                true
            }
            None => false,
        }
    }
}

/// Maps pointer positions from a displayed (possibly scaled) canvas to
/// buffer pixels: `buffer / display` per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMapping {
    pub buffer_w: u32,
    pub buffer_h: u32,
    pub display_w: f32,
    pub display_h: f32,
}

impl DisplayMapping {
    pub fn new(buffer_w: u32, buffer_h: u32, display_w: f32, display_h: f32) -> Self {
        Self { buffer_w, buffer_h, display_w, display_h }
    }

    pub fn scale(&self) -> (f32, f32) {
        let sx = if self.display_w > 0.0 { self.buffer_w as f32 / self.display_w } else { 1.0 };
        let sy = if self.display_h > 0.0 { self.buffer_h as f32 / self.display_h } else { 1.0 };
        (sx, sy)
    }

    pub fn to_buffer(&self, x: f32, y: f32) -> (f32, f32) {
        let (sx, sy) = self.scale();
        (x * sx, y * sy)
    }
}
