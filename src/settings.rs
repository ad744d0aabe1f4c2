use std::path::PathBuf;

use crate::components::history::DEFAULT_HISTORY_LIMIT;
use crate::components::tools::{MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::input::KeyBindings;
use crate::ops::text::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, clamp_font_size};

pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;
pub const DEFAULT_MONO_PREVIEW_MS: u64 = 2000;

/// Persistent application settings, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub max_undo_steps: usize,
    /// 0 = no memory cap on history snapshots.
    pub history_memory_mb: usize,
    pub brush_size: u32,
    pub opacity: f32,
    pub anti_aliased: bool,
    pub font_family: String,
    pub font_size: f32,
    /// Explicit TTF/OTF file for the text tool; empty = system lookup.
    pub font_path: String,
    pub mono_preview_ms: u64,
    pub keybindings: KeyBindings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            max_undo_steps: DEFAULT_HISTORY_LIMIT,
            history_memory_mb: 0,
            brush_size: 2,
            opacity: 1.0,
            anti_aliased: true,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_path: String::new(),
            mono_preview_ms: DEFAULT_MONO_PREVIEW_MS,
            keybindings: KeyBindings::default(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/retropaint/retropaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\RetroPaint\retropaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/RetroPaint/retropaint_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("retropaint");
            return Some(config_dir.join("retropaint_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("RetroPaint").join("retropaint_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("RetroPaint")
                    .join("retropaint_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("retropaint_settings.cfg")))
        }
    }

    /// History memory cap in bytes, if one is configured.
    pub fn history_memory_limit(&self) -> Option<usize> {
        (self.history_memory_mb > 0).then(|| self.history_memory_mb * 1024 * 1024)
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        let trimmed = self.font_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    pub fn to_config_string(&self) -> String {
        let mut content = format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             max_undo_steps={}\n\
             history_memory_mb={}\n\
             brush_size={}\n\
             opacity={}\n\
             anti_aliased={}\n\
             font_family={}\n\
             font_size={}\n\
             font_path={}\n\
             mono_preview_ms={}\n",
            self.canvas_width,
            self.canvas_height,
            self.max_undo_steps,
            self.history_memory_mb,
            self.brush_size,
            self.opacity,
            self.anti_aliased,
            self.font_family,
            self.font_size,
            self.font_path,
            self.mono_preview_ms,
        );
        for line in self.keybindings.to_config_lines() {
            content.push_str(&line);
            content.push('\n');
        }
        content
    }

    /// Parse settings text.  Unknown keys and unparsable values keep the
    /// default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => {
                    s.canvas_width = val.parse().ok().filter(|w| *w > 0).unwrap_or(DEFAULT_CANVAS_WIDTH);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().ok().filter(|h| *h > 0).unwrap_or(DEFAULT_CANVAS_HEIGHT);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().ok().filter(|n| *n > 0).unwrap_or(DEFAULT_HISTORY_LIMIT);
                }
                "history_memory_mb" => {
                    s.history_memory_mb = val.parse().unwrap_or(0);
                }
                "brush_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.brush_size = v.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
                    }
                }
                "opacity" => {
                    if let Ok(v) = val.parse::<f32>() && v.is_finite() {
                        s.opacity = v.clamp(0.0, 1.0);
                    }
                }
                "anti_aliased" => {
                    s.anti_aliased = val != "false";
                }
                "font_family" => {
                    if !val.is_empty() {
                        s.font_family = val.to_string();
                    }
                }
                "font_size" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.font_size = clamp_font_size(v);
                    }
                }
                "font_path" => {
                    s.font_path = val.to_string();
                }
                "mono_preview_ms" => {
                    s.mono_preview_ms = val.parse().unwrap_or(DEFAULT_MONO_PREVIEW_MS);
                }
                _ => {
                    if let Some(action) = key.strip_prefix("keybind.") {
                        s.keybindings.load_config_line(action, val);
                    }
                }
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("settings: cannot write {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk; defaults when the file is missing.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}
