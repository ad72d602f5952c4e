use std::path::{Path, PathBuf};

use crate::geometry::DEFAULT_MIN_SELECTION;
use crate::io::{EXPORT_QUALITY, ExportFormat};
use crate::ops::mosaic::DEFAULT_REDUCTION_FACTOR;
use crate::ops::resample::SmoothingFilter;
use crate::session::SessionConfig;
use crate::{log_info, log_warn};

/// Default delay before the selection highlight is erased.
pub const DEFAULT_HIGHLIGHT_MS: u64 = 300;

/// Persistent user settings.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Folder the gateway serves images from.
    pub image_dir: PathBuf,
    /// Mosaic reduction factor (block edge ≈ this many pixels).
    pub mosaic_factor: u32,
    /// Minimum selection edge in image pixels.
    pub min_selection: u32,
    /// JPEG quality for saves (1–100).
    pub jpeg_quality: u8,
    /// How long the selection outline stays up.
    pub highlight_ms: u64,
    pub smoothing: SmoothingFilter,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("img"),
            mosaic_factor: DEFAULT_REDUCTION_FACTOR,
            min_selection: DEFAULT_MIN_SELECTION,
            jpeg_quality: EXPORT_QUALITY,
            highlight_ms: DEFAULT_HIGHLIGHT_MS,
            smoothing: SmoothingFilter::Area,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/redactfe/redactfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\RedactFE\redactfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/RedactFE/redactfe_settings.cfg
    /// Fallback:   next to the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("redactfe");
            return Some(config_dir.join("redactfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(
                PathBuf::from(appdata)
                    .join("RedactFE")
                    .join("redactfe_settings.cfg"),
            );
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("RedactFE")
                    .join("redactfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("redactfe_settings.cfg")))
        }
    }

    /// Serialize as `key=value` lines.
    pub fn to_config_string(&self) -> String {
        format!(
            "image_dir={}\n\
             mosaic_factor={}\n\
             min_selection={}\n\
             jpeg_quality={}\n\
             highlight_ms={}\n\
             smoothing={}\n",
            self.image_dir.display(),
            self.mosaic_factor,
            self.min_selection,
            self.jpeg_quality,
            self.highlight_ms,
            self.smoothing.as_str(),
        )
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep the defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "image_dir" if !val.is_empty() => s.image_dir = PathBuf::from(val),
                "mosaic_factor" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.mosaic_factor = v.clamp(1, 512);
                    }
                }
                "min_selection" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.min_selection = v.clamp(1, 1024);
                    }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.jpeg_quality = v.clamp(1, 100) as u8;
                    }
                }
                "highlight_ms" => {
                    if let Ok(v) = val.parse::<u64>() {
                        s.highlight_ms = v.min(10_000);
                    }
                }
                "smoothing" => {
                    if let Some(f) = SmoothingFilter::parse(val) {
                        s.smoothing = f;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Load from an explicit file (defaults if missing or unreadable).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load from the platform settings file.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => {
                log_info!("settings: {}", path.display());
                Self::load_from(&path)
            }
            None => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Save to the platform settings file. Failures are logged, not fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Core policy derived from these settings.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            mosaic_factor: self.mosaic_factor.max(1),
            min_selection: self.min_selection.max(1),
            export: ExportFormat::new(self.jpeg_quality),
            smoothing: self.smoothing,
        }
    }
}
