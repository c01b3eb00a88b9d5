// ============================================================================
// Editor settings: persisted as a flat `key=value` config file
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::Rgba;

use crate::components::selection::{Tolerance, WandSettings};

/// Every tunable of the editor core. Hosts build one of these (or load it
/// from disk) and pass it into [`crate::project::Project`]; nothing is read
/// from globals.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub default_tolerance: u32,
    pub seed_min_alpha: u8,
    pub neighbor_min_alpha: u8,
    pub max_frontier: usize,
    pub min_region_size: u32,
    pub min_rect_size: u32,
    /// Fill only touches pixels whose alpha is strictly above this.
    pub fill_alpha_threshold: u8,
    pub max_undo_steps: usize,
    /// Side of the square image sent to the inpainting service.
    pub canonical_size: u32,
    /// Opaque color the eraser writes.
    pub background_color: Rgba<u8>,
    pub stroke_width: f32,
    pub inpaint_endpoint: String,
    pub inpaint_timeout_secs: u64,
    pub inpaint_style: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_tolerance: 32,
            seed_min_alpha: 10,
            neighbor_min_alpha: 30,
            max_frontier: 100_000,
            min_region_size: 5,
            min_rect_size: 10,
            fill_alpha_threshold: 100,
            max_undo_steps: 50,
            canonical_size: 1024,
            background_color: Rgba([255, 255, 255, 255]),
            stroke_width: 8.0,
            inpaint_endpoint: String::new(),
            inpaint_timeout_secs: 60,
            inpaint_style: "anime".to_string(),
        }
    }
}

impl EditorSettings {
    pub fn wand(&self) -> WandSettings {
        WandSettings {
            tolerance: Tolerance::new(self.default_tolerance),
            seed_min_alpha: self.seed_min_alpha,
            neighbor_min_alpha: self.neighbor_min_alpha,
            max_frontier: self.max_frontier,
            min_region_size: self.min_region_size,
            min_rect_size: self.min_rect_size,
        }
    }

    pub fn inpaint_timeout(&self) -> Duration {
        Duration::from_secs(self.inpaint_timeout_secs.max(1))
    }

    /// Returns the path to the settings file in the OS config directory.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            let config_dir = PathBuf::from(appdata).join("TextureFE");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("texturefe_settings.cfg"))
        }
        #[cfg(target_os = "linux")]
        {
            let base = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            let config_dir = base.join("TextureFE");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("texturefe_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("TextureFE");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("texturefe_settings.cfg"))
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("texturefe_settings.cfg")))
        }
    }

    /// Serialize a color as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a color from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "default_tolerance={}\n\
             seed_min_alpha={}\n\
             neighbor_min_alpha={}\n\
             max_frontier={}\n\
             min_region_size={}\n\
             min_rect_size={}\n\
             fill_alpha_threshold={}\n\
             max_undo_steps={}\n\
             canonical_size={}\n\
             background_color={}\n\
             stroke_width={}\n\
             inpaint_endpoint={}\n\
             inpaint_timeout_secs={}\n\
             inpaint_style={}\n",
            self.default_tolerance,
            self.seed_min_alpha,
            self.neighbor_min_alpha,
            self.max_frontier,
            self.min_region_size,
            self.min_rect_size,
            self.fill_alpha_threshold,
            self.max_undo_steps,
            self.canonical_size,
            Self::color_to_str(self.background_color),
            self.stroke_width,
            self.inpaint_endpoint,
            self.inpaint_timeout_secs,
            self.inpaint_style,
        )
    }

    /// Parse config text. Unknown keys and unparsable values keep their
    /// defaults.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "default_tolerance" => {
                    s.default_tolerance = val.parse().unwrap_or(d.default_tolerance);
                }
                "seed_min_alpha" => {
                    s.seed_min_alpha = val.parse().unwrap_or(d.seed_min_alpha);
                }
                "neighbor_min_alpha" => {
                    s.neighbor_min_alpha = val.parse().unwrap_or(d.neighbor_min_alpha);
                }
                "max_frontier" => {
                    s.max_frontier = val.parse().unwrap_or(d.max_frontier);
                }
                "min_region_size" => {
                    s.min_region_size = val.parse().unwrap_or(d.min_region_size);
                }
                "min_rect_size" => {
                    s.min_rect_size = val.parse().unwrap_or(d.min_rect_size);
                }
                "fill_alpha_threshold" => {
                    s.fill_alpha_threshold = val.parse().unwrap_or(d.fill_alpha_threshold);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(d.max_undo_steps);
                }
                "canonical_size" => {
                    s.canonical_size = val.parse().unwrap_or(d.canonical_size);
                }
                "background_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.background_color = c;
                    }
                }
                "stroke_width" => {
                    s.stroke_width = val.parse().unwrap_or(d.stroke_width);
                }
                "inpaint_endpoint" => {
                    s.inpaint_endpoint = val.to_string();
                }
                "inpaint_timeout_secs" => {
                    s.inpaint_timeout_secs = val.parse().unwrap_or(d.inpaint_timeout_secs);
                }
                "inpaint_style" => {
                    s.inpaint_style = val.to_string();
                }
                _ => log::debug!("Ignoring unknown setting '{key}'"),
            }
        }
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                log::warn!("Could not read settings {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log::warn!("Could not save settings {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips() {
        let mut s = EditorSettings::default();
        s.default_tolerance = 64;
        s.background_color = Rgba([1, 2, 3, 255]);
        s.inpaint_endpoint = "http://localhost:8080/api/inpaint".to_string();
        s.stroke_width = 3.5;
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = EditorSettings::parse(
            "max_undo_steps=lots\n# comment\nbackground_color=1,2\nmin_rect_size = 4\nnot a line\n",
        );
        assert_eq!(s.max_undo_steps, 50);
        assert_eq!(s.background_color, Rgba([255, 255, 255, 255]));
        assert_eq!(s.min_rect_size, 4);
    }

    #[test]
    fn wand_settings_follow_config() {
        let s = EditorSettings::parse("default_tolerance=400\nneighbor_min_alpha=12\n");
        let wand = s.wand();
        assert_eq!(wand.tolerance.value(), 128);
        assert_eq!(wand.neighbor_min_alpha, 12);
        assert_eq!(wand.seed_min_alpha, 10);
    }
}
