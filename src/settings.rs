use std::path::{Path, PathBuf};

/// Engine tunables that persist across sessions.
///
/// Stored as a plain `key=value` file; unknown keys are ignored and any
/// value that fails to parse keeps its default.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Proximity radius (normalized units) for crop handles.
    pub crop_handle_radius: f32,
    /// Proximity radius (normalized units) for the selected layer's resize corner.
    pub resize_corner_radius: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Pointer pixels per 1.0 of scale change during a resize drag.
    pub resize_divisor: f32,
    /// Padding in pixels added around measured text.
    pub text_padding: f32,
    /// Outline width of text layers as a fraction of the font size.
    pub text_outline_ratio: f32,
    /// Outline width of captions as a fraction of the font size.
    pub caption_outline_ratio: f32,
    pub cinematic_saturation: f32,
    pub cinematic_contrast: f32,
    pub deep_fry_noise: i32,
    pub deep_fry_contrast: f32,
    /// Fraction of each dimension kept by the deep-fry downsample.
    pub deep_fry_downsample: f32,
    /// Fixed noise seed; 0 draws a fresh seed on every render.
    pub noise_seed: u32,
    /// Smallest crop width/height allowed while resizing the crop rectangle.
    pub min_crop_size: f32,
    /// Radius in pixels of the crop handle dots.
    pub handle_dot_radius: f32,
    pub font_family: String,
    pub font_weight: u16,
    pub caption_font_family: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            crop_handle_radius: 0.05,
            resize_corner_radius: 0.05,
            min_scale: 0.1,
            max_scale: 5.0,
            resize_divisor: 200.0,
            text_padding: 10.0,
            text_outline_ratio: 0.08,
            caption_outline_ratio: 0.1,
            cinematic_saturation: 1.15,
            cinematic_contrast: 1.05,
            deep_fry_noise: 30,
            deep_fry_contrast: 2.0,
            deep_fry_downsample: 0.25,
            noise_seed: 0,
            min_crop_size: 0.05,
            handle_dot_radius: 5.0,
            font_family: "DejaVu Sans".to_string(),
            font_weight: 700,
            caption_font_family: "Impact".to_string(),
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/memerist/memerist_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Memerist\memerist_settings.cfg
    /// On macOS:   ~/Library/Application Support/Memerist/memerist_settings.cfg
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let dir = PathBuf::from(appdata).join("Memerist");
            let _ = std::fs::create_dir_all(&dir);
            return Some(dir.join("memerist_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("Memerist");
            let _ = std::fs::create_dir_all(&dir);
            return Some(dir.join("memerist_settings.cfg"));
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("memerist");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("memerist_settings.cfg"))
        }
    }

    /// Write settings to the settings file and return its path.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::settings_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no configuration directory")
        })?;
        self.save_to(&path)?;
        log_info!("Saved settings to {}", path.display());
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from disk (returns default if file missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "crop_handle_radius={}\n\
             resize_corner_radius={}\n\
             min_scale={}\n\
             max_scale={}\n\
             resize_divisor={}\n\
             text_padding={}\n\
             text_outline_ratio={}\n\
             caption_outline_ratio={}\n\
             cinematic_saturation={}\n\
             cinematic_contrast={}\n\
             deep_fry_noise={}\n\
             deep_fry_contrast={}\n\
             deep_fry_downsample={}\n\
             noise_seed={}\n\
             min_crop_size={}\n\
             handle_dot_radius={}\n\
             font_family={}\n\
             font_weight={}\n\
             caption_font_family={}\n",
            self.crop_handle_radius,
            self.resize_corner_radius,
            self.min_scale,
            self.max_scale,
            self.resize_divisor,
            self.text_padding,
            self.text_outline_ratio,
            self.caption_outline_ratio,
            self.cinematic_saturation,
            self.cinematic_contrast,
            self.deep_fry_noise,
            self.deep_fry_contrast,
            self.deep_fry_downsample,
            self.noise_seed,
            self.min_crop_size,
            self.handle_dot_radius,
            self.font_family,
            self.font_weight,
            self.caption_font_family,
        )
    }

    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "crop_handle_radius" => parse_positive(val, &mut s.crop_handle_radius),
                "resize_corner_radius" => parse_positive(val, &mut s.resize_corner_radius),
                "min_scale" => parse_positive(val, &mut s.min_scale),
                "max_scale" => parse_positive(val, &mut s.max_scale),
                "resize_divisor" => parse_positive(val, &mut s.resize_divisor),
                "text_padding" => {
                    s.text_padding = val.parse().unwrap_or(s.text_padding);
                }
                "text_outline_ratio" => parse_positive(val, &mut s.text_outline_ratio),
                "caption_outline_ratio" => parse_positive(val, &mut s.caption_outline_ratio),
                "cinematic_saturation" => {
                    s.cinematic_saturation = val.parse().unwrap_or(s.cinematic_saturation);
                }
                "cinematic_contrast" => {
                    s.cinematic_contrast = val.parse().unwrap_or(s.cinematic_contrast);
                }
                "deep_fry_noise" => {
                    s.deep_fry_noise = val.parse::<i32>().map(|n| n.abs()).unwrap_or(s.deep_fry_noise);
                }
                "deep_fry_contrast" => {
                    s.deep_fry_contrast = val.parse().unwrap_or(s.deep_fry_contrast);
                }
                "deep_fry_downsample" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v > 0.0
                        && v <= 1.0
                    {
                        s.deep_fry_downsample = v;
                    }
                }
                "noise_seed" => {
                    s.noise_seed = val.parse().unwrap_or(0);
                }
                "min_crop_size" => parse_positive(val, &mut s.min_crop_size),
                "handle_dot_radius" => parse_positive(val, &mut s.handle_dot_radius),
                "font_family" => {
                    if !val.is_empty() {
                        s.font_family = val.to_string();
                    }
                }
                "font_weight" => {
                    s.font_weight = val.parse().unwrap_or(s.font_weight);
                }
                "caption_font_family" => {
                    if !val.is_empty() {
                        s.caption_font_family = val.to_string();
                    }
                }
                _ => {}
            }
        }
        if s.min_scale > s.max_scale {
            std::mem::swap(&mut s.min_scale, &mut s.max_scale);
        }
        s
    }
}

fn parse_positive(val: &str, slot: &mut f32) {
    if let Ok(v) = val.parse::<f32>()
        && v.is_finite()
        && v > 0.0
    {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_string_reloads_to_same_settings() {
        let mut s = EngineSettings::default();
        s.max_scale = 8.0;
        s.noise_seed = 42;
        s.font_family = "Liberation Sans".to_string();
        let reloaded = EngineSettings::from_config_str(&s.to_config_string());
        assert_eq!(reloaded, s);
    }

    #[test]
    fn corrupt_values_keep_defaults() {
        let s = EngineSettings::from_config_str(
            "min_scale=banana\nmax_scale=-3\nno equals sign here\ndeep_fry_downsample=4\n",
        );
        let d = EngineSettings::default();
        assert_eq!(s.min_scale, d.min_scale);
        assert_eq!(s.max_scale, d.max_scale);
        assert_eq!(s.deep_fry_downsample, d.deep_fry_downsample);
    }

    #[test]
    fn inverted_scale_range_is_swapped() {
        let s = EngineSettings::from_config_str("min_scale=6\nmax_scale=2\n");
        assert_eq!((s.min_scale, s.max_scale), (2.0, 6.0));
    }

    #[test]
    fn saved_file_loads_back() {
        let path = std::env::temp_dir().join(format!("memerist-settings-{}.cfg", std::process::id()));
        let s = EngineSettings { noise_seed: 7, deep_fry_noise: 12, ..EngineSettings::default() };
        s.save_to(&path).unwrap();
        let back = EngineSettings::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, s);
        assert_eq!(EngineSettings::load_from(&path), EngineSettings::default());
    }
}
