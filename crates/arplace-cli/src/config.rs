//! Configuration vault – reads/writes `~/.arplace/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use arplace_hal::{SimTrackingSession, TrackingConfig, Viewport};
use arplace_perception::{ReferenceImage, DEFAULT_MINIMUM_DISTANCE_M, FORWARD_OFFSET_M};
use arplace_runtime::{PlacementSettings, SessionSettings};
use arplace_types::PlacementMode;
use serde::{Deserialize, Serialize};

/// Persisted user configuration.  Every field has a default, so a partial
/// file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum spacing between consecutive placements (metres).
    pub minimum_distance_m: f32,
    /// Freeform placement distance in front of the camera (metres).
    pub forward_offset_m: f32,
    pub plane_opacity: f32,
    pub image_opacity: f32,
    pub planes_hidden: bool,
    pub default_mode: PlacementMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_object: Option<String>,
    /// Reference image catalog (asset group) name.
    pub image_catalog: String,
    pub plane_detection: bool,
    /// JSON tracking recording to replay instead of the built-in demo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<PathBuf>,
    pub viewport: Viewport,
    pub reference_images: Vec<ReferenceImage>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimum_distance_m: DEFAULT_MINIMUM_DISTANCE_M,
            forward_offset_m: FORWARD_OFFSET_M,
            plane_opacity: 0.25,
            image_opacity: 0.1,
            planes_hidden: false,
            default_mode: PlacementMode::Freeform,
            default_object: Some("cup".to_string()),
            image_catalog: "AR Resources".to_string(),
            plane_detection: true,
            recording: None,
            viewport: Viewport::default(),
            reference_images: SimTrackingSession::demo_reference_images(),
        }
    }
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            placement: PlacementSettings {
                minimum_distance_m: self.minimum_distance_m,
                forward_offset_m: self.forward_offset_m,
                plane_opacity: self.plane_opacity,
                image_opacity: self.image_opacity,
                planes_hidden: self.planes_hidden,
                default_mode: self.default_mode,
                default_object: self.default_object.clone(),
            },
            tracking: TrackingConfig {
                image_catalog: self.image_catalog.clone(),
                reference_images: self.reference_images.clone(),
                plane_detection: self.plane_detection,
            },
            viewport: self.viewport,
        }
    }
}

/// `~/.arplace/config.toml`
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".arplace").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  `Ok(None)`
/// when the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Config on disk, or defaults; environment overrides apply either way.
pub fn load_or_default() -> Result<Config, String> {
    match load()? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `ARPLACE_*` environment overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARPLACE_MIN_DISTANCE` | `minimum_distance_m` |
/// | `ARPLACE_RECORDING` | `recording` |
/// | `ARPLACE_DEFAULT_MODE` | `default_mode` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARPLACE_MIN_DISTANCE")
        && let Ok(d) = v.parse::<f32>()
        && d >= 0.0
    {
        cfg.minimum_distance_m = d;
    }
    if let Ok(v) = std::env::var("ARPLACE_RECORDING")
        && !v.is_empty()
    {
        cfg.recording = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("ARPLACE_DEFAULT_MODE")
        && let Ok(mode) = v.parse::<PlacementMode>()
    {
        cfg.default_mode = mode;
    }
}

/// Save the config, creating `~/.arplace/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.minimum_distance_m, 0.07);
        assert_eq!(loaded.forward_offset_m, 0.2);
        assert_eq!(loaded.default_object.as_deref(), Some("cup"));
        assert_eq!(loaded.image_catalog, "AR Resources");
        assert_eq!(loaded.reference_images.len(), 1);
        assert_eq!(loaded.viewport, Viewport::default());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "default_mode = \"plane\"\nplanes_hidden = true\n\n[viewport]\nwidth = 1170.0\nheight = 2532.0\nvertical_fov_deg = 65.0\n",
        )
        .unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.default_mode, PlacementMode::Plane);
        assert!(cfg.planes_hidden);
        assert_eq!(cfg.viewport.width, 1170.0);
        assert_eq!(cfg.plane_opacity, 0.25);
        assert!(cfg.plane_detection);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_mode = \"sideways\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn config_path_points_to_arplace_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.arplace/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn session_settings_carry_every_field() {
        let cfg = Config {
            minimum_distance_m: 0.1,
            image_catalog: "Posters".to_string(),
            plane_detection: false,
            default_mode: PlacementMode::Image,
            ..Config::default()
        };
        let settings = cfg.session_settings();
        assert_eq!(settings.placement.minimum_distance_m, 0.1);
        assert_eq!(settings.placement.default_mode, PlacementMode::Image);
        assert_eq!(settings.tracking.image_catalog, "Posters");
        assert!(!settings.tracking.plane_detection);
        assert!(settings.tracking.knows_image("poster"));
    }

    #[test]
    fn apply_env_overrides_changes_min_distance() {
        // SAFETY: only this test touches ARPLACE_MIN_DISTANCE.
        unsafe { std::env::set_var("ARPLACE_MIN_DISTANCE", "0.15") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.minimum_distance_m, 0.15);

        unsafe { std::env::set_var("ARPLACE_MIN_DISTANCE", "far") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.minimum_distance_m, 0.07);
        unsafe { std::env::remove_var("ARPLACE_MIN_DISTANCE") };
    }

    #[test]
    fn apply_env_overrides_changes_recording() {
        // SAFETY: only this test touches ARPLACE_RECORDING.
        unsafe { std::env::set_var("ARPLACE_RECORDING", "/tmp/room.json") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.recording, Some(PathBuf::from("/tmp/room.json")));
        unsafe { std::env::remove_var("ARPLACE_RECORDING") };
    }

    #[test]
    fn apply_env_overrides_changes_default_mode() {
        // SAFETY: only this test touches ARPLACE_DEFAULT_MODE.
        unsafe { std::env::set_var("ARPLACE_DEFAULT_MODE", "image") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.default_mode, PlacementMode::Image);

        unsafe { std::env::set_var("ARPLACE_DEFAULT_MODE", "sideways") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.default_mode, PlacementMode::Freeform);
        unsafe { std::env::remove_var("ARPLACE_DEFAULT_MODE") };
    }
}
