use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub preload_pages: Option<f64>,
    pub max_rendered_pages: Option<usize>,
    #[serde(default)]
    pub render: RenderConfigFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfigFile {
    pub scale: Option<f64>,
    pub device_pixel_ratio: Option<f64>,
    pub page_gap: Option<f64>,
    pub text_layer: Option<bool>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Preload margin, in viewport heights, above and below the viewport.
    pub preload_pages: f64,
    /// Ceiling on simultaneously rendered pages; 0 means unbounded.
    pub max_rendered_pages: usize,
    pub render: RenderSettings,
}

const DEFAULT_PRELOAD_PAGES: f64 = 1.0;
const DEFAULT_SCALE: f64 = 1.0;
const DEFAULT_DEVICE_PIXEL_RATIO: f64 = 1.0;
const DEFAULT_PAGE_GAP: f64 = 16.0;

impl Default for Config {
    fn default() -> Self {
        Self {
            preload_pages: DEFAULT_PRELOAD_PAGES,
            max_rendered_pages: 0,
            render: RenderSettings::default(),
        }
    }
}

/// Drawing parameters read by the engine on every page draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub scale: f64,
    pub device_pixel_ratio: f64,
    pub page_gap: f64,
    pub text_layer: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            device_pixel_ratio: DEFAULT_DEVICE_PIXEL_RATIO,
            page_gap: DEFAULT_PAGE_GAP,
            text_layer: true,
        }
    }
}

impl ConfigFile {
    /// Merge host-supplied values (overwrites non-None fields).
    pub fn merge_overrides(
        &mut self,
        preload_pages: Option<f64>,
        max_rendered_pages: Option<usize>,
        scale: Option<f64>,
    ) {
        if let Some(v) = preload_pages {
            debug!("config: override preload_pages={v}");
            self.preload_pages = preload_pages;
        }
        if let Some(v) = max_rendered_pages {
            debug!("config: override max_rendered_pages={v}");
            self.max_rendered_pages = max_rendered_pages;
        }
        if let Some(v) = scale {
            debug!("config: override scale={v}");
            self.render.scale = scale;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let defaults = Config::default();
        let config = Config {
            preload_pages: self
                .preload_pages
                .unwrap_or(defaults.preload_pages)
                .max(0.0),
            max_rendered_pages: self
                .max_rendered_pages
                .unwrap_or(defaults.max_rendered_pages),
            render: RenderSettings {
                scale: self.render.scale.unwrap_or(defaults.render.scale),
                device_pixel_ratio: self
                    .render
                    .device_pixel_ratio
                    .unwrap_or(defaults.render.device_pixel_ratio),
                page_gap: self.render.page_gap.unwrap_or(defaults.render.page_gap),
                text_layer: self.render.text_layer.unwrap_or(defaults.render.text_layer),
            },
        };
        info!(
            "config: resolved preload_pages={}, max_rendered_pages={}, scale={}, \
             device_pixel_ratio={}, page_gap={}, text_layer={}",
            config.preload_pages,
            config.max_rendered_pages,
            config.render.scale,
            config.render.device_pixel_ratio,
            config.render.page_gap,
            config.render.text_layer,
        );
        config
    }
}

/// Resolve the XDG config path for pageflow.
fn config_path() -> Option<PathBuf> {
    resolve_config_path(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

fn resolve_config_path(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home.map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("pageflow").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            Ok(ConfigFile::default())
        }
    }
}

/// Load a config file at an explicit path, with the same missing-file
/// semantics as [`load_config`].
pub fn load_config_from(path: &Path) -> anyhow::Result<ConfigFile> {
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.preload_pages, 1.0);
        assert_eq!(resolved.max_rendered_pages, 0);
        assert_eq!(resolved.render.scale, 1.0);
        assert_eq!(resolved.render.device_pixel_ratio, 1.0);
        assert_eq!(resolved.render.page_gap, 16.0);
        assert!(resolved.render.text_layer);
    }

    #[test]
    fn partial_toml() {
        let text = r#"
            max_rendered_pages = 8
            [render]
            scale = 1.5
            text_layer = false
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.max_rendered_pages, 8);
        assert_eq!(resolved.render.scale, 1.5);
        assert!(!resolved.render.text_layer);
        // Defaults for unspecified fields
        assert_eq!(resolved.preload_pages, 1.0);
        assert_eq!(resolved.render.page_gap, 16.0);
    }

    #[test]
    fn invalid_toml() {
        let text = "this is not valid toml [[[";
        let result = toml::from_str::<ConfigFile>(text);
        assert!(result.is_err());
    }

    #[test]
    fn negative_preload_is_clamped() {
        let cfg: ConfigFile = toml::from_str("preload_pages = -2.0").unwrap();
        assert_eq!(cfg.resolve().preload_pages, 0.0);
    }

    #[test]
    fn overrides_win() {
        let text = "preload_pages = 2.0\nmax_rendered_pages = 4";
        let mut cfg: ConfigFile = toml::from_str(text).unwrap();
        cfg.merge_overrides(None, Some(10), Some(2.0));
        let resolved = cfg.resolve();
        assert_eq!(resolved.preload_pages, 2.0); // config file, no override
        assert_eq!(resolved.max_rendered_pages, 10); // override wins
        assert_eq!(resolved.render.scale, 2.0);
        assert_eq!(resolved.render.page_gap, 16.0); // default
    }

    #[test]
    fn defaults_match_empty_file() {
        assert_eq!(Config::default(), ConfigFile::default().resolve());
    }

    #[test]
    fn xdg_config_home_wins_over_home() {
        let path = resolve_config_path(Some("/xdg".into()), Some("/home/u".into()));
        assert_eq!(path, Some(PathBuf::from("/xdg/pageflow/config.toml")));
        let path = resolve_config_path(None, Some("/home/u".into()));
        assert_eq!(path, Some(PathBuf::from("/home/u/.config/pageflow/config.toml")));
        assert_eq!(resolve_config_path(None, None), None);
    }

    #[test]
    fn load_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_rendered_pages = 6\n[render]\npage_gap = 8.0\n").unwrap();
        let resolved = load_config_from(&path).unwrap().resolve();
        assert_eq!(resolved.max_rendered_pages, 6);
        assert_eq!(resolved.render.page_gap, 8.0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.resolve(), Config::default());
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_rendered_pages = \"many\"").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
