// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "vku".into(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ShaderCfg {
    /// Directory holding `<name>.vert.spv` / `<name>.frag.spv`. Unset means
    /// the shaders compiled by the build script.
    pub dir: Option<PathBuf>,
    pub name: String,
}

impl Default for ShaderCfg {
    fn default() -> Self {
        ShaderCfg {
            dir: None,
            name: "triangle".into(),
        }
    }
}

impl ShaderCfg {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(env!("OUT_DIR")))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DemoCfg {
    pub app_name: String,
    pub window: WindowCfg,
    pub shaders: ShaderCfg,
}

impl Default for DemoCfg {
    fn default() -> Self {
        DemoCfg {
            app_name: "vku-demo".into(),
            window: WindowCfg::default(),
            shaders: ShaderCfg::default(),
        }
    }
}

/// Missing file means defaults; a malformed one is reported and ignored.
pub fn load_cfg(path: &Path) -> DemoCfg {
    match fs::read_to_string(path) {
        Ok(s) => toml::from_str::<DemoCfg>(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            DemoCfg::default()
        }),
        Err(_) => DemoCfg::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: DemoCfg = toml::from_str(
            r#"
            [window]
            width = 1280
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.window.title, "vku");
        assert_eq!(cfg.shaders.name, "triangle");
        assert_eq!(cfg.app_name, "vku-demo");
    }

    #[test]
    fn shader_dir_override() {
        let cfg: DemoCfg = toml::from_str(
            r#"
            app_name = "spin"
            [shaders]
            dir = "data/shaders"
            name = "cube"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.app_name, "spin");
        assert_eq!(cfg.shaders.resolved_dir(), PathBuf::from("data/shaders"));
        assert_eq!(cfg.shaders.name, "cube");
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = load_cfg(Path::new("definitely/not/here/vku.toml"));
        assert_eq!(cfg, DemoCfg::default());
        assert_eq!(cfg.shaders.resolved_dir(), PathBuf::from(env!("OUT_DIR")));
    }
}
