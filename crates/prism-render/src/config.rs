//! Renderer configuration.
//!
//! Loaded from a JSON file; every field has a default so a missing or
//! partial file still yields a working setup.

use crate::error::{RenderError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default vertex shader entry point.
pub const DEFAULT_VERTEX_ENTRY: &str = "vertexMain";
/// Default fragment shader entry point.
pub const DEFAULT_FRAGMENT_ENTRY: &str = "fragmentMain";

/// Which render path drives the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    #[default]
    Forward,
    Deferred,
}

/// One pipeline's SPIR-V file and entry points.
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderConfig {
    /// File name inside the shader directory.
    pub file: PathBuf,
    #[serde(default = "default_vertex_entry")]
    pub vertex_entry: String,
    #[serde(default = "default_fragment_entry")]
    pub fragment_entry: String,
}

impl ShaderConfig {
    fn with_file(file: &str) -> Self {
        Self {
            file: PathBuf::from(file),
            vertex_entry: default_vertex_entry(),
            fragment_entry: default_fragment_entry(),
        }
    }
}

/// Shader selection per pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShaderTable {
    pub forward: ShaderConfig,
    pub geometry: ShaderConfig,
    pub lighting: ShaderConfig,
}

impl Default for ShaderTable {
    fn default() -> Self {
        Self {
            forward: ShaderConfig::with_file("forward.spv"),
            geometry: ShaderConfig::with_file("geometry.spv"),
            lighting: ShaderConfig::with_file("lighting.spv"),
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Enable Vulkan validation layers.
    pub validation: bool,
    /// Present with vsync (FIFO) instead of mailbox.
    pub vsync: bool,
    /// Render path selection.
    pub path: PathKind,
    /// Directory holding compiled SPIR-V modules.
    pub shader_dir: PathBuf,
    /// Shader file per pipeline.
    pub shaders: ShaderTable,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            vsync: true,
            path: PathKind::default(),
            shader_dir: PathBuf::from("shaders"),
            shaders: ShaderTable::default(),
        }
    }
}

impl RendererConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RenderError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RenderError::Config(e.to_string()))
    }

    /// Load from a file when given, falling back to defaults when the
    /// path is absent or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => match Self::load(path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring config {}: {e}", path.display());
                    Self::default()
                }
            },
            Some(path) => {
                tracing::info!("Config {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Absolute path of one pipeline's shader file.
    pub fn shader_path(&self, shader: &ShaderConfig) -> PathBuf {
        self.shader_dir.join(&shader.file)
    }
}

fn default_vertex_entry() -> String {
    DEFAULT_VERTEX_ENTRY.to_string()
}

fn default_fragment_entry() -> String {
    DEFAULT_FRAGMENT_ENTRY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = RendererConfig::parse("{}").unwrap();
        assert_eq!(config.path, PathKind::Forward);
        assert!(config.vsync);
        assert_eq!(config.shader_dir, PathBuf::from("shaders"));
        assert_eq!(config.shaders.forward.file, PathBuf::from("forward.spv"));
        assert_eq!(config.shaders.lighting.vertex_entry, DEFAULT_VERTEX_ENTRY);
    }

    #[test]
    fn fields_override_defaults() {
        let config = RendererConfig::parse(
            r#"{
                "vsync": false,
                "path": "deferred",
                "shader_dir": "assets/spv",
                "shaders": {
                    "geometry": {
                        "file": "gbuffer.spv",
                        "fragment_entry": "gbufferFrag"
                    }
                }
            }"#,
        )
        .unwrap();

        assert!(!config.vsync);
        assert_eq!(config.path, PathKind::Deferred);
        assert_eq!(
            config.shader_path(&config.shaders.geometry),
            PathBuf::from("assets/spv/gbuffer.spv")
        );
        assert_eq!(config.shaders.geometry.fragment_entry, "gbufferFrag");
        assert_eq!(config.shaders.geometry.vertex_entry, DEFAULT_VERTEX_ENTRY);
        // Untouched entries keep their defaults
        assert_eq!(config.shaders.forward.file, PathBuf::from("forward.spv"));
    }

    #[test]
    fn unknown_path_kind_is_an_error() {
        assert!(RendererConfig::parse(r#"{"path": "raytraced"}"#).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RendererConfig::load_or_default(Some(Path::new("/nonexistent/prism.json")));
        assert_eq!(config.path, PathKind::Forward);
    }
}
