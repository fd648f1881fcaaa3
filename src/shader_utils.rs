use log::info;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{ParticleSystemError, Result};

// WGSL sources rendered by build.rs.
#[derive(rust_embed::RustEmbed)]
#[folder = "$OUT_DIR/shaders"]
pub struct Shaders;

/// Maps a logical shader name to its source text.
pub trait ShaderSource {
    fn shader(&self, name: &str) -> Option<Cow<'_, str>>;

    fn require(&self, name: &str) -> Result<Cow<'_, str>> {
        self.shader(name)
            .ok_or_else(|| ParticleSystemError::MissingShader(name.to_string()))
    }
}

/// The shaders compiled into this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedShaders;

impl ShaderSource for EmbeddedShaders {
    fn shader(&self, name: &str) -> Option<Cow<'_, str>> {
        let file = Shaders::get(name)?;
        Some(Cow::Owned(String::from_utf8_lossy(&file.data).into_owned()))
    }
}

/// Shader sources supplied at runtime.
#[derive(Debug, Default, Clone)]
pub struct ShaderMap {
    sources: HashMap<String, String>,
}

impl ShaderMap {
    pub fn new() -> Self {
        ShaderMap::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl ShaderSource for ShaderMap {
    fn shader(&self, name: &str) -> Option<Cow<'_, str>> {
        self.sources.get(name).map(|source| Cow::Borrowed(source.as_str()))
    }
}

pub fn list_shaders() {
    for entry in Shaders::iter() {
        info!("Found shader: {}", entry);
    }
}
