use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct McxConfig {
    pub package: PackageConfig,
    pub build: Option<BuildConfig>,
    pub firmware: Option<FirmwareConfig>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct PackageConfig {
    pub name: String,
    #[allow(dead_code)]
    pub version: String,
    #[serde(default = "default_standard")]
    pub standard: String,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct BuildConfig {
    pub compiler: Option<String>,
    pub objcopy: Option<String>,
    pub mcu: Option<String>,
    pub cflags: Option<Vec<String>>,
    pub ldflags: Option<Vec<String>>,
    pub include_dirs: Option<Vec<String>>,
    pub linker_script: Option<String>,
    pub libs: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FirmwareConfig {
    // "bin" (default) or "ihex"
    pub format: Option<String>,
    pub version_source: Option<String>,
}

fn default_standard() -> String {
    "c11".to_string()
}

// --- Helper: Load Config Once ---
pub fn load_config() -> Result<McxConfig> {
    load_config_from(Path::new("mcx.toml"))
}

pub fn load_config_from(path: &Path) -> Result<McxConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!("{} not found", path.display()));
    }
    let config_str = fs::read_to_string(path)?;
    toml::from_str(&config_str).context("Failed to parse mcx.toml")
}
