use crate::paths::{add_start_directory, normalize_path};
use crate::pipeline::{OrganiseOptions, RelocationMode};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub start_directories: Vec<String>,
    pub destination_directory: String,
    pub min_size: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub naming_convention: String,
    pub move_or_copy: RelocationMode,
    pub verify_results: bool,
}

impl AppConfig {
    /// Adds a start directory unless it is already covered by a listed
    /// parent; listed descendants of it are dropped.
    pub fn add_start_directory(&mut self, directory: &str) -> &[String] {
        self.start_directories = add_start_directory(&self.start_directories, directory);
        &self.start_directories
    }

    pub fn remove_start_directory(&mut self, directory: &str) -> &[String] {
        let directory = normalize_path(directory);
        if let Some(index) = self
            .start_directories
            .iter()
            .position(|existing| *existing == directory)
        {
            self.start_directories.remove(index);
        }
        &self.start_directories
    }

    pub fn clear_start_directories(&mut self) {
        self.start_directories.clear();
    }

    pub fn set_destination_directory(&mut self, directory: &str) {
        self.destination_directory = normalize_path(directory);
    }

    pub fn to_options(&self) -> OrganiseOptions {
        OrganiseOptions {
            start_directories: self.start_directories.iter().map(PathBuf::from).collect(),
            destination_directory: self.destination_directory.clone(),
            min_size: self.min_size,
            min_width: self.min_width,
            min_height: self.min_height,
            naming_convention: self.naming_convention.clone(),
            mode: self.move_or_copy,
            verify_results: self.verify_results,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "photo-organiser", "photo-organiser")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(&paths, config)
}

/// Forgets every setting, including the start directories.
pub fn reset_config() -> Result<AppConfig> {
    let config = AppConfig::default();
    save_config(&config)?;
    Ok(config)
}

fn load_config_from(paths: &AppPaths) -> Result<AppConfig> {
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&paths.config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            paths.config_path.display()
        )
    })?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

fn save_config_to(paths: &AppPaths, config: &AppConfig) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "設定ディレクトリを作成できませんでした: {}",
            paths.config_dir.display()
        )
    })?;
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(&paths.config_path, body).with_context(|| {
        format!(
            "設定ファイルを書き込めませんでした: {}",
            paths.config_path.display()
        )
    })?;
    Ok(())
}
