use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

/// Default interpreter for generated snippets. Point `runner` at
/// `["blender", "--background", "--python"]` to run against a real scene.
fn default_runner() -> Vec<String> {
    vec!["python3".to_string()]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub default_model: Option<String>,
    #[serde(default = "default_runner")]
    pub runner: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_key: None,
            project_id: None,
            organization_id: None,
            default_model: None,
            runner: default_runner(),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    /// Credentials with environment variables taking precedence over the
    /// config file, so a key exported in the shell wins.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY").ok().or_else(|| self.api_key.clone())
    }

    pub fn resolved_project_id(&self) -> Option<String> {
        std::env::var("OPENAI_PROJECT").ok().or_else(|| self.project_id.clone())
    }

    pub fn resolved_organization_id(&self) -> Option<String> {
        std::env::var("OPENAI_ORGANIZATION").ok().or_else(|| self.organization_id.clone())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("blendmate").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.runner, vec!["python3".to_string()]);
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.api_key = Some("sk-proj-test".to_string());
        config.project_id = Some("proj_123".to_string());
        config.organization_id = Some("org_456".to_string());
        config.default_model = Some("gpt-4o".to_string());
        config.runner = vec![
            "blender".to_string(),
            "--background".to_string(),
            "--python".to_string(),
        ];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("sk-proj-test"));
        assert_eq!(loaded.project_id.as_deref(), Some("proj_123"));
        assert_eq!(loaded.organization_id.as_deref(), Some("org_456"));
        assert_eq!(loaded.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(loaded.runner.len(), 3);
    }

    #[test]
    fn runner_defaults_when_absent_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_key":"k","project_id":null,"organization_id":null,"default_model":null}"#,
        )
        .unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.runner, vec!["python3".to_string()]);
    }
}
