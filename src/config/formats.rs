use std::str::FromStr;

use super::core::HookrunConfig;
use crate::error::HookrunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            other => Err(format!("unsupported format '{other}', use toml, json or yaml")),
        }
    }
}

impl HookrunConfig {
    /// Render the merged configuration in `format`
    pub fn export_config(&self, format: ConfigFormat) -> Result<String, HookrunError> {
        let rendered = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yml::to_string(self).map_err(|e| e.to_string()),
        };
        rendered.map_err(|e| HookrunError::Config(format!("cannot render configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HookrunConfig {
        toml::from_str(
            r#"
            [[hooks.pre-commit.steps]]
            name = "fmt"
            glob = "*.rs"
            fix = "rustfmt {{files}}"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_export_formats_parse_back() {
        let config = sample();

        let json = config.export_config(ConfigFormat::Json).unwrap();
        assert!(json.contains("\"pre-commit\""));
        let from_json: HookrunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json, config);

        let toml_text = config.export_config(ConfigFormat::Toml).unwrap();
        let from_toml: HookrunConfig = toml::from_str(&toml_text).unwrap();
        assert_eq!(from_toml, config);

        let yaml = config.export_config(ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("rustfmt {{files}}"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("YAML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert!("xml".parse::<ConfigFormat>().is_err());
    }
}
