use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Whether the selected text is replaced after a note is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceType {
    #[default]
    Always,
    /// Only when something was selected.
    Sometimes,
    Never,
}

/// Whether the generated note is created and where it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateType {
    None,
    Create,
    Open,
    OpenPane,
    #[default]
    OpenTab,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unknown value '{0}'")]
    UnknownValue(String),
}

impl FromStr for ReplaceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ReplaceType::Always),
            "sometimes" => Ok(ReplaceType::Sometimes),
            "never" => Ok(ReplaceType::Never),
            other => Err(ConfigError::UnknownValue(other.to_string())),
        }
    }
}

impl FromStr for CreateType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CreateType::None),
            "create" => Ok(CreateType::Create),
            "open" => Ok(CreateType::Open),
            "open-pane" => Ok(CreateType::OpenPane),
            "open-tab" => Ok(CreateType::OpenTab),
            other => Err(ConfigError::UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for CreateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreateType::None => "none",
            CreateType::Create => "create",
            CreateType::Open => "open",
            CreateType::OpenPane => "open-pane",
            CreateType::OpenTab => "open-tab",
        };
        f.write_str(s)
    }
}

/// Values a template falls back to for every directive it leaves out.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateActionDefaults {
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_template_filename")]
    pub template_filename: String,
    #[serde(default = "default_input_field_list")]
    pub input_field_list: String,
    #[serde(default = "default_text_replacement_templates")]
    pub text_replacement_templates: Vec<String>,
    #[serde(default)]
    pub replace_selection: ReplaceType,
    #[serde(default)]
    pub create_open: CreateType,
}

impl Default for TemplateActionDefaults {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            template_filename: default_template_filename(),
            input_field_list: default_input_field_list(),
            text_replacement_templates: default_text_replacement_templates(),
            replace_selection: ReplaceType::default(),
            create_open: CreateType::default(),
        }
    }
}

fn default_output_directory() -> String {
    "test".to_string()
}

fn default_template_filename() -> String {
    "{{title}}".to_string()
}

fn default_input_field_list() -> String {
    "title,body".to_string()
}

fn default_text_replacement_templates() -> Vec<String> {
    vec!["[[{{title}}]]".to_string()]
}

/// User settings, read from a YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Vault folder the templates are read from.
    #[serde(default = "default_template_directory")]
    pub template_directory: String,
    /// Regular expression separating the values of the selected text.
    #[serde(default = "default_input_split")]
    pub input_split: String,
    #[serde(flatten)]
    pub defaults: TemplateActionDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_directory: default_template_directory(),
            input_split: default_input_split(),
            defaults: TemplateActionDefaults::default(),
        }
    }
}

fn default_template_directory() -> String {
    "templates".to_string()
}

fn default_input_split() -> String {
    r"\s+-\s+".to_string()
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
