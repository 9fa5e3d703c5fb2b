use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::TemplateActionDefaults;
use crate::frontmatter::{split_template, ControlSettings};
use crate::input::parse_input;
use crate::template::{ActiveTemplate, TemplateDescriptor, TemplateIdentifier};
use crate::vault::{Vault, VaultEntry, VaultError};

const TEMPLATE_EXTENSION: &str = ".md";

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Couldn't find template: {0}")]
    TemplateNotFound(String),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// A folder that could hold templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateFolder {
    pub path: String,
    /// 1 for folders at the vault root.
    pub depth: usize,
    pub num_templates: usize,
}

/// Finds templates in a vault and turns them into templates ready to fill in.
///
/// Nothing is cached: every call reads the template files again.
pub struct TemplateProcessing<V: Vault> {
    vault: V,
}

impl<V: Vault> TemplateProcessing<V> {
    pub fn new(vault: V) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Identifiers of every template in `directory`. A missing directory has none.
    pub fn template_identifiers(&self, directory: &str) -> Vec<TemplateIdentifier> {
        let children = match self.vault.list_children(directory) {
            Ok(children) => children,
            Err(e) => {
                warn!("Couldn't read template directory '{}': {}", directory, e);
                return Vec::new();
            }
        };
        let identifiers: Vec<TemplateIdentifier> = children
            .iter()
            .filter_map(|entry| match entry {
                VaultEntry::File(path) if path.ends_with(TEMPLATE_EXTENSION) => {
                    Some(self.template_identifier(path))
                }
                _ => None,
            })
            .collect();
        info!(
            "Got templates: {}",
            identifiers
                .iter()
                .map(|t| t.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        identifiers
    }

    /// The identifier of one template file, from its `template-id`/`template-name`
    /// directives or its file name.
    pub fn template_identifier(&self, path: &str) -> TemplateIdentifier {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let stem = file_name
            .strip_suffix(TEMPLATE_EXTENSION)
            .unwrap_or(file_name);
        match self.vault.read_file(path) {
            Ok(text) => {
                let parts = split_template(&text);
                let control = ControlSettings::from_mapping(&parts.control_properties);
                TemplateIdentifier {
                    id: control.id.unwrap_or_else(|| stem.to_lowercase()),
                    name: control.name.unwrap_or_else(|| stem.to_string()),
                    path: path.to_string(),
                }
            }
            Err(e) => {
                warn!("Couldn't read template: {}: {}", path, e);
                TemplateIdentifier {
                    id: file_name.to_lowercase(),
                    name: format!("Can't parse {}", file_name),
                    path: path.to_string(),
                }
            }
        }
    }

    /// Finds a template in `directory` by id, name or path.
    pub fn find_template(&self, directory: &str, query: &str) -> Option<TemplateIdentifier> {
        self.template_identifiers(directory)
            .into_iter()
            .find(|t| t.id == query || t.name == query || t.path == query)
    }

    /// Number of templates in a folder, or `None` if the folder does not exist.
    pub fn count_templates(&self, folder: &str) -> Option<usize> {
        let children = self.vault.list_children(folder).ok()?;
        Some(
            children
                .iter()
                .filter(|c| matches!(c, VaultEntry::File(p) if p.ends_with(TEMPLATE_EXTENSION)))
                .count(),
        )
    }

    /// Every folder of the vault, depth first, with the number of templates it holds.
    pub fn template_folders(&self) -> Vec<TemplateFolder> {
        let mut folders = Vec::new();
        self.descend("", 0, &mut folders);
        debug!("Template folders: {:?}", folders);
        folders
    }

    fn descend(&self, folder: &str, depth: usize, all: &mut Vec<TemplateFolder>) {
        let Ok(children) = self.vault.list_children(folder) else {
            return;
        };
        if depth > 0 {
            all.push(TemplateFolder {
                path: folder.to_string(),
                depth,
                num_templates: self.count_templates(folder).unwrap_or(0),
            });
        }
        for child in children {
            if let VaultEntry::Folder(path) = child {
                self.descend(&path, depth + 1, all);
            }
        }
    }

    /// Reads and parses a template. Always goes back to the vault.
    pub fn load_template(
        &self,
        template_id: &TemplateIdentifier,
        defaults: &TemplateActionDefaults,
    ) -> Result<TemplateDescriptor, ProcessingError> {
        let text = self
            .vault
            .read_file(&template_id.path)
            .map_err(|e| match e {
                VaultError::NotFound(_) => {
                    ProcessingError::TemplateNotFound(template_id.path.clone())
                }
                other => ProcessingError::Vault(other),
            })?;
        Ok(TemplateDescriptor::from_text(&text, defaults))
    }

    /// Sets a template up for use: loads it, seeds its data from the selected text
    /// (split on `delimiter`) and picks the default replacement.
    pub fn prepare_template(
        &self,
        template_id: &TemplateIdentifier,
        defaults: &TemplateActionDefaults,
        input: &str,
        delimiter: &str,
    ) -> Result<ActiveTemplate, ProcessingError> {
        let template = self.load_template(template_id, defaults)?;
        let data = parse_input(input, &template.input_field_list, delimiter);
        Ok(ActiveTemplate::new(input, template_id.clone(), template, data))
    }
}
