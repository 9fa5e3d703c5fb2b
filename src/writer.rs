use log::{error, info};
use thiserror::Error;

use crate::config::{CreateType, ReplaceType};
use crate::template::TemplateResult;
use crate::vault::{Vault, VaultError};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Couldn't create file '{filename}': {source}")]
    Create {
        filename: String,
        #[source]
        source: VaultError,
    },
    #[error("Couldn't create file: the filename is empty")]
    EmptyFilename,
}

/// What happens to the editor selection and the new note once a template is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacementOptions {
    pub should_replace_selection: ReplaceType,
    pub should_create_open: CreateType,
    pub will_replace_selection: bool,
}

impl ReplacementOptions {
    /// Decides whether the selection is replaced. Without an editor there is nothing to
    /// replace; `sometimes` replaces only a non-empty selection.
    pub fn for_input(
        replace: ReplaceType,
        create: CreateType,
        input: &str,
        has_editor: bool,
    ) -> Self {
        let should_replace_selection = if has_editor {
            replace
        } else {
            ReplaceType::Never
        };
        let will_replace_selection = match should_replace_selection {
            ReplaceType::Always => true,
            ReplaceType::Sometimes => !input.is_empty(),
            ReplaceType::Never => false,
        };
        Self {
            should_replace_selection,
            should_create_open: create,
            will_replace_selection,
        }
    }
}

/// What the host should do after a note was written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Path of the created note.
    pub created: Option<String>,
    /// Text to put in place of the selection.
    pub replacement: Option<String>,
    /// How to open the created note.
    pub open: Option<CreateType>,
}

/// Creates the note at `folder/filename.md` and works out the follow-up actions.
///
/// On failure nothing has been written, so the caller can adjust the values and retry.
pub fn write_template<V: Vault>(
    vault: &V,
    result: &TemplateResult,
    options: &ReplacementOptions,
) -> Result<WriteOutcome, WriteError> {
    let mut outcome = WriteOutcome::default();

    if options.should_create_open != CreateType::None {
        if result.filename.is_empty() {
            error!("Refusing to create a note without a filename");
            return Err(WriteError::EmptyFilename);
        }
        let path = vault
            .create_file(&result.full_path(), &result.note)
            .map_err(|source| {
                error!("Error writing template: {}", source);
                WriteError::Create {
                    filename: result.filename.clone(),
                    source,
                }
            })?;
        info!("Created {}", path);
        outcome.created = Some(path);
        if matches!(
            options.should_create_open,
            CreateType::Open | CreateType::OpenPane | CreateType::OpenTab
        ) {
            outcome.open = Some(options.should_create_open);
        }
    }

    if options.will_replace_selection {
        outcome.replacement = Some(result.replacement_text.clone());
    }
    Ok(outcome)
}
