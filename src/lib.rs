//! Create notes from mustache templates.
//!
//! A template is a Markdown file with optional YAML front matter. `template-*` keys in
//! the front matter configure where the note goes and what replaces the selection; all
//! other keys are rendered and copied into the new note. Tags in the body and front
//! matter such as `{{tags:choice:work:home|Pick a context}}` become typed input fields.

pub mod config;
pub mod dates;
pub mod engine;
pub mod field;
pub mod form;
pub mod frontmatter;
pub mod input;
pub mod processing;
pub mod scanner;
pub mod template;
pub mod vault;
pub mod writer;

pub use config::{CreateType, ReplaceType, Settings, TemplateActionDefaults};
pub use engine::{TemplateData, TemplateEngine};
pub use field::{InputType, TemplateField};
pub use processing::TemplateProcessing;
pub use template::{
    ActiveTemplate, TemplateDescriptor, TemplateError, TemplateIdentifier, TemplateResult,
};
pub use vault::{FsVault, MemoryVault, Vault};
pub use writer::{write_template, ReplacementOptions};
