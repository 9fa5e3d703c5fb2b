use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use fromtemplate::config::ConfigError;
use fromtemplate::form::{bad_filename_chars, initial_data, join_multi, needs_input};
use fromtemplate::{
    write_template, ActiveTemplate, CreateType, FsVault, InputType, ReplacementOptions,
    Settings, TemplateIdentifier, TemplateProcessing, Vault,
};
use inquire::{MultiSelect, Select, Text};
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root folder of the vault
    #[arg(short, long, global = true, default_value = ".")]
    vault: PathBuf,

    /// Path to the YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the templates in the template directory
    List,
    /// List the folders of the vault with their template counts
    Folders,
    /// Show the input fields of a template
    Fields {
        /// Template id, name or path
        template: String,
    },
    /// Fill in a template and create the note
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Template id, name or path
    template: String,

    /// Selected text, split into the template's input fields
    #[arg(short, long, default_value = "")]
    input: String,

    /// Field value as KEY=VALUE
    #[arg(short, long = "set", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Which of the template's replacement patterns to use, starting at 1
    #[arg(short, long)]
    replacement: Option<usize>,

    /// Ask for every field interactively
    #[arg(short, long)]
    prompt: bool,

    /// Override whether the note is created and opened
    #[arg(long, value_parser = parse_create_type)]
    create: Option<CreateType>,

    /// Note the template is invoked from, provides currentTitle and currentPath
    #[arg(long)]
    current_note: Option<String>,

    /// Print the note instead of writing it
    #[arg(long)]
    dry_run: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn parse_create_type(s: &str) -> Result<CreateType, ConfigError> {
    s.parse()
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let processing = TemplateProcessing::new(FsVault::new(&cli.vault));

    match cli.command {
        Commands::List => list_templates(&processing, &settings),
        Commands::Folders => list_folders(&processing),
        Commands::Fields { template } => show_fields(&processing, &settings, &template),
        Commands::Render(args) => render(&processing, &settings, args),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            info!("Loading settings from {:?}", path);
            Settings::load(path).context("Failed to load settings")
        }
        None => Ok(Settings::default()),
    }
}

fn list_templates(processing: &TemplateProcessing<FsVault>, settings: &Settings) -> Result<()> {
    for t in processing.template_identifiers(&settings.template_directory) {
        println!("{}\t{}\t{}", t.id, t.name, t.path);
    }
    Ok(())
}

fn list_folders(processing: &TemplateProcessing<FsVault>) -> Result<()> {
    for folder in processing.template_folders() {
        println!(
            "{}{} ({})",
            "-".repeat(folder.depth - 1),
            folder.path,
            folder.num_templates
        );
    }
    Ok(())
}

fn resolve_template(
    processing: &TemplateProcessing<FsVault>,
    settings: &Settings,
    query: &str,
) -> Result<TemplateIdentifier> {
    if let Some(found) = processing.find_template(&settings.template_directory, query) {
        return Ok(found);
    }
    for path in [query.to_string(), format!("{}.md", query)] {
        if processing.vault().read_file(&path).is_ok() {
            return Ok(processing.template_identifier(&path));
        }
    }
    bail!("Couldn't find template: {}", query)
}

fn show_fields(
    processing: &TemplateProcessing<FsVault>,
    settings: &Settings,
    query: &str,
) -> Result<()> {
    let id = resolve_template(processing, settings, query)?;
    let template = processing.load_template(&id, &settings.defaults)?;
    println!("{} -> {}/{}.md", id.name, template.output_directory, template.template_filename);
    for (i, field) in template.fields.iter().enumerate() {
        let mut line = format!("{}. {} [{}]", i + 1, field.id, field.input_type);
        if !field.args.is_empty() {
            line.push_str(&format!(" {}", field.args.join(", ")));
        }
        if let Some(description) = &field.description {
            line.push_str(&format!(" - {}", description));
        }
        println!("{}", line);
    }
    Ok(())
}

fn render(
    processing: &TemplateProcessing<FsVault>,
    settings: &Settings,
    args: RenderArgs,
) -> Result<()> {
    let id = resolve_template(processing, settings, &args.template)?;
    let mut active =
        processing.prepare_template(&id, &settings.defaults, &args.input, &settings.input_split)?;
    if let Some(note) = &args.current_note {
        active = active.with_current_note(note);
    }
    active.data.extend(args.set);
    initial_data(&active.template.fields, &mut active.data, &Local::now());

    if args.prompt {
        prompt_fields(&mut active)?;
    }
    if let Some(n) = args.replacement {
        if n == 0 || !active.select_replacement(n - 1) {
            bail!(
                "Template has {} replacement patterns, can't use number {}",
                active.template.text_replacement_templates.len(),
                n
            );
        }
    }

    let result = active
        .render()
        .with_context(|| format!("Failed to fill out template '{}'", id.name))?;
    let options = ReplacementOptions::for_input(
        active.template.replace_selection,
        args.create.unwrap_or(active.template.create_open),
        &active.input,
        true,
    );

    if args.dry_run {
        info!("=== DRY RUN MODE ===");
        println!("{}", result.full_path());
        println!("{}", result.note);
        if options.will_replace_selection {
            println!("{}", result.replacement_text);
        }
        return Ok(());
    }

    let outcome = write_template(processing.vault(), &result, &options)?;
    if let Some(path) = &outcome.created {
        info!("Created {}", path);
        if let Some(open) = outcome.open {
            info!("Open {} ({})", path, open);
        }
    }
    if let Some(replacement) = outcome.replacement {
        println!("{}", replacement);
    }
    Ok(())
}

fn prompt_fields(active: &mut ActiveTemplate) -> Result<()> {
    let fields = active.template.fields.clone();
    for field in fields.iter().filter(|f| needs_input(f)) {
        let label = field.label();
        let current = active.data.get(&field.id).cloned().unwrap_or_default();
        let value = match field.input_type {
            InputType::Choice if !field.args.is_empty() => {
                let cursor = field.args.iter().position(|a| *a == current).unwrap_or(0);
                Select::new(&label, field.args.clone())
                    .with_starting_cursor(cursor)
                    .prompt()?
            }
            InputType::Multi if !field.args.is_empty() => {
                let selected = MultiSelect::new(&label, field.args.clone()).prompt()?;
                join_multi(&selected)
            }
            InputType::NoteTitle => loop {
                let title = text_prompt(&label, &current, field.description.as_deref())?;
                if !bad_filename_chars(&title) {
                    break title;
                }
                warn!("Characters not allowed in filenames: :[]?/\\");
            },
            _ => text_prompt(&label, &current, field.description.as_deref())?,
        };
        active.data.insert(field.id.clone(), value);
    }
    Ok(())
}

fn text_prompt(label: &str, default: &str, help: Option<&str>) -> Result<String> {
    let mut prompt = Text::new(label).with_default(default);
    if let Some(help) = help {
        prompt = prompt.with_help_message(help);
    }
    Ok(prompt.prompt()?)
}
