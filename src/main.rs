use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use simplelog::{LevelFilter, WriteLogger};

use yachexp::conversation::{
    ConversationExtractor, conversation_link, conversation_title, question_preview,
};
use yachexp::diagnostics::DiagnosticLevel;
use yachexp::dom::HtmlDocument;
use yachexp::export::ExportAssembler;
use yachexp::idle::IdleWatcher;
use yachexp::panic_handler;
use yachexp::selection::PairSelection;
use yachexp::settings::{self, ExportOptions, Settings};
use yachexp::sink::{DirectorySink, DocumentSink, WriterSink};
use yachexp::templates::{DefaultTemplateSet, TemplateField};
use yachexp::ExportError;

const STDIN_INPUT: &str = "-";

#[derive(Parser, Debug)]
#[command(
    name = "yachexp",
    version,
    about = "Export chat conversations saved as HTML to clean Markdown"
)]
struct Cli {
    /// Settings file (defaults to settings.json in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Log file (defaults to yachexp.log in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a saved conversation to a Markdown file
    Export(ExportArgs),
    /// List the questions of a saved conversation
    List {
        /// HTML file, or - for stdin
        input: String,
    },
    /// Manage template profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// HTML file, or - for stdin
    input: String,

    /// Directory to write <filename>.md into
    #[arg(long, short, value_name = "DIR", default_value = ".", conflicts_with = "stdout")]
    out_dir: PathBuf,

    /// Write the Markdown to stdout instead of a file
    #[arg(long)]
    stdout: bool,

    /// Use this profile instead of the active one
    #[arg(long, short)]
    profile: Option<String>,

    /// Override the conversation title
    #[arg(long)]
    title: Option<String>,

    /// Override the conversation link
    #[arg(long)]
    link: Option<String>,

    /// Pairs to export: "all" or 1-based indices and ranges like 1,3-5
    #[arg(long, short, default_value = "all", value_name = "SPEC")]
    select: PairSelection,

    /// Re-read the input until the stop-generation button is gone
    #[arg(long)]
    wait_idle: bool,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// List profiles, marking the active one
    List,
    /// Print the templates of a profile (the active one by default)
    Show { name: Option<String> },
    /// Create a profile with empty templates
    Add { name: Option<String> },
    /// Delete a profile
    Remove { name: String },
    /// Make a profile the active one
    Use { name: String },
    /// Set one template of a profile
    Set {
        name: String,
        field: TemplateField,
        value: String,
    },
    /// Replace all profiles with the built-in default
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.clone(), cli.verbose)?;
    panic_handler::initialize_panic_handler();

    info!("Starting yachexp {}", env!("CARGO_PKG_VERSION"));
    let settings = load_settings(cli.settings.as_deref());

    let result = match cli.command {
        Command::Export(args) => run_export(args, &settings),
        Command::List { input } => run_list(&input, &settings.export),
        Command::Profile(command) => run_profile(command, settings),
    };
    if let Err(err) = &result {
        error!("Command failed: {err:?}");
    }
    result
}

fn init_logging(log_file: Option<PathBuf>, verbose: bool) -> Result<()> {
    let path = match log_file {
        Some(path) => path,
        None => match settings::config_dir() {
            Some(dir) => {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                dir.join("yachexp.log")
            }
            None => PathBuf::from("yachexp.log"),
        },
    };
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // html5ever is chatty at debug level
    WriteLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_max_level(level)
            .add_filter_ignore_str("html5ever")
            .build(),
        File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?,
    )?;
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Settings {
    let path = path
        .map(Path::to_path_buf)
        .or_else(settings::default_settings_path);
    let path = path.map(|p| p.to_string_lossy().into_owned());
    Settings::load_or_ephemeral(path.as_deref())
}

fn read_input(input: &str) -> Result<String> {
    if input == STDIN_INPUT {
        let mut html = String::new();
        io::stdin()
            .read_to_string(&mut html)
            .context("Failed to read HTML from stdin")?;
        Ok(html)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn wait_for_idle(input: &str, options: &ExportOptions) -> Result<()> {
    if input == STDIN_INPUT {
        bail!("--wait-idle needs a file that can be re-read, not stdin");
    }

    let probe = options.stop_probe();
    let path = input.to_string();
    let mut watcher = IdleWatcher::new(move || match fs::read_to_string(&path) {
        Ok(html) => probe.is_present(HtmlDocument::parse(&html).root()),
        Err(e) => {
            warn!("Could not re-read {path}: {e}");
            true
        }
    });
    watcher.on_idle(|| info!("Generation finished, exporting"));

    eprintln!("Waiting for generation to finish...");
    if !watcher.poll(options.poll_interval(), options.idle_timeout()) {
        bail!(
            "Timed out after {}s waiting for generation to finish",
            options.idle_timeout_secs
        );
    }
    Ok(())
}

fn run_export(args: ExportArgs, settings: &Settings) -> Result<()> {
    if args.wait_idle {
        wait_for_idle(&args.input, &settings.export)?;
    }

    let html = read_input(&args.input)?;
    let document = HtmlDocument::parse(&html);
    let extractor = ConversationExtractor::new(settings.export.extractor_config());
    let pairs = extractor.extract_pairs(document.root());
    if pairs.is_empty() {
        info!("No question/answer pairs in {}", args.input);
        eprintln!("{}", ExportError::NothingToExport);
        return Ok(());
    }
    let pairs = args.select.apply(&pairs)?;

    let templates = match &args.profile {
        Some(name) => settings
            .profile_by_name(name)
            .with_context(|| format!("No profile named '{name}'"))?
            .templates
            .clone(),
        None => settings.active_template_set(),
    };
    let title = args
        .title
        .unwrap_or_else(|| conversation_title(&document));
    let link = args.link.unwrap_or_else(|| conversation_link(&document));

    let assembler = ExportAssembler::new(DefaultTemplateSet::builtin());
    let report = match assembler.assemble(
        &pairs,
        &templates,
        &title,
        &link,
        Local::now().date_naive(),
    ) {
        Ok(report) => report,
        Err(ExportError::NothingToExport) => {
            eprintln!("{}", ExportError::NothingToExport);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for diagnostic in &report.diagnostics {
        let label = match diagnostic.level {
            DiagnosticLevel::Info => "note",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        };
        match diagnostic.pair_index {
            Some(index) => eprintln!("{label}: pair {}: {}", index + 1, diagnostic.message),
            None => eprintln!("{label}: {}", diagnostic.message),
        }
    }

    let saved = if args.stdout {
        WriterSink::new(io::stdout().lock()).save(&report.document)?
    } else {
        DirectorySink::new(&args.out_dir)
            .save(&report.document)
            .with_context(|| format!("Failed to write export into {}", args.out_dir.display()))?
    };
    if let Some(path) = saved {
        eprintln!(
            "Exported {} pairs to {}",
            report.pair_count,
            path.display()
        );
    }
    Ok(())
}

fn run_list(input: &str, options: &ExportOptions) -> Result<()> {
    let html = read_input(input)?;
    let document = HtmlDocument::parse(&html);
    let pairs = ConversationExtractor::new(options.extractor_config()).extract_pairs(document.root());
    if pairs.is_empty() {
        eprintln!("{}", ExportError::NothingToExport);
        return Ok(());
    }

    println!("{}", conversation_title(&document));
    for (index, pair) in pairs.iter().enumerate() {
        println!("{:>3}. {}", index + 1, question_preview(&pair.question));
    }
    Ok(())
}

fn run_profile(command: ProfileCommand, mut settings: Settings) -> Result<()> {
    match command {
        ProfileCommand::List => {
            let active = settings.active_profile_id();
            for (id, profile) in settings.profiles_sorted() {
                let marker = if Some(id) == active { "*" } else { " " };
                println!("{marker} {}", profile.name);
            }
            return Ok(());
        }
        ProfileCommand::Show { name } => {
            let profile = match &name {
                Some(name) => settings
                    .profile_by_name(name)
                    .with_context(|| format!("No profile named '{name}'"))?,
                None => settings
                    .active_profile()
                    .context("No active profile")?,
            };
            println!("name: {}", profile.name);
            for field in TemplateField::ALL {
                match profile.templates.get(field) {
                    Some(value) => println!("{field}: {value:?}"),
                    None => println!("{field}: (default)"),
                }
            }
            return Ok(());
        }
        ProfileCommand::Add { name } => {
            let id = settings.add_profile(name.as_deref())?;
            if let Some(profile) = settings.profile(&id) {
                println!("Created profile '{}'", profile.name);
            }
        }
        ProfileCommand::Remove { name } => {
            settings.remove_profile(&name)?;
            println!("Removed profile '{name}'");
        }
        ProfileCommand::Use { name } => {
            settings.activate(&name)?;
            println!("Active profile is now '{name}'");
        }
        ProfileCommand::Set { name, field, value } => {
            settings.set_field(&name, field, &value)?;
            println!("Updated {field} of '{name}'");
        }
        ProfileCommand::Reset => {
            settings.reset();
            println!("Profiles reset to the built-in default");
        }
    }

    settings.save().context("Failed to save settings")?;
    if let Some(path) = settings.file_path() {
        info!("Saved settings to {path}");
    }
    Ok(())
}
