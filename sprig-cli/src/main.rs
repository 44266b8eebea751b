//! Sprig CLI - build, query and pretty-print XML documents through handles

mod args;

use args::{parse_attributes, parse_indent};
use clap::{Parser, Subcommand};
use sprig_core::{
    serialize, Config, ElementUpdate, Handle, Manipulator, Match, Search, SerializeOptions,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent
const LOCAL_CONFIG: &str = "sprig.toml";

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Handle-indexed XML building, querying and pretty-printing", long_about = None)]
struct Cli {
    /// Config file (default: ./sprig.toml when present)
    #[arg(long, global = true, env = "SPRIG_CONFIG")]
    config: Option<PathBuf>,

    /// Indentation: a number of spaces or a literal string
    #[arg(long, global = true)]
    indent: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pretty-print a document
    Pretty {
        file: PathBuf,
    },

    /// Print a document on a single line
    Compact {
        file: PathBuf,
    },

    /// Show the handle and content of the first matching element
    Find {
        file: PathBuf,
        tag: String,
        /// Exact attribute filter (repeatable key=value)
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
        /// Tag of the direct parent
        #[arg(short, long)]
        parent: Option<String>,
        /// Exact attribute filter on the direct parent (repeatable key=value)
        #[arg(long = "parent-attr")]
        parent_attrs: Vec<String>,
    },

    /// List matching elements with their parents
    Infos {
        file: PathBuf,
        tag: String,
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
        #[arg(short, long)]
        parent: Option<String>,
        /// Report every match instead of the first one
        #[arg(long)]
        all: bool,
    },

    /// Add an element and print (or write back) the document
    Add {
        file: PathBuf,
        tag: String,
        /// Tag of the element to add under (default: the root)
        #[arg(long)]
        under: Option<String>,
        #[arg(short, long, default_value = "")]
        text: String,
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
        /// Write the result back to the file
        #[arg(short, long)]
        write: bool,
    },

    /// Remove the first matching element
    Remove {
        file: PathBuf,
        tag: String,
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(short, long)]
        write: bool,
    },

    /// Change tag, text or attributes of the first matching element
    Update {
        file: PathBuf,
        tag: String,
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
        #[arg(long)]
        set_tag: Option<String>,
        #[arg(long)]
        set_text: Option<String>,
        /// Replacement attributes (repeatable key=value)
        #[arg(long = "set-attr")]
        set_attrs: Vec<String>,
        #[arg(short, long)]
        write: bool,
    },

    /// Write the default config file
    InitConfig {
        #[arg(default_value = LOCAL_CONFIG)]
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(&cli);

    if let Err(e) = result {
        if cli.json {
            let error_json = serde_json::json!({ "code": e.code(), "message": e.to_string() });
            eprintln!("{}", error_json);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("SPRIG_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> sprig_core::Result<()> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Pretty { file } => cmd_print(file, config, true, cli.json),
        Commands::Compact { file } => cmd_print(file, config, false, cli.json),
        Commands::Find {
            file,
            tag,
            attrs,
            parent,
            parent_attrs,
        } => {
            let mut search = build_search(tag, attrs, parent.as_deref())?;
            search.parent_attributes = parse_attributes(parent_attrs)?;
            cmd_find(file, config, &search, cli.json)
        }
        Commands::Infos {
            file,
            tag,
            attrs,
            parent,
            all,
        } => {
            let search = build_search(tag, attrs, parent.as_deref())?;
            cmd_infos(file, config, &search, *all, cli.json)
        }
        Commands::Add {
            file,
            tag,
            under,
            text,
            attrs,
            write,
        } => cmd_add(file, config, tag, under.as_deref(), text, attrs, *write),
        Commands::Remove {
            file,
            tag,
            attrs,
            parent,
            write,
        } => {
            let search = build_search(tag, attrs, parent.as_deref())?;
            cmd_remove(file, config, &search, *write)
        }
        Commands::Update {
            file,
            tag,
            attrs,
            set_tag,
            set_text,
            set_attrs,
            write,
        } => {
            let search = build_search(tag, attrs, None)?;
            let changes = ElementUpdate {
                tag: set_tag.clone(),
                text: set_text.clone(),
                attributes: parse_attributes(set_attrs)?,
            };
            cmd_update(file, config, &search, changes, *write)
        }
        Commands::InitConfig { path } => cmd_init_config(path),
    }
}

/// Resolve config: explicit path, then ./sprig.toml, then defaults.
/// `--indent` overrides whatever the file says.
fn load_config(cli: &Cli) -> sprig_core::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(LOCAL_CONFIG).is_file() => Config::load(Path::new(LOCAL_CONFIG))?,
        None => Config::default(),
    };
    if let Some(indent) = &cli.indent {
        config.output.indent = parse_indent(indent);
    }
    tracing::debug!(?config, "config loaded");
    Ok(config)
}

fn build_search(tag: &str, attrs: &[String], parent: Option<&str>) -> sprig_core::Result<Search> {
    Ok(Search {
        tag: tag.to_string(),
        attributes: parse_attributes(attrs)?,
        parent_tag: parent.map(String::from),
        parent_attributes: None,
    })
}

fn open(file: &Path, config: Config) -> sprig_core::Result<Manipulator> {
    Manipulator::from_path_with_config(file, config)
}

/// Print the document, or write it back to `file` when `write` is set
fn emit(doc: &Manipulator, file: &Path, write: bool) -> sprig_core::Result<()> {
    use colored::Colorize;

    let pretty = doc.config().output.pretty;
    if write {
        doc.write_to(file, pretty)?;
        eprintln!("{} {}", "Wrote".green(), file.display());
    } else {
        print!("{}", doc.get_string(pretty));
        if !pretty {
            println!();
        }
    }
    Ok(())
}

fn cmd_print(file: &Path, config: Config, pretty: bool, json: bool) -> sprig_core::Result<()> {
    let doc = open(file, config)?;
    if json {
        let element = doc.to_element();
        println!("{}", to_json(&serde_json::json!(element)));
    } else if pretty {
        print!("{}", doc.get_string(true));
    } else {
        println!("{}", doc.get_string(false));
    }
    Ok(())
}

fn cmd_find(file: &Path, config: Config, search: &Search, json: bool) -> sprig_core::Result<()> {
    use colored::Colorize;

    let doc = open(file, config)?;
    let handle = doc.get_id(search)?;
    let element = doc.get_element(handle)?;

    if json {
        let value = serde_json::json!({
            "handle": handle,
            "element": element.to_element(),
            "parent": element.parent().map(|p| p.tag()),
        });
        println!("{}", to_json(&value));
    } else {
        println!("{}: {}", "handle".cyan(), handle);
        let options = SerializeOptions::pretty(doc.config().output.indent.clone());
        print!("{}", serialize(element, &options));
    }
    Ok(())
}

fn cmd_infos(
    file: &Path,
    config: Config,
    search: &Search,
    all: bool,
    json: bool,
) -> sprig_core::Result<()> {
    use colored::Colorize;

    let doc = open(file, config)?;
    let matches = doc.get_infos(search, !all)?.into_vec();

    if json {
        let values: Vec<_> = matches.iter().map(match_json).collect();
        println!("{}", to_json(&serde_json::json!(values)));
        return Ok(());
    }

    for m in &matches {
        let handle = m
            .element
            .handle()
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string());
        let attrs: Vec<String> = m
            .element
            .attributes()
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect();
        let parent = m
            .parent
            .map(|p| format!(" in <{}>", p.tag()))
            .unwrap_or_default();
        println!(
            "{}: <{}> {}{} {:?}",
            handle.cyan(),
            m.element.tag(),
            attrs.join(" "),
            parent.dimmed(),
            m.element.text()
        );
    }
    println!("({} matches)", matches.len());
    Ok(())
}

fn cmd_add(
    file: &Path,
    config: Config,
    tag: &str,
    under: Option<&str>,
    text: &str,
    attrs: &[String],
    write: bool,
) -> sprig_core::Result<()> {
    let mut doc = open(file, config)?;
    let parent = match under {
        Some(parent_tag) => doc.get_id(&Search::tag(parent_tag))?,
        None => Handle::ROOT,
    };
    let attributes = parse_attributes(attrs)?.unwrap_or_default();
    let handle = doc.add(parent, tag, text, attributes)?;
    tracing::info!(%handle, %parent, "added <{}>", tag);
    emit(&doc, file, write)
}

fn cmd_remove(file: &Path, config: Config, search: &Search, write: bool) -> sprig_core::Result<()> {
    let mut doc = open(file, config)?;
    let handle = doc.get_id(search)?;
    let removed = doc.remove(handle)?;
    tracing::info!(%handle, "removed <{}>", removed.tag);
    emit(&doc, file, write)
}

fn cmd_update(
    file: &Path,
    config: Config,
    search: &Search,
    changes: ElementUpdate,
    write: bool,
) -> sprig_core::Result<()> {
    let mut doc = open(file, config)?;
    let handle = doc.get_id(search)?;
    doc.update(handle, changes)?;
    emit(&doc, file, write)
}

fn cmd_init_config(path: &Path) -> sprig_core::Result<()> {
    use colored::Colorize;

    Config::init(path)?;
    println!("{} {}", "Created".green(), path.display());
    Ok(())
}

fn match_json(m: &Match<'_>) -> serde_json::Value {
    serde_json::json!({
        "handle": m.element.handle(),
        "element": m.element.to_element(),
        "parent": m.parent.map(|p| p.tag()),
    })
}

fn to_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
