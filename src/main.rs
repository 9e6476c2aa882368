use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lore_core::{Conversation, LoreConfig, OutputFormat, RankedResult, Resource, ScoringStrategy};
use lore_retrieval::backfill::backfill_tags_with_progress;
use lore_retrieval::{format_context, KeywordExpander, KeywordTagger, RetrievalPipeline};
use lore_store::{ResourceStore, StoreStats};

const CONFIG_FILE: &str = "lore.toml";

#[derive(Parser)]
#[command(
    name = "lore",
    version,
    about = "Local knowledge store with multi-query retrieval",
    long_about = "Lore keeps named text resources and a conversation log in a local SQLite\n\
                   database, and retrieves the most relevant resources for a question.\n\n\
                   Examples:\n  \
                     lore init                                Create a lore.toml config file\n  \
                     lore add --name 'Xylophone Basics' --file notes.md\n  \
                     lore search 'how are xylophones played'  Ranked retrieval\n  \
                     lore search mallets --literal            Plain substring search\n  \
                     lore backfill                            Tag untagged resources\n  \
                     lore history                             Recent conversations"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: lore.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides store.path from the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listings (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default lore.toml configuration file
    #[command(long_about = "Create a default lore.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if lore.toml already exists.")]
    Init,
    /// Store a new resource
    #[command(long_about = "Store a new resource.\n\n\
        Content comes from --content, --file, or stdin, in that order.\n\n\
        Examples:\n  lore add --name 'Marimba Care' --content 'Keep the bars dry.'\n  \
        cat notes.md | lore add --name Notes --tags music,practice")]
    Add {
        /// Resource name
        #[arg(long)]
        name: String,
        /// Resource content
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read content from file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Short description
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Show one resource by id
    Get {
        /// Resource id
        id: i64,
    },
    /// List all resources in insertion order
    List,
    /// List resources that have no tags
    Untagged,
    /// Replace the tags of a resource
    Tag {
        /// Resource id
        id: i64,
        /// Comma-separated tags
        tags: String,
    },
    /// Retrieve the resources most relevant to a query
    #[command(long_about = "Retrieve the resources most relevant to a query.\n\n\
        Scores every resource against the query and, with --expand, against\n\
        keywords extracted from it, then merges the candidates.\n\
        --literal switches to a plain case-insensitive substring search.\n\n\
        Examples:\n  lore search xylophone\n  lore search 'wooden percussion' --expand --limit 5\n  \
        lore search marimba --strategy field-precedence --context")]
    Search {
        /// Search query
        query: String,
        /// Maximum results to return (default: retrieval.n_results)
        #[arg(long)]
        limit: Option<usize>,
        /// Characters of content to keep per result (default: retrieval.content_length)
        #[arg(long)]
        content_length: Option<usize>,
        /// Scoring strategy: term-overlap or field-precedence
        #[arg(long)]
        strategy: Option<ScoringStrategy>,
        /// Add extracted keywords as extra queries
        #[arg(long)]
        expand: bool,
        /// Print results as `name: content` context lines
        #[arg(long, conflicts_with = "literal")]
        context: bool,
        /// Substring search over all fields instead of ranked retrieval
        #[arg(long)]
        literal: bool,
    },
    /// Generate tags for every untagged resource
    #[command(long_about = "Generate tags for every untagged resource.\n\n\
        Tags are the most frequent keywords of each resource's content.\n\
        Resources that yield no keywords stay untagged.")]
    Backfill {
        /// Maximum tags per resource
        #[arg(long, default_value = "5")]
        max_tags: usize,
    },
    /// Append an exchange to the conversation log
    Log {
        /// What the user asked
        #[arg(long)]
        user: String,
        /// What the assistant answered
        #[arg(long)]
        assistant: String,
    },
    /// Show logged conversations
    History {
        /// Number of recent conversations (default: history.recent_conversations)
        #[arg(long, conflicts_with = "all")]
        limit: Option<usize>,
        /// Show the whole log
        #[arg(long)]
        all: bool,
    },
    /// Show row counts for the store
    Stats,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Created {
    id: i64,
}

const DEFAULT_CONFIG: &str = r#"# Lore Configuration

[store]
# path = "lore.db"
# pool_size = 4
# busy_timeout_ms = 5000

[retrieval]
# n_results = 3
# content_length = 2048
# cache_capacity = 256
# max_keywords = 5
# strategy = "term-overlap"   # or "field-precedence"

[history]
# recent_conversations = 15
"#;

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("lore v{version}, a local knowledge store with multi-query retrieval\n");

    println!("Quick start:");
    println!("  lore init                   Create a lore.toml config file");
    println!("  lore add --name N --file F  Store a resource");
    println!("  lore search 'question'      Retrieve relevant resources\n");

    println!("All commands:");
    println!("  add       Store a new resource");
    println!("  get       Show one resource");
    println!("  list      List all resources");
    println!("  untagged  List resources without tags");
    println!("  tag       Replace a resource's tags");
    println!("  search    Ranked or literal search");
    println!("  backfill  Generate tags for untagged resources");
    println!("  log       Append to the conversation log");
    println!("  history   Show recent conversations");
    println!("  stats     Row counts");
    println!("  init      Create default configuration\n");

    println!("Run 'lore <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn load_config(cli: &Cli) -> Result<LoreConfig> {
    let mut config = match &cli.config {
        Some(path) => LoreConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                LoreConfig::from_file(default_path).wrap_err("loading lore.toml")?
            } else {
                LoreConfig::default()
            }
        }
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    Ok(config)
}

fn read_content(content: Option<String>, file: &Option<PathBuf>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!(
                    "No content provided. Use --content, --file, or pipe text on stdin."
                );
            }
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .into_diagnostic()
                .wrap_err("reading content from stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn render_resource(resource: &Resource, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(resource)?,
        OutputFormat::Markdown => {
            println!("## {} (#{})\n", resource.name, resource.id);
            if !resource.description_str().is_empty() {
                println!("_{}_\n", resource.description_str());
            }
            if !resource.tags_str().is_empty() {
                println!("**Tags:** {}\n", resource.tag_list().join(", "));
            }
            println!("{}", resource.content);
        }
        OutputFormat::Text => {
            println!("#{} {}", resource.id, resource.name);
            println!("created: {}", resource.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if !resource.description_str().is_empty() {
                println!("description: {}", resource.description_str());
            }
            println!("tags: {}", resource.tags_str());
            println!();
            println!("{}", resource.content);
        }
    }
    Ok(())
}

fn render_resources(resources: &[Resource], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(resources)?,
        OutputFormat::Markdown => {
            println!("| ID | Name | Tags | Created |");
            println!("|---:|------|------|---------|");
            for r in resources {
                println!(
                    "| {} | {} | {} | {} |",
                    r.id,
                    r.name,
                    r.tags_str(),
                    r.created_at.format("%Y-%m-%d")
                );
            }
        }
        OutputFormat::Text => {
            if resources.is_empty() {
                println!("No resources.");
            }
            for r in resources {
                println!("{:>5}  {}  [{}]", r.id, r.name, r.tags_str());
            }
        }
    }
    Ok(())
}

fn render_ranked(results: &[RankedResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(results)?,
        OutputFormat::Markdown => {
            for (i, r) in results.iter().enumerate() {
                println!("### {}. {} (score {:.2})\n", i + 1, r.name, r.score);
                if !r.tags.is_empty() {
                    println!("**Tags:** {}\n", r.tags);
                }
                println!("{}\n", r.content);
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No matching resources.");
            }
            for r in results {
                println!("{:>6.2}  {}", r.score, r.name);
                let preview = first_line(&r.content);
                if !preview.is_empty() {
                    println!("        {preview}");
                }
            }
        }
    }
    Ok(())
}

fn render_conversations(conversations: &[Conversation], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(conversations)?,
        OutputFormat::Markdown => {
            for c in conversations {
                println!("**User:** {}\n", c.user_input);
                println!("**Assistant:** {}\n", c.assistant_response);
            }
        }
        OutputFormat::Text => {
            if conversations.is_empty() {
                println!("No conversations logged.");
            }
            for c in conversations {
                println!("[{}] #{}", c.created_at.format("%Y-%m-%d %H:%M:%S"), c.id);
                println!("  user:      {}", c.user_input);
                println!("  assistant: {}", c.assistant_response);
            }
        }
    }
    Ok(())
}

fn render_stats(stats: &StoreStats, config: &LoreConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(stats)?,
        OutputFormat::Markdown => {
            println!("| Metric | Count |");
            println!("|--------|------:|");
            println!("| Resources | {} |", stats.total_resources);
            println!("| Untagged | {} |", stats.untagged_resources);
            println!("| Conversations | {} |", stats.total_conversations);
        }
        OutputFormat::Text => {
            println!("database:      {}", config.store.path.display());
            println!("resources:     {}", stats.total_resources);
            println!("untagged:      {}", stats.untagged_resources);
            println!("conversations: {}", stats.total_conversations);
        }
    }
    Ok(())
}

fn open_store(config: &LoreConfig) -> Result<ResourceStore> {
    ResourceStore::open_with(&config.store)
        .wrap_err_with(|| format!("opening {}", config.store.path.display()))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = &cli.command else {
        print_welcome();
        return Ok(());
    };
    let format = cli.format;
    let session = || -> Result<(LoreConfig, ResourceStore)> {
        let config = load_config(&cli)?;
        debug!(
            db = %config.store.path.display(),
            strategy = %config.retrieval.strategy,
            format = %cli.format,
            "resolved configuration"
        );
        let store = open_store(&config)?;
        Ok((config, store))
    };

    match command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("lore.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created lore.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "lore", &mut std::io::stdout());
        }
        Command::Add {
            name,
            content,
            file,
            description,
            tags,
        } => {
            let (_, store) = session()?;
            let content = read_content(content.clone(), file)?;
            let id = store.insert_resource(
                name,
                &content,
                description.as_deref(),
                tags.as_deref(),
            )?;
            match format {
                OutputFormat::Json => print_json(&Created { id })?,
                _ => println!("Added resource #{id}"),
            }
        }
        Command::Get { id } => {
            let (_, store) = session()?;
            match store.get_resource(*id)? {
                Some(resource) => render_resource(&resource, format)?,
                None => miette::bail!("resource #{id} not found"),
            }
        }
        Command::List => {
            let (_, store) = session()?;
            render_resources(&store.list_resources()?, format)?;
        }
        Command::Untagged => {
            let (_, store) = session()?;
            render_resources(&store.list_untagged()?, format)?;
        }
        Command::Tag { id, tags } => {
            let (_, store) = session()?;
            if store.get_resource(*id)?.is_none() {
                miette::bail!("resource #{id} not found");
            }
            store.update_tags(*id, tags)?;
            if format != OutputFormat::Json {
                println!("Tagged resource #{id}: {tags}");
            }
        }
        Command::Search {
            query,
            limit,
            content_length,
            strategy,
            expand,
            context,
            literal,
        } => {
            let (config, store) = session()?;
            if *literal {
                let mut found = store.search_resources(query)?;
                if let Some(limit) = limit {
                    found.truncate(*limit);
                }
                render_resources(&found, format)?;
                return Ok(());
            }

            let n_results = limit.unwrap_or(config.retrieval.n_results);
            let content_length = content_length.unwrap_or(config.retrieval.content_length);
            let mut pipeline = RetrievalPipeline::new(Arc::new(store), &config.retrieval);
            if let Some(strategy) = strategy {
                pipeline = pipeline.with_strategy(*strategy);
            }
            if *expand {
                pipeline = pipeline.with_expander(KeywordExpander);
            }

            let results = pipeline.retrieve(query, n_results, content_length);
            if *context {
                println!("{}", format_context(&results));
            } else {
                render_ranked(&results, format)?;
            }
        }
        Command::Backfill { max_tags } => {
            let (_, store) = session()?;
            let tagger = KeywordTagger::new(*max_tags);
            let pb = indicatif::ProgressBar::new(0);
            pb.set_style(
                indicatif::ProgressStyle::with_template(
                    "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} tagging resources",
                )
                .into_diagnostic()?
                .progress_chars("=> "),
            );

            let report = backfill_tags_with_progress(&store, &tagger, |done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            });
            pb.finish_and_clear();
            let report = report?;

            match format {
                OutputFormat::Json => print_json(&report)?,
                _ => println!(
                    "Tagged {} of {} untagged resources",
                    report.tagged, report.scanned
                ),
            }
        }
        Command::Log { user, assistant } => {
            let (_, store) = session()?;
            let id = store.add_conversation(user, assistant)?;
            match format {
                OutputFormat::Json => print_json(&Created { id })?,
                _ => println!("Logged conversation #{id}"),
            }
        }
        Command::History { limit, all } => {
            let (config, store) = session()?;
            let conversations = if *all {
                store.list_conversations()?
            } else {
                let n = limit.unwrap_or(config.history.recent_conversations);
                let mut recent = store.recent_conversations(n)?;
                recent.reverse();
                recent
            };
            render_conversations(&conversations, format)?;
        }
        Command::Stats => {
            let (config, store) = session()?;
            render_stats(&store.stats()?, &config, format)?;
        }
    }

    Ok(())
}
