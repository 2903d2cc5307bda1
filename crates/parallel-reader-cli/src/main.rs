//! Parallel Reader CLI - read a book page by page with a translation under
//! every sentence.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use parallel_reader_core::{
    AppConfig, Backend, Document, GridViewport, Lang, ReaderController, build_scheduler,
    clear_translation_cache,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Rows taken by the status line and the prompt
const CHROME_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendOption {
    Openai,
    Gemini,
}

impl From<BackendOption> for Backend {
    fn from(opt: BackendOption) -> Self {
        match opt {
            BackendOption::Openai => Self::OpenAi,
            BackendOption::Gemini => Self::Gemini,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "parallel-read")]
#[command(author, version, about = "Read a book with sentence-by-sentence translation", long_about = None)]
struct Args {
    /// Book to read: a JSON file or a directory of chapter HTML files
    #[arg(required_unless_present = "clear_cache")]
    input: Option<PathBuf>,

    /// Chapter to start at (0-indexed)
    #[arg(long, default_value_t = 0)]
    chapter: usize,

    /// Language of the book, used for sentence splitting
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language code
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Translation backend
    #[arg(long, value_enum)]
    backend: Option<BackendOption>,

    /// API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// API key for the OpenAI-compatible backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API key for the Gemini backend
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Terminal height in rows
    #[arg(long, default_value_t = 24)]
    rows: usize,

    /// Terminal width in columns
    #[arg(long, default_value_t = 80)]
    columns: usize,

    /// Pages to translate ahead in the background
    #[arg(long)]
    prefetch_window: Option<usize>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable caching
    #[arg(long)]
    no_cache: bool,

    /// Delete the on-disk translation cache and exit
    #[arg(long)]
    clear_cache: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Next,
    Prev,
    Resize { rows: usize, columns: Option<usize> },
    Language(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Command::Next;
    };

    match head {
        "n" | "next" => Command::Next,
        "p" | "prev" => Command::Prev,
        "q" | "quit" => Command::Quit,
        "h" | "help" | "?" => Command::Help,
        "l" | "lang" => parts
            .next()
            .map_or_else(|| Command::Unknown(line.to_string()), |lang| Command::Language(lang.to_string())),
        "r" | "resize" => {
            let rows = parts.next().and_then(|r| r.parse().ok());
            let columns = parts.next().map(str::parse);
            match (rows, columns) {
                (Some(rows), None) => Command::Resize { rows, columns: None },
                (Some(rows), Some(Ok(columns))) => Command::Resize {
                    rows,
                    columns: Some(columns),
                },
                _ => Command::Unknown(line.to_string()),
            }
        }
        _ => Command::Unknown(line.to_string()),
    }
}

const fn grid(columns: usize, rows: usize) -> GridViewport {
    GridViewport::new(columns, rows.saturating_sub(CHROME_ROWS))
}

/// Show a spinner while the foreground page is being translated.
fn spawn_spinner(mut loading: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        while loading.changed().await.is_ok() {
            let is_loading = *loading.borrow_and_update();

            if is_loading && bar.is_none() {
                let pb = ProgressBar::new_spinner();
                // Template is hardcoded and valid, unwrap is safe
                #[allow(clippy::unwrap_used)]
                pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
                pb.set_message("Translating...");
                pb.enable_steady_tick(Duration::from_millis(100));
                bar = Some(pb);
            } else if !is_loading && let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
        }
    })
}

// CLI output is intentional
#[allow(clippy::print_stdout)]
fn print_page(reader: &ReaderController<GridViewport>) {
    let title = reader.document().map_or("", |d| d.title.as_str());

    let Some(position) = reader.position() else {
        println!("{title}: nothing to show");
        return;
    };

    println!(
        "\n== {} | page {}/{}{} | chapter {} | {} ==",
        title,
        position.page + 1,
        position.page_count,
        if position.has_more { "+" } else { "" },
        position.chapter_index.map_or_else(|| "-".to_string(), |c| (c + 1).to_string()),
        reader.target_lang()
    );

    match reader.current_page() {
        Some(page) if !page.sentences.is_empty() => {
            for sentence in &page.sentences {
                println!("{}", sentence.original);
                println!("    {}", sentence.translation);
            }
        }
        _ => println!("(empty)"),
    }
}

#[allow(clippy::print_stdout)]
fn print_help() {
    println!("Commands: n/Enter next, p previous, r <rows> [cols] resize, l <lang> language, q quit");
}

#[allow(clippy::print_stdout)]
fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    if args.clear_cache {
        let removed = clear_translation_cache(config.cache.disk_path.as_deref())
            .context("Failed to clear translation cache")?;
        #[allow(clippy::print_stdout)]
        {
            println!("Removed {removed} cached translations");
        }
        return Ok(());
    }

    // Override config with CLI arguments
    if let Some(source) = &args.source {
        config.source_lang = Lang::new(source);
    }
    if let Some(target) = &args.target {
        config.target_lang = Lang::new(target);
    }
    if let Some(backend) = args.backend {
        config.translator.backend = backend.into();
    }
    if let Some(api_base) = args.api_base {
        config.translator.api_base = api_base;
    }
    if let Some(model) = args.model {
        config.translator.model = model;
    }
    let api_key = match config.translator.backend {
        Backend::OpenAi => args.api_key,
        Backend::Gemini => args.gemini_api_key.or(args.api_key),
    };
    if api_key.is_some() {
        config.translator.api_key = api_key;
    }
    if let Some(window) = args.prefetch_window {
        config.reader.prefetch_window = window;
    }
    if args.no_cache {
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;
    }

    config.validate().context("Invalid configuration")?;

    let Some(input) = args.input else {
        anyhow::bail!("No book given");
    };

    info!("Loading book: {}", input.display());
    let document = Document::from_path(&input)
        .context(format!("Failed to load book: {}", input.display()))?;

    let scheduler = build_scheduler(&config).context("Failed to initialize translator")?;

    let mut reader = ReaderController::new(
        scheduler,
        grid(args.columns, args.rows),
        config.reader.clone(),
        config.source_lang.clone(),
        config.target_lang.clone(),
    );

    let spinner = spawn_spinner(reader.subscribe_loading());

    reader
        .open(Arc::new(document), args.chapter)
        .await
        .context(format!("Failed to open chapter {}", args.chapter))?;

    print_help();
    print_page(&reader);
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        match parse_command(&line) {
            Command::Next => {
                if !reader.navigate_next().await {
                    info!("End of book");
                }
            }
            Command::Prev => {
                if !reader.navigate_prev().await {
                    info!("Start of book");
                }
            }
            Command::Resize { rows, columns } => {
                let columns = columns.unwrap_or(reader.viewport().columns);
                reader.resize(grid(columns, rows)).await;
            }
            Command::Language(lang) => reader.set_language(Lang::new(lang)).await,
            Command::Help => {
                print_help();
                prompt()?;
                continue;
            }
            Command::Quit => break,
            Command::Unknown(input) => {
                tracing::warn!("Unknown command: {}", input);
                print_help();
                prompt()?;
                continue;
            }
        }

        print_page(&reader);
        prompt()?;
    }

    spinner.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), Command::Next);
        assert_eq!(parse_command("n"), Command::Next);
        assert_eq!(parse_command(" p "), Command::Prev);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("l fr"), Command::Language("fr".to_string()));
        assert_eq!(parse_command("r 30"), Command::Resize { rows: 30, columns: None });
        assert_eq!(
            parse_command("r 30 100"),
            Command::Resize {
                rows: 30,
                columns: Some(100)
            }
        );
        assert_eq!(parse_command("r x"), Command::Unknown("r x".to_string()));
        assert_eq!(parse_command("l"), Command::Unknown("l".to_string()));
    }

    #[test]
    fn test_grid_leaves_room_for_chrome() {
        assert_eq!(grid(80, 24), GridViewport::new(80, 21));
        assert_eq!(grid(80, 2), GridViewport::new(80, 0));
    }
}
