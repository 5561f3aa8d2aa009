use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use slicegrep::index::{MAX_FILE_SIZE, Mode};
use slicegrep::SearchError;
use slicegrep::output;
use slicegrep::session::{Session, SessionSettings};
use slicegrep::source::{FileSource, LocalFile};
use slicegrep::utils::{
    AppConfig, IndexProgressBar, ProcessMemory, format_bytes, get_config_path,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "slicegrep")]
#[command(about = "Search the lines of one large text file through chunked reads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a file and show its line count
    Index {
        file: PathBuf,

        /// Chunk-size mode (default: chosen from file size)
        #[arg(short, long)]
        mode: Option<Mode>,

        /// No progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Index a file and search it for a substring (case-insensitive)
    Search {
        file: PathBuf,

        term: String,

        /// Chunk-size mode (default: chosen from file size)
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Result page to print, 1-based
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Print the clipboard text instead of the result listing
        #[arg(long)]
        copy: bool,

        /// Write every result to a text file (default name in the current directory)
        #[arg(long, value_name = "PATH")]
        export: Option<Option<PathBuf>>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// No progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show the chunk-size modes and the recommendation for a file
    Modes { file: Option<PathBuf> },
    /// Show the configuration file location and effective values
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load()?;

    match cli.command {
        Commands::Index { file, mode, quiet } => {
            let session = load_session(&file, mode, &config, quiet).await?;
            print_file_info(&session);
        }
        Commands::Search {
            file,
            term,
            mode,
            page,
            json,
            copy,
            export,
            no_color,
            quiet,
        } => {
            let opts = SearchOptions {
                page,
                json,
                copy,
                export,
                color: !no_color,
            };
            let quiet = quiet || json || copy;
            let mut session = load_session(&file, mode, &config, quiet).await?;
            run_search(&mut session, &term, &opts, &config).await?;
        }
        Commands::Modes { file } => {
            show_modes(file.as_deref()).await?;
        }
        Commands::Config => {
            println!("Config file: {}", get_config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Message shown to the user for each failure kind
fn describe(err: &SearchError) -> String {
    match err {
        SearchError::FileTooLarge { .. } => format!(
            "Файл слишком большой. Максимальный размер: {}",
            format_bytes(MAX_FILE_SIZE)
        ),
        SearchError::Cancelled => "Обработка отменена".to_string(),
        SearchError::OutOfMemory { mode, .. } => match mode {
            Mode::Chunk => "Мало памяти! Обработка остановлена".to_string(),
            _ => "Мало памяти! Обработка остановлена, попробуйте режим --mode chunk".to_string(),
        },
        SearchError::NoFileLoaded => "Сначала загрузите файл".to_string(),
        SearchError::EmptySearchTerm => "Введите слово для поиска".to_string(),
        SearchError::Io { .. } => "Ошибка чтения файла".to_string(),
    }
}

fn user_error(err: SearchError) -> anyhow::Error {
    let message = describe(&err);
    anyhow::Error::new(err).context(message)
}

async fn load_session(
    path: &Path,
    mode: Option<Mode>,
    config: &AppConfig,
    quiet: bool,
) -> Result<Session<LocalFile>> {
    let file = LocalFile::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut settings = SessionSettings::from(config);
    if mode.is_some() {
        settings.default_mode = mode;
    }

    let probe = ProcessMemory::from_megabytes(config.memory_limit_mb);
    let mut session = Session::new(settings, Box::new(probe));

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let bar = IndexProgressBar::new(file.size(), !quiet);
    let loaded = session
        .load_with_progress(file, |progress| bar.update(progress))
        .await
        .map(|_| ());
    bar.finish();
    loaded.map_err(user_error)?;

    Ok(session)
}

fn print_file_info(session: &Session<LocalFile>) {
    let (Some(file), Some(index)) = (session.file(), session.index()) else {
        return;
    };

    println!("{}", file.name());
    println!("Размер:  {}", format_bytes(file.size()));
    println!("Строк:   {}", index.total_lines());
    println!("Режим:   {} ({})", session.mode().label(), session.mode());
    if let Some(recommended) = session.recommended_mode() {
        if recommended == session.mode() {
            println!("Рекомендуемый режим: Выбран");
        } else {
            println!("Рекомендуемый режим: {}", recommended);
        }
    }
    println!("Файл \"{}\" успешно загружен!", file.name());
}

struct SearchOptions {
    page: usize,
    json: bool,
    copy: bool,
    export: Option<Option<PathBuf>>,
    color: bool,
}

async fn run_search(
    session: &mut Session<LocalFile>,
    term: &str,
    opts: &SearchOptions,
    config: &AppConfig,
) -> Result<()> {
    let file_name = session
        .file()
        .map(|f| f.name().to_string())
        .unwrap_or_default();
    let term = term.trim().to_string();

    let outcome = session.search(&term).await.map_err(user_error)?;

    if opts.json {
        let stdout = std::io::stdout();
        output::write_json(&mut stdout.lock(), &file_name, &term, outcome)?;
    } else if opts.copy {
        if outcome.results.is_empty() {
            eprintln!("Нет результатов для копирования");
        } else {
            print!(
                "{}",
                output::clipboard_text(&term, &file_name, &outcome.results, config.copy_limit)
            );
        }
    } else {
        output::print_results(outcome, &term, opts.page, config.page_size, opts.color)?;
        println!(
            "Найдено {} совпадений за {}мс",
            outcome.results.len(),
            outcome.elapsed.as_millis()
        );
    }

    if let Some(target) = &opts.export {
        if outcome.results.is_empty() {
            eprintln!("Нет результатов для экспорта");
            return Ok(());
        }
        let now = Local::now();
        let path = match target {
            Some(path) => path.clone(),
            None => PathBuf::from(output::export_file_name(&file_name, now)),
        };
        let text = output::export_text(&term, &file_name, &outcome.results, now);
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Результаты экспортированы: {}", path.display());
    }

    Ok(())
}

async fn show_modes(file: Option<&Path>) -> Result<()> {
    println!("{:8} {:16} {:>10} {:>10}", "Mode", "", "Max size", "Chunk");
    for mode in Mode::ALL {
        println!(
            "{:8} {:16} {:>10} {:>10}",
            mode.name(),
            mode.label(),
            format_bytes(mode.max_file_size()),
            format_bytes(mode.chunk_size())
        );
    }

    if let Some(path) = file {
        let file = LocalFile::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        println!();
        println!("{}: {}", file.name(), format_bytes(file.size()));
        match Mode::recommended(file.size()) {
            Ok(mode) => println!("Рекомендуемый режим: {} ({})", mode.label(), mode),
            Err(e) => println!("{}", describe(&e)),
        }
    }

    Ok(())
}
