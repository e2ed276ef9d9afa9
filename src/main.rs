use std::env;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use palaver::api;
use palaver::auth::{AuthConfig, AuthState};
use palaver::db::Database;
use palaver::freshness::Watermark;
use palaver::message::{MessageRepository, MessageService, MessageWithAuthor};
use palaver::poller::{ChatClient, ClientError, MessageView, Poller, PollerConfig};
use palaver::user::{RegistrationDraftRepository, UserRepository, UserService};

const APP_NAME: &str = "palaver";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

#[tokio::main]
async fn async_watch(ctx: RuntimeContext, cmd: WatchCommand) -> Result<()> {
    handle_watch(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => async_serve(ctx, cmd),
        Command::Watch(cmd) => async_watch(ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Palaver - chatroom server and polling client.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON logs
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the chatroom server
    Serve(ServeCommand),
    /// Follow a chatroom from the terminal via the polling client
    Watch(WatchCommand),
    /// Inspect or initialize the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Override the database file path
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct WatchCommand {
    /// Base URL of the server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,
    /// Username to log in with
    #[arg(long)]
    username: String,
    /// Password to log in with (falls back to $PALAVER_PASSWORD)
    #[arg(long, env = "PALAVER_PASSWORD", hide_env_values = true)]
    password: String,
    /// Override the poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the resolved configuration
    Show,
    /// Print the config file path
    Path,
    /// Write the default config file if it does not exist
    Init,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    server: ServerConfig,
    database: DatabaseConfig,
    auth: AuthConfig,
    registration: RegistrationConfig,
    poll: PollConfig,
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct DatabaseConfig {
    /// Database file path; defaults to `<data dir>/chat.db`.
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RegistrationConfig {
    /// Minutes a staged registration draft stays valid.
    draft_ttl_minutes: i64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            draft_ttl_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PollConfig {
    /// Interval between client poll cycles in milliseconds.
    interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Runtime context
// ============================================================================

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    fn discover(config_override: Option<PathBuf>) -> Result<Self> {
        let config_file = match config_override {
            Some(path) => expand_path(path)?,
            None => default_config_dir()?.join("config.toml"),
        };

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
        })
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}",
            self.config_file.display(),
            self.data_dir.display()
        )
    }
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let config = load_or_init_config(&paths)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        // Determine filter level
        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("palaver={level},tower_http={level}")));

        // Use JSON output if --json flag is set, otherwise pretty format
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(!disable_color))
                .try_init()
                .ok();
        }

        // Also init env_logger for compatibility with log crate users
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => match self.config.logging.level.as_str() {
                    "error" => LevelFilter::Error,
                    "warn" => LevelFilter::Warn,
                    "debug" => LevelFilter::Debug,
                    "trace" => LevelFilter::Trace,
                    _ => LevelFilter::Info,
                },
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn database_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_override {
            return expand_path(path.to_path_buf());
        }
        if let Some(ref configured) = self.config.database.path {
            return expand_str_path(configured);
        }
        Ok(self.paths.data_dir.join("chat.db"))
    }
}

// ============================================================================
// serve
// ============================================================================

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting chatroom server...");

    // Initialize database
    let db_path = ctx.database_path(cmd.database.as_deref())?;
    info!("Database path: {}", db_path.display());
    let database = Database::new(&db_path).await?;

    // Initialize authentication from config
    let auth_config = ctx.config.auth.clone();
    auth_config
        .validate()
        .context("Invalid auth configuration")?;
    info!(
        "Auth mode: {}",
        if auth_config.dev_mode {
            "development"
        } else {
            "production"
        }
    );
    let auth_state = AuthState::new(auth_config);

    // The watermark starts at process start: every client cursor from a
    // previous process observes "updates available" once and refetches.
    let watermark = Arc::new(Watermark::new());

    // Initialize services
    let user_service = UserService::new(UserRepository::new(database.pool().clone()));
    let message_service = MessageService::new(
        MessageRepository::new(database.pool().clone()),
        Arc::clone(&watermark),
    );
    let draft_repo = RegistrationDraftRepository::new(
        database.pool().clone(),
        chrono::Duration::minutes(ctx.config.registration.draft_ttl_minutes),
    );

    // Create app state and router
    let state = api::AppState::new(
        user_service,
        message_service,
        draft_repo,
        auth_state,
        watermark,
    );
    let app = api::create_router(state);

    // Bind and serve; CLI flags override config
    let host = if cmd.host != "127.0.0.1" {
        cmd.host.clone()
    } else {
        ctx.config.server.host.clone()
    };
    let port = if cmd.port != 8080 {
        cmd.port
    } else {
        ctx.config.server.port
    };

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// ============================================================================
// watch
// ============================================================================

/// Terminal view for the watch command: prints each snapshot of the room.
struct StdoutView {
    done: tokio::sync::Notify,
}

impl MessageView for StdoutView {
    fn replace_all(&self, messages: Vec<MessageWithAuthor>) {
        let mut out = io::stdout().lock();
        if messages.is_empty() {
            let _ = writeln!(out, "-- no messages found --");
            return;
        }
        let _ = writeln!(out, "-- {} message(s) --", messages.len());
        for message in &messages {
            let _ = writeln!(
                out,
                "[{}] {}: {}",
                message.created_at, message.author_name, message.body
            );
        }
    }

    fn transient_error(&self, context: &str, error: &ClientError) {
        warn!("Transient failure while {context}: {error}");
    }

    fn session_expired(&self) {
        warn!("Session expired; leaving the chatroom");
        self.done.notify_one();
    }
}

async fn handle_watch(ctx: &RuntimeContext, cmd: WatchCommand) -> Result<()> {
    let client = ChatClient::login(&cmd.server, &cmd.username, &cmd.password)
        .await
        .map_err(|e| anyhow!("login failed: {e}"))?;

    let interval_ms = cmd.interval_ms.unwrap_or(ctx.config.poll.interval_ms);
    info!(
        "Watching {} as {} (poll interval {} ms)",
        cmd.server, cmd.username, interval_ms
    );

    let view = Arc::new(StdoutView {
        done: tokio::sync::Notify::new(),
    });

    let mut poller = Poller::new(
        client,
        view.clone(),
        PollerConfig {
            interval: std::time::Duration::from_millis(interval_ms),
        },
    );
    poller.start();

    tokio::select! {
        _ = view.done.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping poller");
        }
    }

    poller.stop().await;
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(&ctx.config).context("serializing configuration")?;
            print!("{rendered}");
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Init => {
            if ctx.paths.config_file.exists() {
                info!(
                    "Config file already exists at {}",
                    ctx.paths.config_file.display()
                );
            } else {
                write_default_config(&ctx.paths.config_file)?;
                info!("Wrote default config to {}", ctx.paths.config_file.display());
            }
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn load_or_init_config(paths: &AppPaths) -> Result<AppConfig> {
    if !paths.config_file.exists() {
        write_default_config(&paths.config_file)?;
    }

    let built = Config::builder()
        .add_source(
            File::from(paths.config_file.as_path())
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
        .build()?;

    let mut config: AppConfig = built.try_deserialize()?;

    if let Some(ref path) = config.database.path {
        let expanded = expand_str_path(path)?;
        config.database.path = Some(expanded.display().to_string());
    }

    Ok(config)
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path)?;
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> Result<String> {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push('\n');
    Ok(buffer)
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::data_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
