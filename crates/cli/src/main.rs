use clap::{Parser, Subcommand};
use lib::context::AppContext;
use lib::session::{ChatSession, ChatSnapshot, ValidationError};
use lib::setup::SetupFlow;
use lib::types::{
    self, FileStatus, Message, Notice, NoticeLevel, Sender, UploadKind, BOT_NAME, BOT_TAGLINE,
    QUICK_REPLIES,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "handset")]
#[command(about = "Handset CLI: chat with the Smartphone Assistant backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, local store).
    Init {
        /// Config file path (default: HANDSET_CONFIG_PATH or ~/.handset/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Probe the backend health endpoint and report whether chat runs live or in development mode.
    Health {
        /// Config file path (default: HANDSET_CONFIG_PATH or ~/.handset/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Configure the API key and the required files (CSV data, privacy policy, terms).
    Setup {
        /// Config file path (default: HANDSET_CONFIG_PATH or ~/.handset/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[command(subcommand)]
        action: Option<SetupAction>,
    },

    /// Chat with the assistant (interactive).
    Chat {
        /// Config file path (default: HANDSET_CONFIG_PATH or ~/.handset/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SetupAction {
    /// Show API key and upload status (default).
    Status,

    /// Save the API key.
    ApiKey { key: String },

    /// Remove the saved API key.
    ClearApiKey,

    /// Upload a required file: csv (.csv), privacy or terms (.txt/.pdf).
    Upload { kind: UploadKind, path: PathBuf },

    /// Load the CSV data from a URL instead of a file.
    CsvUrl { url: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("handset {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Health { config }) => {
            if let Err(e) = run_health(config).await {
                log::error!("health check failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Setup { config, action }) => {
            if let Err(e) = run_setup(config, action.unwrap_or(SetupAction::Status)).await {
                log::error!("setup failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_health(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    let url = lib::config::resolve_backend_url(&ctx.config);
    if ctx.gateway.probe_health().await {
        println!("backend {}: available", url);
    } else {
        println!("backend {}: unavailable (development mode with mock data)", url);
    }
    Ok(())
}

fn print_notices(rx: &mut mpsc::UnboundedReceiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        match notice.level {
            NoticeLevel::Info => eprintln!("[info] {}", notice),
            NoticeLevel::Error => eprintln!("[error] {}", notice),
        }
    }
}

fn print_status(status: FileStatus, credential_saved: bool) {
    println!(
        "API key: {}",
        if credential_saved { "saved" } else { "not saved" }
    );
    for kind in UploadKind::ALL {
        println!(
            "{}: {}",
            kind.label(),
            if status.get(kind) { "uploaded" } else { "missing" }
        );
    }
    if status.all_uploaded() {
        println!("All files uploaded");
    } else {
        println!("Missing required files");
    }
    if types::setup_complete(&status, credential_saved) {
        println!("Setup complete. Run `handset chat` to start chatting.");
    }
}

async fn run_setup(config_path: Option<PathBuf>, action: SetupAction) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut setup = ctx.setup_flow(tx);
    setup.load().await;

    let result = match action {
        SetupAction::Status => Ok(()),
        SetupAction::ApiKey { key } => setup.save_api_key(&key).await,
        SetupAction::ClearApiKey => setup.clear_api_key().await,
        SetupAction::Upload { kind, path } => setup.upload_path(&path, kind).await.map(|_| ()),
        SetupAction::CsvUrl { url } => setup.set_csv_url(&url).await.map(|_| ()),
    };
    print_notices(&mut rx);
    result?;
    print_status(setup.status(), setup.credential_saved());
    Ok(())
}

fn render(message: &Message) {
    let time = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M");
    match message.sender {
        Sender::User => println!("[{}] you: {}", time, message.content),
        Sender::Bot => println!("[{}] {}: {}", time, BOT_NAME, message.content.trim()),
    }
}

const CHAT_HELP: &str = "\
Commands:
  /quick              list suggested replies
  /quick N            send suggested reply N
  /history            reload the conversation from the backend
  /status             refresh and show setup status
  /key KEY            save the API key
  /clear-key          remove the API key
  /upload KIND PATH   upload csv, privacy or terms file
  /csv-url URL        load CSV data from a URL
  /exit, /quit        leave";

/// Send one message, announcing the typing indicator if the reply takes a moment.
async fn send_with_indicator(session: &ChatSession, text: &str) {
    let send = session.send_message(text);
    tokio::pin!(send);
    let mut announced = false;
    let result = loop {
        tokio::select! {
            r = &mut send => break r,
            _ = tokio::time::sleep(Duration::from_millis(300)), if !announced => {
                if session.is_typing() {
                    eprintln!("{} is typing...", BOT_NAME);
                    announced = true;
                }
            }
        }
    };
    match result {
        Ok(()) | Err(ValidationError::EmptyMessage) => {}
        Err(e) => log::debug!("message not sent: {}", e),
    }
}

/// Handle a setup command typed inside chat. The setup flow pushes its status into the session.
async fn chat_setup_command(setup: &mut SetupFlow, command: &str, arg: &str) -> bool {
    let result = match command {
        "/key" => setup.save_api_key(arg).await,
        "/clear-key" => setup.clear_api_key().await,
        "/csv-url" => setup.set_csv_url(arg).await.map(|_| ()),
        "/upload" => {
            let (kind, path) = arg.split_once(' ').unwrap_or((arg, ""));
            match kind.parse::<UploadKind>() {
                Ok(kind) if !path.trim().is_empty() => setup
                    .upload_path(&PathBuf::from(path.trim()), kind)
                    .await
                    .map(|_| ()),
                Ok(_) => {
                    eprintln!("usage: /upload KIND PATH");
                    return true;
                }
                Err(e) => {
                    eprintln!("{}", e);
                    return true;
                }
            }
        }
        _ => return false,
    };
    if let Err(e) = result {
        log::debug!("setup command failed: {}", e);
    }
    true
}

/// Welcome screen text, shown until the user starts chatting or sends a first message.
fn welcome_screen(snap: &ChatSnapshot) -> Option<String> {
    if !snap.show_welcome {
        return None;
    }
    let mut text = format!("Welcome to {}\n{}\n\nTry asking:\n", BOT_NAME, BOT_TAGLINE);
    for (i, reply) in QUICK_REPLIES.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", i + 1, reply));
    }
    text.push_str("Press Enter to start chatting, or type a message. /help lists commands.");
    Some(text)
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let ctx = AppContext::load(config_path)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Arc::new(ctx.chat_session(tx.clone()));
    let mut setup = ctx.setup_flow(tx).with_session(session.clone());

    session.activate().await;
    setup.load().await;
    print_notices(&mut rx);

    let snap = session.snapshot().await;
    if let Some(text) = welcome_screen(&snap) {
        println!("{}", text);
    }
    if !snap.setup_complete() && snap.messages.len() <= 1 {
        println!();
        println!("Setup required");
        println!("Please run `handset setup` (or /key, /upload, /csv-url here) to upload required files and save your API key.");
        println!();
    }
    for m in &snap.messages {
        render(m);
    }
    let mut shown = snap.messages.len();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            if session.snapshot().await.show_welcome {
                session.start_chat().await;
            }
            continue;
        }
        let (command, arg) = input.split_once(' ').unwrap_or((input, ""));
        let arg = arg.trim();

        match command {
            c if c.eq_ignore_ascii_case("/exit") || c.eq_ignore_ascii_case("/quit") => break,
            "/help" => println!("{}", CHAT_HELP),
            "/quick" if arg.is_empty() => {
                for (i, reply) in QUICK_REPLIES.iter().enumerate() {
                    println!("  {}. {}", i + 1, reply);
                }
            }
            "/quick" => match arg.parse::<usize>() {
                Ok(n) if (1..=QUICK_REPLIES.len()).contains(&n) => {
                    send_with_indicator(&session, QUICK_REPLIES[n - 1]).await;
                }
                _ => eprintln!("choose a reply between 1 and {}", QUICK_REPLIES.len()),
            },
            "/history" => {
                session.refresh_history().await;
                shown = 0;
            }
            "/status" => {
                let status = setup.load().await;
                print_status(status, setup.credential_saved());
            }
            _ => {
                if !chat_setup_command(&mut setup, command, arg).await {
                    if command.starts_with('/') {
                        eprintln!("unknown command {}; try /help", command);
                    } else {
                        send_with_indicator(&session, input).await;
                    }
                }
            }
        }

        print_notices(&mut rx);
        let messages = session.messages().await;
        for m in messages.iter().skip(shown) {
            render(m);
        }
        shown = messages.len();
    }

    Ok(())
}
