use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use webnotify_client::api::SettingsUpdate;
use webnotify_client::{
    alerts, AlarmHandle, ApiClient, ApiError, ClientConfig, ConsoleAlert, PollerController,
    PollerSetup, ProfileStore, RingtonePlayer, Session, Watchlist,
};

#[derive(Parser, Debug)]
#[command(
    name = "webnotify",
    version,
    about = "Desktop client for the WebNotify change-monitoring service"
)]
struct Cli {
    /// Server base URL (overrides WN_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
    /// Poll interval in seconds (overrides WN_POLL_SEC)
    #[arg(long)]
    poll_sec: Option<u64>,
    /// Directory holding the local profile file (overrides WN_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = cli.poll_sec {
        config.poll_interval = Duration::from_secs(secs.max(1));
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let api = Arc::new(ApiClient::with_timeout(
        config.base_url.clone(),
        config.request_timeout,
    )?);
    info!("WebNotify client starting, server {}", api.base_url());
    let store = ProfileStore::new(config.profile_path())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let (session, email) = login(&api, &store, &mut lines).await?;
    println!("Logged in as {email}.");

    let alarm = Arc::new(AlarmHandle::new());
    let defaults = alerts::load_alarm_defaults(&api, &session).await;
    if let Some(volume) = defaults.volume {
        if let Err(err) = alarm.set_volume(volume.min(100) as f32 / 100.0) {
            warn!("could not apply volume: {err}");
        }
    }

    let mut watchlist = Watchlist::new();
    if let Err(err) = watchlist.refresh(&api, &session).await {
        warn!("initial url fetch failed: {err}");
    }
    print_entries(&watchlist);

    let mut poller = PollerController::new();
    println!("Type 'help' for commands.");

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "help" => print_help(),
            "list" => {
                if let Err(err) = watchlist.refresh(&api, &session).await {
                    warn!("url fetch failed: {err}");
                }
                print_entries(&watchlist);
            }
            "add" => {
                let Some(url) = parts.next() else {
                    println!("usage: add <url> [css-selector]");
                    continue;
                };
                let selector = parts.collect::<Vec<_>>().join(" ");
                watchlist.set_inputs(url, &selector);
                match watchlist.submit(&api, &session).await {
                    Ok(()) => print_entries(&watchlist),
                    Err(err) => println!("error adding URL: {err}"),
                }
            }
            "rm" => {
                let Some(url) = parts.next() else {
                    println!("usage: rm <url>");
                    continue;
                };
                if let Err(err) = watchlist.remove(&api, &session, url).await {
                    warn!("url fetch failed: {err}");
                }
                print_entries(&watchlist);
            }
            "sound" => {
                let Some(path) = parts.next() else {
                    println!("usage: sound <file>");
                    continue;
                };
                match upload_sound(&api, &session, Path::new(path)).await {
                    Ok(()) => println!("Sound uploaded."),
                    Err(err) => println!("error uploading sound: {err}"),
                }
            }
            "rings" => {
                let Some(value) = parts.next() else {
                    println!("usage: rings <1-5>");
                    continue;
                };
                let Ok(count) = value.parse::<u32>() else {
                    println!("ring count must be a number");
                    continue;
                };
                match api
                    .update_settings(
                        &session,
                        SettingsUpdate {
                            ring_count: count,
                            volume: None,
                            play_loop: None,
                        },
                    )
                    .await
                {
                    // Applies to the running dispatcher from the next cycle.
                    Ok(()) => defaults.set_ring_count(count),
                    Err(err) if err.is_validation() => println!("{err}"),
                    // Fire-and-forget: a failed save gets no feedback.
                    Err(err) => debug!("settings update failed: {err}"),
                }
            }
            "start" => {
                if poller.is_polling() {
                    println!("Monitoring already running.");
                    continue;
                }
                // Response deliberately unchecked; the status flips and
                // polling begins either way.
                if let Err(err) = api.start_monitoring(&session).await {
                    debug!("start_monitoring: {err}");
                }
                let setup = PollerSetup::new(
                    api.clone(),
                    session.clone(),
                    alarm.clone() as Arc<dyn RingtonePlayer>,
                    Arc::new(ConsoleAlert),
                    defaults.clone(),
                )
                .interval(config.poll_interval);
                poller.start(setup)?;
                println!("Monitoring started.");
            }
            "stop" => {
                if poller.is_polling() {
                    alarm.interrupt();
                    poller.stop().await?;
                    println!("Monitoring stopped.");
                } else {
                    println!("Monitoring is not running.");
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command {other:?}, try 'help'"),
        }
    }

    alarm.interrupt();
    poller.stop().await?;
    Ok(())
}

async fn login(
    api: &ApiClient,
    store: &ProfileStore,
    lines: &mut StdinLines,
) -> Result<(Session, String)> {
    loop {
        let remembered = store.email();
        match &remembered {
            Some(email) => print!("Email [{email}]: "),
            None => print!("Email: "),
        }
        flush_stdout();

        let Some(input) = lines.next_line().await? else {
            bail!("stdin closed before login");
        };
        let input = input.trim().to_string();
        let email = if input.is_empty() {
            match remembered {
                Some(email) => email,
                None => continue,
            }
        } else {
            input
        };

        let password = tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: "))
            .await?
            .context("password prompt failed")?;

        match api.login(&email, &password).await {
            Ok(session) => {
                if let Err(err) = store.remember_email(&email) {
                    warn!("could not persist email: {err}");
                }
                return Ok((session, email));
            }
            Err(ApiError::InvalidCredentials) => println!("invalid credentials"),
            Err(err) => println!("login failed: {err}"),
        }
    }
}

async fn upload_sound(api: &ApiClient, session: &Session, path: &Path) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("could not read {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("ringtone");
    api.upload_sound(session, file_name, mime.essence_str(), data)
        .await?;
    Ok(())
}

fn print_entries(watchlist: &Watchlist) {
    if watchlist.entries().is_empty() {
        println!("No watched URLs.");
        return;
    }
    println!("Watched URLs:");
    for entry in watchlist.entries() {
        match &entry.css_selector {
            Some(selector) => println!("  {}  [{}]", entry.url, selector),
            None => println!("  {}", entry.url),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list               refresh and show the watched URLs");
    println!("  add <url> [sel]    watch a URL, optionally scoped to a CSS selector");
    println!("  rm <url>           stop watching a URL");
    println!("  sound <file>       upload an alarm ringtone (mp3/mp4/wav)");
    println!("  rings <1-5>        how many times the alarm repeats");
    println!("  start              start server monitoring and the notification poll");
    println!("  stop               stop the notification poll");
    println!("  quit               exit");
}

fn prompt() {
    print!("> ");
    flush_stdout();
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}
