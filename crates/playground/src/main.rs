//! A terminal frontend for the conversation session core.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use mime::Mime;
use owo_colors::OwoColorize;
use playground::core::{SessionAlert, SessionBuilder, Snapshot};
use playground::{Capability, CredentialStore, bind_capability};
use playground_openai::OpenAIConfigBuilder;
use playground_processor::{MediaFile, ModelParams, Role};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Changed(Snapshot),
    Alert(SessionAlert),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = CredentialStore::from_default_location();

    let mut capability = Capability::Chat;
    let mut model = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--set-key" => {
                let Some(key) = args.next() else {
                    eprintln!("--set-key requires a value");
                    return;
                };
                let Some(store) = &store else {
                    eprintln!("no configuration directory available");
                    return;
                };
                match store.store(&key) {
                    Ok(()) => println!("key stored"),
                    Err(err) => eprintln!("failed to store the key: {err}"),
                }
                return;
            }
            "--clear-key" => {
                if let Some(store) = &store {
                    if let Err(err) = store.clear() {
                        eprintln!("failed to clear the key: {err}");
                    }
                }
                return;
            }
            "--capability" | "-c" => {
                let Some(name) = args.next() else {
                    eprintln!("--capability requires a value");
                    return;
                };
                let Some(parsed) = Capability::from_name(&name) else {
                    eprintln!(
                        "unknown capability: {name} (expected chat, vision, transcription, or assistant)"
                    );
                    return;
                };
                capability = parsed;
            }
            "--model" | "-m" => {
                model = args.next();
            }
            other => {
                eprintln!("unknown argument: {other}");
                return;
            }
        }
    }

    let api_key = env::var("OPENAI_API_KEY")
        .ok()
        .or_else(|| store.as_ref().and_then(|store| store.load().ok().flatten()));
    let Some(api_key) = api_key else {
        eprintln!("no API key found, set OPENAI_API_KEY or run with --set-key <KEY>");
        return;
    };

    let config = OpenAIConfigBuilder::with_api_key(api_key).build();

    let mut params = ModelParams::default();
    if let Some(model) = model {
        params = params.with_model(model);
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let builder = SessionBuilder::new()
        .with_params(params)
        .on_change({
            let event_tx = event_tx.clone();
            move |snapshot| {
                event_tx.send(SessionEvent::Changed(snapshot)).ok();
            }
        })
        .on_alert({
            let event_tx = event_tx.clone();
            move |alert| {
                event_tx.send(SessionEvent::Alert(alert)).ok();
            }
        });
    let session = bind_capability(builder, capability, config).build();

    println!("{} session, /file <path> stages an attachment", capability.name());

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut has_staged = false;

    'outer: loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                session.clear();
                event_rx.recv().await;
                has_staged = false;
                continue;
            }
            "/send" => {
                // Send the staged attachment without any text. The way
                // to run a transcription.
                if !has_staged {
                    eprintln!("nothing staged, use /file <path> first");
                    continue;
                }
            }
            _ => {}
        }
        if let Some(path) = line.strip_prefix("/file ") {
            let path = path.trim();
            match read_media_file(path) {
                Ok(file) => {
                    session.stage_file(file);
                    event_rx.recv().await;
                    has_staged = true;
                    println!("staged {path}");
                }
                Err(err) => eprintln!("cannot stage {path}: {err}"),
            }
            continue;
        }

        if line != "/send" {
            session.set_input(line);
        }
        session.send();
        has_staged = false;

        let mut printed = 0;
        let mut progress_bar = None;

        loop {
            // Create a new progress bar if it has been finished.
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message("Waiting for the model...");
                    progress_bar
                })
                .inc(1);

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break 'outer;
                    };
                    event
                },
                _ = sleep => {
                    continue;
                }
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = &progress_bar {
                progress_bar.finish_and_clear();
            }
            progress_bar = None;

            match event {
                SessionEvent::Alert(SessionAlert::MicrophoneDenied { reason }) => {
                    eprintln!("microphone unavailable: {reason}");
                }
                SessionEvent::Changed(snapshot) => {
                    print_increment(&snapshot, &mut printed);
                    if !snapshot.in_flight {
                        match snapshot.log.last() {
                            Some(last) if last.is_error => {
                                println!(
                                    "{}{}",
                                    BAR_CHAR.bright_red(),
                                    last.content.bright_red()
                                );
                            }
                            _ => {
                                if printed > 0 {
                                    println!();
                                }
                            }
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Prints the part of the trailing assistant message that has not been
/// printed yet.
fn print_increment(snapshot: &Snapshot, printed: &mut usize) {
    let Some(last) = snapshot.log.last() else {
        return;
    };
    if last.role != Role::Assistant || last.is_error {
        return;
    }
    if last.content.len() > *printed {
        print!("{}", &last.content[*printed..]);
        std::io::stdout().flush().unwrap();
        *printed = last.content.len();
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

fn read_media_file(path: &str) -> std::io::Result<MediaFile> {
    let data = std::fs::read(path)?;
    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned());
    Ok(MediaFile::new(name, media_type_for(path), Bytes::from(data)))
}

fn media_type_for(path: &str) -> Mime {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let raw = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };
    raw.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
