//! AMP - Entry Point
//!
//! Loads configuration, makes sure a Spotify login is cached, then either
//! runs the command given on the command line or reads commands in a loop.

use amp::command::{Assistant, Dispatcher};
use amp::core::config::AmpConfig;
use amp::core::error::{ErrorKind, Result};
use amp::llm::{Action, Intent, IntentExtractor, LanguageModel, LlmClient};
use amp::streaming::{SpotifyAuth, SpotifyClient, StreamingService};
use amp::ui::{changes_track, FrontEnd, TerminalFrontEnd};

use clap::Parser;
use std::io::{StdinLock, Stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "amp", version)]
#[command(about = "Type what you want to hear, Spotify does it")]
struct Args {
    /// Command to run once, e.g. `amp play some jazz`. Omit for interactive mode.
    command: Vec<String>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Authorize with Spotify, cache the token and exit
    #[arg(long)]
    login: bool,
}

const HELP: &str = "\
Say what you want, for example:
  play some jazz          pause            skip
  volume 40               queue So What    shuffle on
  what's playing          like this song   make a focus playlist
  more like this

Built-ins:
  now / playing / np      show the current track
  help / ?                show this help
  quit / exit / q         leave";

/// Give the player a moment to switch tracks before asking what is playing
const NOW_PLAYING_DELAY: Duration = Duration::from_millis(500);

type Terminal = TerminalFrontEnd<StdinLock<'static>, Stdout>;

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match AmpConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("amp: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config, args.verbose);

    if let Err(problems) = config.validate() {
        eprintln!("amp: configuration incomplete: {}", problems);
        return ExitCode::FAILURE;
    }

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("amp: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never interleave with rendered results, or
/// to `log_file` when one is configured
fn init_tracing(config: &AmpConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("amp={}", level)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if let Some(path) = &config.log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.with_writer(Mutex::new(file)).with_ansi(false).init();
                return;
            }
            Err(e) => eprintln!("amp: cannot open log file {}: {}", path.display(), e),
        }
    }
    builder.with_writer(std::io::stderr).init();
}

fn run(args: Args, config: AmpConfig) -> Result<()> {
    let rt = Runtime::new()?;
    let mut ui = TerminalFrontEnd::stdio();
    let auth = Arc::new(SpotifyAuth::from_config(&config.spotify)?);

    if args.login {
        rt.block_on(login(&auth, &mut ui))?;
        ui.announce(&format!(
            "Logged in. Token cached at {}",
            config.spotify.token_cache.display()
        ))?;
        return Ok(());
    }
    if !rt.block_on(auth.is_authorized()) {
        ui.announce("No cached Spotify login found.")?;
        rt.block_on(login(&auth, &mut ui))?;
    }

    let model: Arc<dyn LanguageModel> = Arc::new(LlmClient::from_config(&config.llm)?);
    let service: Arc<dyn StreamingService> =
        Arc::new(SpotifyClient::new(&config.spotify, Arc::clone(&auth))?);
    let extractor = IntentExtractor::new(model, config.session.context_turns);
    let dispatcher = Dispatcher::from_config(service, &config.session);
    tracing::info!("AMP starting...");

    let mut session = Session {
        rt,
        assistant: Assistant::new(extractor, dispatcher, config.session.history_len),
        auth,
        ui,
    };

    if args.command.is_empty() {
        session.interactive()
    } else {
        session.execute(&args.command.join(" "))
    }
}

async fn login(auth: &SpotifyAuth, ui: &mut Terminal) -> Result<()> {
    auth.authorize_interactive(|message: &str| ui.ask(message))
        .await
}

struct Session {
    rt: Runtime,
    assistant: Assistant,
    auth: Arc<SpotifyAuth>,
    ui: Terminal,
}

impl Session {
    fn interactive(&mut self) -> Result<()> {
        self.ui.announce("\n=== AMP ===\nType what you want to hear. `help` for examples, `quit` to leave.\n")?;

        while let Some(line) = self.ui.read_utterance()? {
            match line.to_lowercase().as_str() {
                "" => continue,
                "quit" | "exit" | "q" => break,
                "help" | "?" => {
                    self.ui.announce(HELP)?;
                    continue;
                }
                "now" | "playing" | "np" => {
                    self.now_playing()?;
                    continue;
                }
                _ => {}
            }
            self.execute(&line)?;
        }

        self.ui.announce("Goodbye!")?;
        Ok(())
    }

    /// Run one command; an authorization failure gets one re-login and replay
    fn execute(&mut self, text: &str) -> Result<()> {
        let failure = self.dispatch(text)?;
        if failure != Some(ErrorKind::Auth) {
            return Ok(());
        }

        self.ui.announce("Spotify login needs to be renewed.")?;
        if let Err(e) = self.rt.block_on(login(&self.auth, &mut self.ui)) {
            tracing::warn!(error = %e, "re-authorization failed");
            self.ui.announce(&format!("Login failed: {}", e))?;
            return Ok(());
        }
        self.dispatch(text).map(|_| ())
    }

    fn dispatch(&mut self, text: &str) -> Result<Option<ErrorKind>> {
        let utterance = self.assistant.utterance(text);
        self.ui.issue(utterance.id());
        let result = self.rt.block_on(self.assistant.handle(utterance));
        self.ui.render(&result)?;
        if result.success && changes_track(text) {
            self.rt.block_on(tokio::time::sleep(NOW_PLAYING_DELAY));
            self.now_playing()?;
        }
        Ok(result.error_kind)
    }

    /// Show the current track without asking the model
    fn now_playing(&mut self) -> Result<()> {
        let utterance = self.assistant.utterance("now playing");
        self.ui.issue(utterance.id());
        let result = self.rt.block_on(
            self.assistant
                .handle_intent(utterance, Intent::new(Action::NowPlaying)),
        );
        self.ui.render(&result)?;
        Ok(())
    }
}
