use anki_voice::audio::{FrameSource, MicSource, WavSource};
use anki_voice::capture::{self, CaptureExit, CaptureWorker, Shutdown};
use anki_voice::config::{Config, RecognizerConfig};
use anki_voice::feedback::{self, FeedbackQueue};
use anki_voice::recognizer;
use anki_voice::ui::{self, Console};
use anki_voice::{AnkiConnect, CommandRouter, CommandTable, ReviewSession};

use clap::Parser;
use flume::Sender;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "anki-voice", version, about = "Voice commands for Anki reviews")]
struct Cli {
    /// JSON file containing command words
    #[arg(short, long, default_value = "commands.json")]
    command_config: PathBuf,

    /// Disable confirmation sounds for attach, pause and unpause
    #[arg(short, long)]
    alert_sound_disabled: bool,

    /// Settings file (config.toml is used when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a recorded WAV file instead of listening to the microphone
    #[arg(short, long, conflicts_with = "typed")]
    input: Option<PathBuf>,

    /// Type commands on stdin instead of speaking them
    #[arg(long)]
    typed: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

enum Intake {
    Microphone,
    Recording(PathBuf),
    Keyboard,
}

/// Intake after its startup checks, ready to move to the capture thread
enum Input {
    Microphone,
    Recording(WavSource),
    Keyboard,
}

impl Intake {
    fn from_cli(cli: &Cli) -> Self {
        match (&cli.input, cli.typed) {
            (_, true) => Intake::Keyboard,
            (Some(path), false) => Intake::Recording(path.clone()),
            (None, false) => Intake::Microphone,
        }
    }
}

#[hotpath::main]
fn main() -> ExitCode {
    let cli = Cli::parse();
    ui::banner();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("anki-voice: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.verbose, &config.logging.file) {
        eprintln!("anki-voice: logging unavailable: {:#}", e);
    }

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, file: &Path) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name: {}", file.display()))?;
    let appender = tracing_appender::rolling::never(dir, name);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender),
        )
        .try_init()?;
    Ok(())
}

fn run(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    let intake = Intake::from_cli(&cli);
    let table = Arc::new(CommandTable::load(&cli.command_config)?);
    let audio = config.audio;
    let recognizer_config = config.recognizer;

    // Configuration errors end the process before any thread starts
    let input = match intake {
        Intake::Keyboard => Input::Keyboard,
        Intake::Recording(path) => {
            recognizer::check_model(&recognizer_config)?;
            Input::Recording(WavSource::open(&path, audio.sample_rate, audio.frame_samples)?)
        }
        Intake::Microphone => {
            recognizer::check_model(&recognizer_config)?;
            Input::Microphone
        }
    };

    let mut feedback_config = config.feedback;
    if cli.alert_sound_disabled {
        feedback_config.enabled = false;
    }
    let (feedback, feedback_rx) = FeedbackQueue::channel(feedback_config.enabled);

    let console = Console::stdout();
    let api = AnkiConnect::new(&config.anki)?;
    let session = ReviewSession::new(api, feedback.clone(), console.clone(), config.anki.deck.clone());
    let router = CommandRouter::new(table, session, feedback, console);

    ctrlc::set_handler(|| {
        ui::interrupted();
        std::process::exit(0);
    })?;

    feedback::spawn_worker(feedback_config, feedback_rx)?;

    let replaying = !matches!(input, Input::Microphone);
    let (ready_tx, ready_rx) = flume::bounded::<anyhow::Result<()>>(1);

    let capture = thread::Builder::new()
        .name("capture".into())
        .spawn(move || match input {
            Input::Keyboard => {
                let _ = ready_tx.send(Ok(()));
                let mut router = router;
                capture::run_typed(&mut router, std::io::stdin().lock())
            }
            Input::Recording(source) => voice_intake(
                move || Ok(source),
                &recognizer_config,
                audio.sample_rate,
                router,
                ready_tx,
            ),
            Input::Microphone => voice_intake(
                || MicSource::open(audio.sample_rate, audio.frame_samples),
                &recognizer_config,
                audio.sample_rate,
                router,
                ready_tx,
            ),
        })?;

    // Engine load and device open happen on the capture thread
    ready_rx
        .recv()
        .map_err(|_| anyhow::anyhow!("capture thread exited during startup"))??;
    ui::started();

    let exit = capture.join().unwrap_or_else(|_| {
        error!("capture thread panicked");
        CaptureExit::DeviceError
    });

    match exit.shutdown(replaying) {
        Shutdown::Immediate => std::process::exit(0),
        Shutdown::Finished => {
            info!("input finished");
            Ok(ExitCode::SUCCESS)
        }
        Shutdown::Failed => {
            error!("audio capture stopped; no further commands can be received");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn voice_intake<S: FrameSource>(
    open: impl FnOnce() -> anyhow::Result<S>,
    recognizer_config: &RecognizerConfig,
    sample_rate: u32,
    router: CommandRouter<AnkiConnect>,
    ready: Sender<anyhow::Result<()>>,
) -> CaptureExit {
    let started = recognizer::create_recognizer(recognizer_config, sample_rate)
        .and_then(|recognizer| Ok((open()?, recognizer)));

    match started {
        Ok((source, recognizer)) => {
            let _ = ready.send(Ok(()));
            CaptureWorker::new(source, recognizer, router).run()
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            CaptureExit::DeviceError
        }
    }
}
