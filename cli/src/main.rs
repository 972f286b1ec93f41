use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use tracing::{error, info};

use moodtone::{
    api,
    app::{AppCommand, AppEvent, AppState, MelodyScope},
    audio::{AudioContext, AudioOutput, NullOutput, RodioOutput, WavCapture},
    config::{AppConfig, AudioOutputKind},
    journal::{Journal, JournalEntry},
    melody::{DirectoryTarget, DownloadDispatcher, MelodyService, PlaybackEvent},
    mood::{Mood, Pitch, CATALOG},
    week::{daily_filename, start_of_today, Week},
};

#[derive(Debug, Parser)]
#[command(name = "moodtone", version, about = "Journal your moods and hear them as melodies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the moods that can be recorded and their notes.
    Moods,
    /// Record a mood for today.
    Record { mood: Mood },
    /// Replace all of today's moods with the given ones.
    Set {
        #[arg(required = true, num_args = 1..)]
        moods: Vec<Mood>,
    },
    /// Delete every mood recorded today.
    Clear,
    /// Show today's moods.
    Today,
    /// Show the moods of a week.
    Week {
        /// Weeks relative to the current one (-1 is last week).
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
    /// Play the melody of today's or a week's moods.
    Play {
        #[arg(value_enum)]
        scope: ScopeArg,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
    /// Render a melody to a WAV file in the download directory.
    Download {
        /// Render today's moods instead of the week's.
        #[arg(long)]
        today: bool,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    Today,
    Week,
}

impl From<ScopeArg> for MelodyScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Today => Self::Today,
            ScopeArg::Week => Self::Week,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing()?;
    let cli = Cli::parse();
    info!("starting moodtone CLI");

    let command = match cli.command {
        Command::Moods => {
            print_catalog();
            return Ok(());
        }
        Command::Record { mood } => AppCommand::Record { mood },
        Command::Set { moods } => AppCommand::ReplaceToday { moods },
        Command::Clear => AppCommand::ClearToday,
        Command::Today => AppCommand::ShowToday,
        Command::Week { offset } => AppCommand::ShowWeek { week: Week::current().offset(offset) },
        Command::Play { scope, offset } => {
            AppCommand::Play { scope: scope.into(), week: Week::current().offset(offset) }
        }
        Command::Download { today, offset } => AppCommand::Download {
            scope: if today { MelodyScope::Today } else { MelodyScope::Week },
            week: Week::current().offset(offset),
        },
    };

    let config = AppConfig::load()?;
    let client = api::Client::new(config.api_url())?;

    let (event_tx, mut event_rx) = unbounded_channel();
    let (command_tx, command_rx) = unbounded_channel();

    let controller = Controller::new(client, event_tx, &config);
    controller.spawn(command_rx);
    command_tx.send(command).map_err(|_| anyhow!("controller stopped before accepting command"))?;
    drop(command_tx);

    let mut app_state = AppState::new();
    while let Some(event) = event_rx.recv().await {
        app_state.handle_event(event);
        for line in app_state.drain_status() {
            println!("{line}");
        }
    }

    if app_state.had_error {
        bail!("command failed");
    }
    Ok(())
}

fn print_catalog() {
    for mood in CATALOG {
        println!(
            "{:<10} {:<4} {:<7} {}",
            mood.name(),
            mood.pitch().to_string(),
            mood.color(),
            mood.shape().label()
        );
    }
}

fn setup_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err: Box<dyn std::error::Error + Send + Sync>| {
            anyhow!("failed to initialise tracing: {err}")
        })?;
    Ok(())
}

struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    client: api::Client,
    event_tx: UnboundedSender<AppEvent>,
    melody: MelodyService,
    journal: Mutex<Journal>,
    preview_notes: bool,
}

impl Controller {
    fn new(client: api::Client, event_tx: UnboundedSender<AppEvent>, config: &AppConfig) -> Self {
        let output: Arc<dyn AudioOutput> = match config.audio_output() {
            AudioOutputKind::Device => Arc::new(RodioOutput::new()),
            AudioOutputKind::None => Arc::new(NullOutput),
        };
        let context = Arc::new(AudioContext::new(output, config.sample_rate()));
        let dispatcher =
            DownloadDispatcher::new(Arc::new(DirectoryTarget::new(config.download_dir().clone())));
        let melody = MelodyService::new(context, Arc::new(WavCapture), dispatcher);

        let inner = ControllerInner {
            client,
            event_tx,
            melody,
            journal: Mutex::new(Journal::new(Week::current())),
            preview_notes: config.audio_output() == AudioOutputKind::Device,
        };
        Self { inner: Arc::new(inner) }
    }

    fn spawn(self, mut command_rx: UnboundedReceiver<AppCommand>) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                if let Err(err) = Controller::handle_command(inner.clone(), command).await {
                    error!("command error: {err:#}");
                    let _ = inner.event_tx.send(AppEvent::Error(format!("{err:#}")));
                }
            }
        });
    }

    async fn handle_command(inner: Arc<ControllerInner>, command: AppCommand) -> Result<()> {
        match command {
            AppCommand::Record { mood } => Controller::record(inner, mood).await?,
            AppCommand::ReplaceToday { moods } => Controller::replace_today(inner, moods).await?,
            AppCommand::ClearToday => Controller::clear_today(inner).await?,
            AppCommand::ShowToday => {
                let entries = Controller::load_today(&inner).await?;
                let _ = inner.event_tx.send(AppEvent::TodayLoaded { entries });
            }
            AppCommand::ShowWeek { week } => {
                Controller::load_week(&inner, week).await?;
                let days = inner.journal.lock().await.week_moods().clone();
                let _ = inner.event_tx.send(AppEvent::WeekLoaded { week, days });
            }
            AppCommand::Play { scope, week } => Controller::play(inner, scope, week).await?,
            AppCommand::Download { scope, week } => {
                Controller::download(inner, scope, week).await?
            }
        }
        Ok(())
    }

    async fn load_today(inner: &ControllerInner) -> Result<Vec<JournalEntry>> {
        let records = inner.client.today_moods().await.context("failed to load today's moods")?;
        let mut journal = inner.journal.lock().await;
        journal.set_today(&records);
        Ok(journal.today().to_vec())
    }

    async fn load_week(inner: &ControllerInner, week: Week) -> Result<()> {
        let days = inner.client.week_moods(week).await?;
        inner.journal.lock().await.set_week(week, days);
        Ok(())
    }

    async fn record(inner: Arc<ControllerInner>, mood: Mood) -> Result<()> {
        Controller::load_today(&inner).await?;
        inner.journal.lock().await.ensure_capacity()?;

        let saved =
            inner.client.add_mood(mood).await.with_context(|| format!("failed to record {mood}"))?;
        let entry = JournalEntry::from_record(&saved)
            .with_context(|| format!("journal returned an unusable note for {mood}"))?;
        let pitch = entry.pitch;
        let remaining = {
            let mut journal = inner.journal.lock().await;
            journal.record(entry, Local::now().date_naive())?;
            journal.remaining_today()
        };
        let _ = inner.event_tx.send(AppEvent::MoodRecorded { mood, remaining });

        if inner.preview_notes {
            if let Err(err) = Controller::preview(&inner, pitch).await {
                let _ = inner.event_tx.send(AppEvent::Info(format!("Note preview unavailable: {err:#}")));
            }
        }
        Ok(())
    }

    async fn replace_today(inner: Arc<ControllerInner>, moods: Vec<Mood>) -> Result<()> {
        Journal::ensure_day_fits(moods.len())?;
        let saved = inner
            .client
            .update_day_moods(start_of_today(), &moods)
            .await
            .context("failed to update today's moods")?;
        let entries = {
            let mut journal = inner.journal.lock().await;
            journal.set_today(&saved);
            journal.today().to_vec()
        };
        let _ = inner.event_tx.send(AppEvent::TodayLoaded { entries });
        Ok(())
    }

    async fn clear_today(inner: Arc<ControllerInner>) -> Result<()> {
        Controller::load_today(&inner).await?;
        let ids = inner.journal.lock().await.today_ids();
        let removed = ids.len();
        inner.client.delete_moods(ids).await.context("failed to delete today's moods")?;
        inner.journal.lock().await.set_today(&[]);
        let _ = inner.event_tx.send(AppEvent::TodayCleared { removed });
        Ok(())
    }

    async fn preview(inner: &ControllerInner, pitch: Pitch) -> Result<()> {
        let handle = inner.melody.play(&[pitch]).await?;
        handle.finished().await;
        Ok(())
    }

    async fn pitches(inner: &ControllerInner, scope: MelodyScope, week: Week) -> Result<Vec<Pitch>> {
        match scope {
            MelodyScope::Today => {
                Controller::load_today(inner).await?;
                Ok(inner.journal.lock().await.today_pitches())
            }
            MelodyScope::Week => {
                Controller::load_week(inner, week).await?;
                Ok(inner.journal.lock().await.week_pitches())
            }
        }
    }

    async fn play(inner: Arc<ControllerInner>, scope: MelodyScope, week: Week) -> Result<()> {
        let pitches = Controller::pitches(&inner, scope, week).await?;
        let mut handle = inner
            .melody
            .play(&pitches)
            .await
            .with_context(|| format!("cannot play {} melody", scope.label()))?;
        let _ = inner.event_tx.send(AppEvent::PlaybackStarted { scope, notes: pitches.len() });

        while let Some(event) = handle.next_event().await {
            let app_event = match event {
                PlaybackEvent::NotePlaying { index, pitch } => AppEvent::NotePlaying { index, pitch },
                PlaybackEvent::Finished => AppEvent::PlaybackFinished,
            };
            let _ = inner.event_tx.send(app_event);
        }
        handle.finished().await;
        Ok(())
    }

    async fn download(inner: Arc<ControllerInner>, scope: MelodyScope, week: Week) -> Result<()> {
        let pitches = Controller::pitches(&inner, scope, week).await?;
        let filename = match scope {
            MelodyScope::Today => daily_filename(Local::now().date_naive()),
            MelodyScope::Week => week.download_filename(),
        };
        let _ = inner.event_tx.send(AppEvent::DownloadStarted { filename: filename.clone() });

        let saved = inner
            .melody
            .render_and_download(&pitches, &filename)
            .await
            .with_context(|| format!("cannot download {} melody", scope.label()))?;
        let _ = inner.event_tx.send(AppEvent::DownloadSaved { path: saved.path().to_path_buf() });
        saved.released().await;
        Ok(())
    }
}
