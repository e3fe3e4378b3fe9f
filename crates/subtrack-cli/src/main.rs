//! Subtrack CLI - headless subtitle track editing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use subtrack_lib::core::captions::{AssHeader, ImportOptions, SubtitleModel, SubtitleOutput, WriteOutcome};
use subtrack_lib::core::commands::{Command, CommandExecutor, CutSubtitleCommand, ImportSubtitlesCommand};
use subtrack_lib::core::settings::{SettingsManager, SubtitleSettings};
use subtrack_lib::core::timeline::TimelineRegistry;
use subtrack_lib::core::{Frame, Ratio};

fn main() {
    let cli = Cli::parse();
    let _guard = subtrack_lib::init_logging(cli.log_dir.as_deref(), log_level(cli.verbose));

    if let Err(err) = run(cli) {
        eprintln!("An error occurred: {}", err);
        for cause in err.chain().skip(1) {
            eprintln!("    {}", cause);
        }
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(name = "subtrack-cli", version)]
#[command(about = "Import, edit and export subtitle tracks (SRT, ASS/SSA, WebVTT, SBV)")]
struct Cli {
    /// Project frame rate, overriding the settings file (e.g. 25, 29.97)
    #[arg(long, global = true, value_name = "FPS")]
    fps: Option<f64>,

    /// Settings directory (defaults to the user config directory)
    #[arg(long, global = true, value_name = "DIR")]
    settings: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the subtitles of a file as interchange JSON
    List {
        input: PathBuf,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Convert a subtitle file; the output format follows the output extension
    Convert { input: PathBuf, output: PathBuf },
    /// Shift every subtitle by a number of frames
    Shift {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        frames: Frame,
    },
    /// Split the subtitle displayed at a frame into two
    Cut {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_name = "FRAME")]
        at: Frame,
    },
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Headless editing session: settings, model and command history
struct Session {
    settings: SubtitleSettings,
    model: SubtitleModel,
    executor: CommandExecutor,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let mut settings = match &cli.settings {
            Some(dir) => SettingsManager::new(dir.clone()).load(),
            None => SettingsManager::for_user()
                .map(|manager| manager.load())
                .unwrap_or_default(),
        };
        if let Some(fps) = cli.fps {
            let rate = Ratio::from_fps(fps);
            if !rate.is_valid_rate() {
                bail!("Invalid frame rate: {}", fps);
            }
            settings.frame_rate = rate;
        }
        debug!(fps = settings.frame_rate.as_f64(), "Opening session");

        let mut model = SubtitleModel::with_settings(Arc::new(TimelineRegistry::new()), &settings);
        // Output only goes where the command line says
        model.set_auto_export(false);

        let executor = CommandExecutor::new().with_max_history(settings.history.max_undo);
        Ok(Self {
            settings,
            model,
            executor,
        })
    }

    fn import(&mut self, input: &Path, options: ImportOptions) -> Result<usize> {
        let result = self
            .executor
            .execute(
                Box::new(ImportSubtitlesCommand::from_file(input, options)),
                &mut self.model,
            )
            .with_context(|| format!("Failed to import '{}'", input.display()))?;
        let count = result.created_ids.len();
        info!(count, input = %input.display(), "Imported subtitles");
        Ok(count)
    }

    fn apply(&mut self, command: Box<dyn Command>) -> Result<()> {
        let label = command.label();
        self.executor
            .execute(command, &mut self.model)
            .with_context(|| format!("{} failed", label))?;
        Ok(())
    }

    fn write(&self, output: &Path) -> Result<()> {
        let header = AssHeader::from_frame_size(self.settings.frame_size, &self.settings.style);
        let target = SubtitleOutput::new(output, header)
            .with_context(|| format!("Cannot write '{}'", output.display()))?;
        match target.write(&self.model.to_interchange())? {
            WriteOutcome::Written => {
                info!(output = %output.display(), "Wrote subtitles");
                Ok(())
            }
            WriteOutcome::Detached => Err(anyhow!("There are no subtitles to write.")),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut session = Session::open(&cli)?;

    match &cli.command {
        Commands::List { input, pretty } => {
            session.import(input, ImportOptions::default())?;
            let entries = session.model.to_interchange();
            let json = if *pretty {
                serde_json::to_string_pretty(&entries)?
            } else {
                serde_json::to_string(&entries)?
            };
            println!("{}", json);
        }
        Commands::Convert { input, output } => {
            session.import(input, ImportOptions::default())?;
            session.write(output)?;
        }
        Commands::Shift {
            input,
            output,
            frames,
        } => {
            session.import(input, ImportOptions::with_offset(*frames))?;
            session.write(output)?;
        }
        Commands::Cut { input, output, at } => {
            session.import(input, ImportOptions::default())?;
            session.apply(Box::new(CutSubtitleCommand::new(*at)))?;
            session.write(output)?;
        }
    }

    Ok(())
}
