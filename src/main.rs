use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use clap::{Parser, Subcommand};
use tracing::warn;

use walktest::{
    achievements::{self, Achievement, Category},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, StorageBackend},
    history::{self, HistorySummary, Period, CHART_POINTS},
    location::{LocationSource, WatchOptions},
    logging::init_logging,
    profile::{FileProfileStore, ProfileStore},
    replay::{replay, ReplayOptions, TrackSource},
    runtime::{FixedTicker, Runner, WalkEvent},
    session::SessionRecord,
    simulate::SimulatedWalker,
    store::{JsonResultStore, ResultStore, SqliteResultStore},
    util::format_clock,
    StoreError, WalkError, WalkSessionTracker,
};

/// 6-minute walk test tracker
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Tracks a timed 6-minute walk test from GPS fixes, stores the distance walked, and reports history and achievements."
)]
pub struct Cli {
    /// directory holding results and profile
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// result storage backend
    #[clap(long, global = true, value_enum)]
    storage: Option<StorageBackend>,

    /// log filter used when RUST_LOG is not set
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// walk a simulated route with a live countdown
    Simulate {
        /// starting latitude
        #[clap(long, default_value_t = 55.6761, allow_negative_numbers = true)]
        latitude: f64,

        /// starting longitude
        #[clap(long, default_value_t = 12.5683, allow_negative_numbers = true)]
        longitude: f64,

        /// walking speed in meters per second
        #[clap(long, default_value_t = 1.4)]
        speed: f64,

        /// real milliseconds per session second (1000 is real time)
        #[clap(long)]
        tick_ms: Option<u64>,
    },

    /// replay a recorded track (csv or json) as a walk test
    Replay {
        /// track file with latitude, longitude and timestamp per fix
        file: PathBuf,

        /// end the session at the last fix instead of after six minutes
        #[clap(long)]
        stop_at_end: bool,
    },

    /// summary and progress of past walk tests
    History {
        #[clap(short, long, value_enum, default_value_t = Period::Week)]
        period: Period,
    },

    /// achievements and progress toward them
    Achievements {
        #[clap(short, long, value_enum)]
        category: Option<Category>,
    },

    /// show or edit the user profile
    Profile {
        #[clap(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show,
    Set {
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        age: Option<String>,
        #[clap(long)]
        gender: Option<String>,
        #[clap(long)]
        height: Option<String>,
        #[clap(long)]
        weight: Option<String>,
        #[clap(long)]
        medical_conditions: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut cfg = config_store.load();
    if let Some(storage) = cli.storage {
        cfg.storage = storage;
    }

    init_logging(cli.log_level.as_deref().unwrap_or(&cfg.log_level));

    let dirs = AppDirs::resolve(cli.data_dir.as_deref().or(cfg.data_dir.as_deref()));

    match cli.command {
        Command::Simulate {
            latitude,
            longitude,
            speed,
            tick_ms,
        } => {
            let tick = tick_ms
                .map(|ms| Duration::from_millis(ms.max(1)))
                .unwrap_or_else(|| cfg.tick_interval());
            let session_secs_per_fix = cfg.sample_interval_ms as f64 / 1000.0;
            let walker = SimulatedWalker::new(latitude, longitude, speed * session_secs_per_fix);
            // Fixes keep pace with the countdown when it runs faster than real time.
            let options = WatchOptions {
                time_interval: tick.mul_f64(session_secs_per_fix),
                ..cfg.watch_options()
            };
            simulate(walker, options, tick, &cfg, &dirs)
        }
        Command::Replay { file, stop_at_end } => {
            let source = TrackSource::from_path(&file)?;
            let store = open_store(&cfg, &dirs)?;
            let before = store.load_all()?;

            let mut tracker =
                WalkSessionTracker::new(source, store).with_watch_options(cfg.watch_options());
            tracker.start()?;
            let outcome = replay(&mut tracker, ReplayOptions { stop_at_end });
            finish(&mut tracker, outcome, &before)
        }
        Command::History { period } => {
            let records = open_store(&cfg, &dirs)?.load_all()?;
            print_history(&records, period);
            Ok(())
        }
        Command::Achievements { category } => {
            let records = open_store(&cfg, &dirs)?.load_all()?;
            let all = achievements::evaluate(&records);
            for achievement in achievements::filter_by_category(&all, category) {
                print_achievement(&achievement);
            }
            Ok(())
        }
        Command::Profile { action } => {
            let store = FileProfileStore::with_path(dirs.profile());
            let mut profile = store.load();
            if let ProfileAction::Set {
                name,
                age,
                gender,
                height,
                weight,
                medical_conditions,
            } = action
            {
                let updates = [
                    (&mut profile.name, name),
                    (&mut profile.age, age),
                    (&mut profile.gender, gender),
                    (&mut profile.height, height),
                    (&mut profile.weight, weight),
                    (&mut profile.medical_conditions, medical_conditions),
                ];
                for (field, value) in updates {
                    if let Some(value) = value {
                        *field = value;
                    }
                }
                store.save(&profile)?;
                println!("Profile saved");
            }

            println!("[{}]", profile.initial());
            for (label, value) in profile.fields() {
                let value = if value.is_empty() { "Not set" } else { value };
                println!("{label:>20}: {value}");
            }
            Ok(())
        }
    }
}

fn open_store(cfg: &Config, dirs: &AppDirs) -> Result<Box<dyn ResultStore>, StoreError> {
    Ok(match cfg.storage {
        StorageBackend::Json => Box::new(JsonResultStore::with_path(dirs.results_json())),
        StorageBackend::Sqlite => Box::new(SqliteResultStore::open(dirs.results_db())?),
    })
}

fn simulate(
    walker: SimulatedWalker,
    options: WatchOptions,
    tick: Duration,
    cfg: &Config,
    dirs: &AppDirs,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(cfg, dirs)?;
    let before = store.load_all()?;

    let mut tracker = WalkSessionTracker::new(walker, store).with_watch_options(options);
    tracker.start()?;

    let mut runner = Runner::new(FixedTicker::new(tick));
    let outcome = runner.run_with(&mut tracker, |event, t| {
        if *event == WalkEvent::Tick {
            print!(
                "\rTime left {}   Distance {:>5} m",
                format_clock(t.seconds_remaining()),
                t.total_distance_meters().round()
            );
            let _ = io::stdout().flush();
        }
    });
    println!();

    finish(&mut tracker, outcome, &before)
}

/// Reports the finished session, retrying a failed save once.
fn finish<L: LocationSource>(
    tracker: &mut WalkSessionTracker<L, Box<dyn ResultStore>>,
    outcome: Result<SessionRecord, WalkError>,
    before: &[SessionRecord],
) -> Result<(), Box<dyn Error>> {
    let record = match outcome {
        Ok(record) => record,
        Err(e @ WalkError::PersistenceWrite { .. }) => {
            warn!(error = %e, "retrying save");
            match tracker.retry_save()? {
                Some(record) => record,
                None => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Test completed! You walked {} meters in {} seconds.",
        record.distance_meters, record.duration_seconds
    );

    let mut after = before.to_vec();
    after.push(record);
    let unlocked = achievements::newly_unlocked(
        &achievements::evaluate(before),
        &achievements::evaluate(&after),
    );
    for achievement in unlocked {
        println!("Achievement unlocked: {}", achievement.title);
    }
    Ok(())
}

fn print_history(records: &[SessionRecord], period: Period) {
    let filtered = history::filter_by_period(records, period, chrono::Utc::now());
    let summary = HistorySummary::from_records(&filtered);

    println!("Period: {period}");
    println!("Tests: {}", summary.count);
    println!("Average Distance: {}m", summary.average_distance);
    println!("Best Distance: {}m", summary.best_distance);

    if records.is_empty() {
        println!("No walk tests recorded yet");
        return;
    }
    if filtered.is_empty() {
        println!("No walk tests in this period");
        return;
    }
    println!("Progress:");
    for (label, distance) in history::chart_series(&filtered, CHART_POINTS) {
        println!("  {label:<7} {distance:>5} m");
    }

    println!("Recent Tests:");
    for record in history::recent(&filtered) {
        let (date, time) = history::date_time_labels(record);
        println!("  {date:<19} {time}  {}m", record.distance_meters);
    }
}

fn print_achievement(achievement: &Achievement) {
    let mark = if achievement.is_unlocked() { "x" } else { " " };
    println!(
        "[{mark}] {:<17} {:>3.0}%  {} ({})",
        achievement.title,
        achievement.progress_percent(),
        achievement.description,
        achievement.category
    );
}
