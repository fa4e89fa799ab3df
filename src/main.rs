use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use commute_log::record::is_valid_time;
use commute_log::{
    Commute, CommuteStats, CommuteStatus, CommuteStore, Config, NewCommute, PathStore, Period, available_steps,
    average_duration, compute_duration,
};
use eyre::{Context, Result, bail, eyre};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "commute-log")]
#[command(about = "Personal commute log backed by an embedded SQLite store")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the config file, create the database and a default path
    Init,

    /// Log a commute
    Add(CommuteArgs),

    /// Change a logged commute; omitted options keep their current value
    Edit {
        id: i64,
        #[command(flatten)]
        fields: CommuteArgs,
    },

    /// Show one commute
    Show { id: i64 },

    /// List commutes, newest first
    List {
        /// today, week, month or year
        #[arg(long, conflicts_with_all = ["from", "drafts"])]
        period: Option<Period>,

        /// Range start (YYYY-MM-DD), inclusive
        #[arg(long, requires = "to", conflicts_with = "drafts")]
        from: Option<NaiveDate>,

        /// Range end (YYYY-MM-DD), inclusive
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Only drafts
        #[arg(long)]
        drafts: bool,

        /// Only completed commutes
        #[arg(long, conflicts_with = "drafts")]
        completed: bool,
    },

    /// Delete a commute
    Delete { id: i64 },

    /// Trip counts and average duration
    Stats {
        /// today, week, month or year
        #[arg(long)]
        period: Option<Period>,
    },

    /// Write every commute as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add every commute from a JSON export, all or nothing
    Import { file: PathBuf },

    /// Delete every commute
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Manage path configurations
    Paths {
        #[command(subcommand)]
        command: PathCommands,
    },
}

#[derive(Args)]
struct CommuteArgs {
    /// Date (YYYY-MM-DD); new commutes default to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Departure time (HH:MM)
    #[arg(long)]
    departure: Option<String>,

    /// Platform arrival time (HH:MM)
    #[arg(long)]
    platform: Option<String>,

    /// Bus arrival time (HH:MM)
    #[arg(long)]
    bus: Option<String>,

    /// Destination arrival time (HH:MM)
    #[arg(long)]
    destination: Option<String>,

    /// Final arrival time (HH:MM)
    #[arg(long)]
    arrival: Option<String>,

    /// Return trip
    #[arg(long = "return")]
    return_trip: bool,

    /// Outbound trip
    #[arg(long, conflicts_with = "return_trip")]
    outbound: bool,

    #[arg(long)]
    transport: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// Save as a draft; departure and arrival may then be missing
    #[arg(long)]
    draft: bool,

    /// Mark as completed
    #[arg(long, conflicts_with = "draft")]
    complete: bool,

    /// Path id (default: the default path)
    #[arg(long)]
    path: Option<String>,
}

#[derive(Subcommand)]
enum PathCommands {
    /// List paths
    List,

    /// Add a path
    Add {
        name: String,

        #[arg(long, default_value = "🏠→🏢")]
        emoji: String,

        /// Step ids to leave disabled (departure, platform, bus, destination, final)
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
    },

    /// Delete a path
    Delete { id: String },

    /// Make a path the default
    Default { id: String },
}

impl CommuteArgs {
    /// Overlay the given options on `base`, validate, and recompute the duration
    fn apply(self, mut base: NewCommute) -> Result<NewCommute> {
        let times = [
            ("departure", &self.departure),
            ("platform", &self.platform),
            ("bus", &self.bus),
            ("destination", &self.destination),
            ("arrival", &self.arrival),
        ];
        for (label, value) in times {
            if let Some(v) = value {
                if !is_valid_time(v) {
                    bail!("Invalid {} time '{}': expected HH:MM (e.g. 08:30)", label, v);
                }
            }
        }

        if let Some(date) = self.date {
            base.date = date;
        }
        base.departure_time = self.departure.or(base.departure_time);
        base.arrival_platform_time = self.platform.or(base.arrival_platform_time);
        base.arrival_bus_time = self.bus.or(base.arrival_bus_time);
        base.arrival_destination_time = self.destination.or(base.arrival_destination_time);
        base.final_arrival_time = self.arrival.or(base.final_arrival_time);
        base.transport = self.transport.or(base.transport);
        base.notes = self.notes.or(base.notes);
        base.path_id = self.path.or(base.path_id);

        if self.return_trip {
            base.is_outbound = false;
        } else if self.outbound {
            base.is_outbound = true;
        }
        if self.draft {
            base.status = Some(CommuteStatus::Draft);
        } else if self.complete {
            base.status = Some(CommuteStatus::Completed);
        }

        let is_draft = base.status == Some(CommuteStatus::Draft);
        if !is_draft && (base.departure_time.is_none() || base.final_arrival_time.is_none()) {
            bail!("A completed commute needs --departure and --arrival (or save it with --draft)");
        }

        if let (Some(start), Some(end)) = (&base.departure_time, &base.final_arrival_time) {
            base.duration = compute_duration(start, end);
        }
        Ok(base)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_file);
    let mut config = Config::load(&config_path)?;
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }

    match cli.command {
        Commands::Init => init(&config, &config_path),
        Commands::Paths { command } => run_paths(&config, command),
        command => {
            let mut store = CommuteStore::open(&config.database)
                .wrap_err_with(|| format!("Failed to open database {}", config.database.display()))?;
            run(&mut store, &config, command)
        }
    }
}

fn init(config: &Config, config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        config.save(config_path)?;
    }
    let store = CommuteStore::open(&config.database)?;
    let paths = PathStore::open(&config.paths_file)?;
    if paths.load_paths()?.is_empty() {
        paths.save_path("Home → Work", "🏠→🏢", available_steps())?;
    }

    println!("{} {}", "Config:  ".bold(), config_path.display());
    println!("{} {}", "Database:".bold(), config.database.display());
    println!("{} {}", "Paths:   ".bold(), config.paths_file.display());
    println!("Schema version {}", store.schema_version()?);
    Ok(())
}

fn run(store: &mut CommuteStore, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Add(fields) => {
            let mut base = NewCommute::new(Local::now().date_naive());
            if fields.path.is_none() {
                let paths = PathStore::open(&config.paths_file)?;
                base.path_id = paths.default_path()?.map(|p| p.id);
            }
            let commute = fields.apply(base)?;
            let id = store.save(&commute)?;
            println!("{} commute #{}", "Saved".green(), id);
        }
        Commands::Edit { id, fields } => {
            let existing = store.get_by_id(id).ok_or_else(|| eyre!("Commute #{} not found", id))?;
            let commute = fields.apply(existing.to_new())?;
            if store.update(id, &commute)? {
                println!("{} commute #{}", "Updated".green(), id);
            } else {
                bail!("Commute #{} not found", id);
            }
        }
        Commands::Show { id } => {
            let commute = store.get_by_id(id).ok_or_else(|| eyre!("Commute #{} not found", id))?;
            print_details(&commute);
        }
        Commands::List {
            period,
            from,
            to,
            drafts,
            completed,
        } => {
            let today = Local::now().date_naive();
            let mut commutes = if let Some(period) = period {
                store.load_period(period, today)
            } else if let (Some(start), Some(end)) = (from, to) {
                store.load_by_date_range(start, end)
            } else if drafts {
                store.load_drafts()
            } else if completed {
                store.load_completed()
            } else {
                store.load_all()
            };
            if completed {
                commutes.retain(|c| !c.is_draft());
            }
            print_list(&commutes);
        }
        Commands::Delete { id } => {
            store.delete_by_id(id)?;
            println!("{} commute #{}", "Deleted".green(), id);
        }
        Commands::Stats { period } => {
            let (label, stats, commutes) = match period {
                Some(period) => {
                    let commutes = store.load_period(period, Local::now().date_naive());
                    (period.to_string(), CommuteStats::from_commutes(&commutes), commutes)
                }
                None => ("all time".to_string(), store.stats(), store.load_all()),
            };
            println!("{}", format!("Commutes ({})", label).bold());
            println!("  Total trips:   {}", stats.total);
            println!("  Outbound:      {}", stats.outbound);
            println!("  Return:        {}", stats.return_trips);
            println!(
                "  Average time:  {}",
                average_duration(&commutes).unwrap_or_else(|| "-".to_string())
            );
        }
        Commands::Export { output } => {
            let json = store.export_all().ok_or_else(|| eyre!("Export failed, see log for details"))?;
            match output {
                Some(path) => {
                    fs::write(&path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    println!("{} to {}", "Exported".green(), path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let json = fs::read_to_string(&file).wrap_err_with(|| format!("Failed to read {}", file.display()))?;
            let count = store.import_all(&json).wrap_err("Import rolled back")?;
            println!("{} {} commutes", "Imported".green(), count);
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete every commute without --yes");
            }
            let removed = store.clear_all()?;
            println!("{} {} commutes", "Deleted".green(), removed);
        }
        Commands::Init | Commands::Paths { .. } => unreachable!("handled before opening the store"),
    }
    Ok(())
}

fn run_paths(config: &Config, command: PathCommands) -> Result<()> {
    let paths = PathStore::open(&config.paths_file)?;
    match command {
        PathCommands::List => {
            let all = paths.load_paths()?;
            if all.is_empty() {
                println!("No paths configured");
            }
            for path in all {
                let steps: Vec<&str> = path.enabled_steps().map(|s| s.name.as_str()).collect();
                let marker = if path.is_default { "*".green().to_string() } else { " ".to_string() };
                println!("{} {} {} {}", marker, path.id.dimmed(), path.emoji, path.name.bold());
                println!("    {}", steps.join(" → "));
            }
        }
        PathCommands::Add { name, emoji, skip } => {
            let steps = available_steps()
                .into_iter()
                .map(|mut step| {
                    step.enabled = !skip.contains(&step.id);
                    step
                })
                .collect();
            let path = paths.save_path(&name, &emoji, steps)?;
            println!("{} path {}", "Saved".green(), path.id);
        }
        PathCommands::Delete { id } => {
            if !paths.delete_path(&id)? {
                bail!("Path {} not found", id);
            }
            println!("{} path {}", "Deleted".green(), id);
        }
        PathCommands::Default { id } => {
            paths.set_default_path(&id)?;
            println!("{} is now the default path", id);
        }
    }
    Ok(())
}

fn print_list(commutes: &[Commute]) {
    if commutes.is_empty() {
        println!("No commutes");
        return;
    }
    for commute in commutes {
        let direction = if commute.is_outbound {
            "outbound".blue()
        } else {
            "return  ".magenta()
        };
        let draft = if commute.is_draft() {
            " draft".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{:>5}  {}  {}  {} → {}  {}{}",
            format!("#{}", commute.id).dimmed(),
            commute.date.to_string().bold(),
            direction,
            commute.departure_time.as_deref().unwrap_or("--:--"),
            commute.final_arrival_time.as_deref().unwrap_or("--:--"),
            commute.duration.as_deref().unwrap_or("-"),
            draft,
        );
    }
}

fn print_details(commute: &Commute) {
    let field = |label: &str, value: Option<&str>| {
        println!("  {:<22} {}", label, value.unwrap_or("-"));
    };

    println!("{} {}", format!("Commute #{}", commute.id).bold(), commute.status);
    field("Date", Some(&commute.date.to_string()));
    field("Direction", Some(if commute.is_outbound { "outbound" } else { "return" }));
    field("Departure", commute.departure_time.as_deref());
    field("Platform arrival", commute.arrival_platform_time.as_deref());
    field("Bus arrival", commute.arrival_bus_time.as_deref());
    field("Destination arrival", commute.arrival_destination_time.as_deref());
    field("Final arrival", commute.final_arrival_time.as_deref());
    field("Duration", commute.duration.as_deref());
    field("Transport", commute.transport.as_deref());
    field("Notes", commute.notes.as_deref());
    field("Path", commute.path_id.as_deref());
    field("Created", commute.created_at.map(|t| t.to_string()).as_deref());
    field("Updated", commute.updated_at.map(|t| t.to_string()).as_deref());
}
