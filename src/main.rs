mod config;
mod dashboard;
mod db;
mod filter;
mod form;
mod http;
mod loader;
mod logging;
mod models;
mod store;
mod suggestions;
mod tui;
mod validation;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use config::Config;
use db::SqliteStore;
use form::FormValues;
use http::HttpStore;
use loader::SuggestionLoader;
use models::{
    ApplicationFilter, JobApplication, NewApplication, PreviousEntryData, SortDirection,
    SortField, StatusFilter,
};
use std::path::PathBuf;
use std::sync::Arc;
use store::ApplicationStore;
use tracing::{debug, info};
use validation::{DescriptionPolicy, Field};

#[derive(Parser)]
#[command(name = "apptrack")]
#[command(about = "Job application tracker - record, filter, and review where you've applied")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use the REST API at this base URL instead of the local database
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a new application
    Add {
        #[command(flatten)]
        form: FormArgs,
    },

    /// Change an application; only the given fields are replaced
    Edit {
        /// Application ID (or a unique prefix)
        id: String,

        #[command(flatten)]
        form: FormArgs,
    },

    /// Show application details
    Show {
        /// Application ID (or a unique prefix)
        id: String,
    },

    /// List applications
    List {
        /// Case-insensitive text to look for in company, title and description
        #[arg(short, long, default_value = "")]
        search: String,

        /// all, applied, interview, offer, rejected, withdrawn
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// dateApplied, company, jobTitle, status
        #[arg(long, default_value = "dateApplied")]
        sort: SortField,

        /// Ascending order (default is descending)
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        #[arg(long)]
        desc: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete an application
    Delete {
        /// Application ID (or a unique prefix)
        id: String,
    },

    /// Show counts and recent activity
    Dashboard {
        #[arg(long)]
        json: bool,
    },

    /// Show autocomplete suggestions from earlier entries
    Suggest {
        #[arg(value_enum, default_value = "companies")]
        kind: SuggestKind,

        /// Partial input to complete
        query: Option<String>,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Browse applications in a terminal UI
    Browse {
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SuggestKind {
    Companies,
    Titles,
    Sources,
}

/// Form fields accepted by `add` and `edit`.
#[derive(Args, Debug, Default)]
struct FormArgs {
    #[arg(short, long)]
    company: Option<String>,

    /// Job title
    #[arg(short, long)]
    title: Option<String>,

    /// Job description
    #[arg(short, long)]
    description: Option<String>,

    /// Date applied, YYYY-MM-DD (default: today)
    #[arg(long, value_parser = models::parse_date)]
    date: Option<NaiveDate>,

    /// applied, interview, offer, rejected, withdrawn
    #[arg(short, long)]
    status: Option<String>,

    #[arg(short, long)]
    notes: Option<String>,

    /// Store the company as "Anonymous"
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    anonymous: Option<bool>,

    /// Where the job was found (LinkedIn, Recruiter, Job Board, ...)
    #[arg(long)]
    source: Option<String>,

    /// Recruiter name (required when source is Recruiter)
    #[arg(long)]
    recruiter: Option<String>,

    /// Recruiting firm (required when source is Recruiter)
    #[arg(long)]
    firm: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    url: Option<String>,
}

fn overlay(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl FormArgs {
    fn apply(self, values: &mut FormValues) {
        overlay(&mut values.company, self.company);
        overlay(&mut values.job_title, self.title);
        overlay(&mut values.job_description, self.description);
        overlay(&mut values.status, self.status);
        overlay(&mut values.notes, self.notes);
        overlay(&mut values.source, self.source);
        overlay(&mut values.recruiter, self.recruiter);
        overlay(&mut values.recruiting_firm, self.firm);
        overlay(&mut values.contact_email, self.email);
        overlay(&mut values.contact_phone, self.phone);
        overlay(&mut values.application_url, self.url);
        if let Some(date) = self.date {
            values.date_applied = date;
        }
        if let Some(anonymous) = self.anonymous {
            values.is_anonymous = anonymous;
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?.with_env(|key| std::env::var(key).ok());
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    if let Some(url) = &cli.api_url {
        config.api_url = Some(url.clone());
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<Arc<dyn ApplicationStore>> {
    match &config.api_url {
        Some(url) => {
            info!(url = %url, "using applications API");
            Ok(Arc::new(HttpStore::new(url, config.api_timeout())?))
        }
        None => {
            let store = SqliteStore::open(config.database_path())?;
            store.ensure_initialized()?;
            Ok(Arc::new(store))
        }
    }
}

async fn load_previous_entries(store: &dyn ApplicationStore) -> PreviousEntryData {
    let (loader, state) = SuggestionLoader::new();
    let loaded = loader.load(store.suggestions()).await;
    let state = state.borrow();
    debug_assert!(!state.is_loading());
    loaded.unwrap_or_else(|| state.entries().clone())
}

/// Accepts a full id or an unambiguous prefix of one.
async fn resolve_id(store: &dyn ApplicationStore, raw: &str) -> Result<JobApplication> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Application ID must not be empty");
    }
    if let Some(app) = store.get(raw).await? {
        return Ok(app);
    }
    let mut matches: Vec<JobApplication> = store
        .list(&ApplicationFilter::default())
        .await?
        .into_iter()
        .filter(|app| app.id.starts_with(raw))
        .collect();
    match matches.len() {
        0 => bail!("Application {} not found", raw),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}' matches {} applications; use more of the ID", raw, n),
    }
}

fn print_hints(values: &FormValues, entries: &PreviousEntryData) {
    let hint = |label: &str, known: &[String], input: &str| {
        if let Some(suggestion) = suggestions::closest_match(known, input) {
            println!("Hint: {} '{}' - did you mean '{}'?", label, input, suggestion);
        }
    };
    if !values.is_anonymous {
        hint("company", &entries.companies, &values.company);
    }
    hint("title", &entries.job_titles, &values.job_title);
    hint("source", &entries.sources, &values.source);
}

fn submit(values: &FormValues, policy: DescriptionPolicy, today: NaiveDate) -> Result<NewApplication> {
    values.submit(policy, today).map_err(|errors| {
        for error in errors.iter() {
            eprintln!("  {}: {}", error.field, error.message);
        }
        if errors.for_field(Field::Recruiter).is_some() {
            eprintln!("  (pass --recruiter and --firm, or choose another --source)");
        }
        anyhow!("{} problem(s) found, nothing was saved", errors.len())
    })
}

fn print_application(app: &JobApplication) {
    println!("Application {}", app.id);
    println!("Company: {}", app.company);
    println!("Title: {}", app.job_title);
    println!("Status: {}", app.status);
    println!("Applied: {}", app.date_applied);
    if !app.source.is_empty() {
        println!("Source: {}", app.source);
    }
    if let Some(recruiter) = &app.recruiter {
        println!("Recruiter: {}", recruiter);
    }
    if let Some(firm) = &app.recruiting_firm {
        println!("Recruiting firm: {}", firm);
    }
    if let Some(email) = &app.contact_email {
        println!("Email: {}", email);
    }
    if let Some(phone) = &app.contact_phone {
        println!("Phone: {}", phone);
    }
    if let Some(url) = &app.application_url {
        println!("URL: {}", url);
    }
    println!("Created: {}", app.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if !app.job_description.is_empty() {
        println!("\n--- Description ---\n{}", textwrap::fill(&app.job_description, 80));
    }
    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", textwrap::fill(notes, 80));
    }
}

fn print_table(applications: &[JobApplication]) {
    println!(
        "{:<10} {:<10} {:<10} {:<22} {:<28} {:<14}",
        "ID", "DATE", "STATUS", "COMPANY", "TITLE", "SOURCE"
    );
    println!("{}", "-".repeat(99));
    for app in applications {
        println!(
            "{:<10} {:<10} {:<10} {:<22} {:<28} {:<14}",
            truncate(&app.id, 8),
            app.date_applied,
            app.status,
            truncate(&app.company, 20),
            truncate(&app.job_title, 26),
            truncate(&app.source, 14)
        );
    }
}

fn init_database(config: &Config) -> Result<()> {
    if let Some(url) = &config.api_url {
        println!("Using the API at {}; nothing to initialize.", url);
        return Ok(());
    }
    let store = SqliteStore::open(config.database_path())?;
    store.init()?;
    println!("Database initialized at {}", store.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init(config.log_level.as_deref(), cli.verbose)?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Init => init_database(&config),
        command => run(command, open_store(&config)?, &config).await,
    }
}

async fn run(command: Commands, store: Arc<dyn ApplicationStore>, config: &Config) -> Result<()> {
    let today = Local::now().date_naive();

    match command {
        Commands::Init => init_database(config)?,

        Commands::Add { form } => {
            let mut values = FormValues::new(today);
            form.apply(&mut values);
            print_hints(&values, &load_previous_entries(store.as_ref()).await);
            let fields = submit(&values, config.description_policy, today)?;
            let app = store.create(&fields).await?;
            println!("Added application {} ({} - {})", app.id, app.company, app.job_title);
        }

        Commands::Edit { id, form } => {
            let existing = resolve_id(store.as_ref(), &id).await?;
            let mut values = FormValues::from_application(&existing);
            form.apply(&mut values);
            print_hints(&values, &load_previous_entries(store.as_ref()).await);
            let fields = submit(&values, config.description_policy, today)?;
            let app = store.update(&existing.id, &fields).await?;
            println!("Updated application {} ({} - {})", app.id, app.company, app.job_title);
        }

        Commands::Show { id } => {
            let app = resolve_id(store.as_ref(), &id).await?;
            print_application(&app);
        }

        Commands::List {
            search,
            status,
            sort,
            asc,
            desc: _,
            json,
        } => {
            let filter = ApplicationFilter {
                search,
                status,
                sort_by: sort,
                sort_direction: if asc { SortDirection::Asc } else { SortDirection::Desc },
            };
            let applications = store.list(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&applications)?);
            } else if applications.is_empty() {
                println!("No applications found.");
            } else {
                print_table(&applications);
            }
        }

        Commands::Delete { id } => {
            let app = resolve_id(store.as_ref(), &id).await?;
            if store.delete(&app.id).await? {
                println!("Deleted application {} ({})", app.id, app.company);
            } else {
                println!("Application {} not found.", app.id);
            }
        }

        Commands::Dashboard { json } => {
            let applications = store
                .list(&ApplicationFilter::default())
                .await
                .context("Failed to load applications")?;
            let summary = dashboard::summarize(&applications, Utc::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("Total applications: {}", summary.total);
            for status in models::ApplicationStatus::ALL {
                println!("  {:<10} {:>4}", status, summary.count(status));
            }
            println!("Pending (applied + interview): {}", summary.pending);
            println!("This week: {}", summary.this_week);
            println!("Active (last 14 days): {}", summary.active);
            println!("Dormant (30+ days quiet): {}", summary.dormant);
            println!("Never updated: {}", summary.silent);
            if !summary.recent.is_empty() {
                println!("\nMost recent:");
                for app in &summary.recent {
                    println!(
                        "  {} {} - {} [{}]",
                        app.date_applied,
                        truncate(&app.company, 24),
                        truncate(&app.job_title, 30),
                        app.status
                    );
                }
            }
        }

        Commands::Suggest { kind, query, limit } => {
            let entries = load_previous_entries(store.as_ref()).await;
            let values = match kind {
                SuggestKind::Companies => &entries.companies,
                SuggestKind::Titles => &entries.job_titles,
                SuggestKind::Sources => &entries.sources,
            };
            let matches = suggestions::autocomplete(values, query.as_deref().unwrap_or(""), limit);
            if matches.is_empty() {
                println!("No suggestions.");
            }
            for value in matches {
                println!("{}", value);
            }
        }

        Commands::Browse { search, status } => {
            let filter = ApplicationFilter {
                search,
                status,
                ..ApplicationFilter::default()
            };
            tui::run_browse(store, filter).await?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
