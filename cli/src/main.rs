mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::commands::{
    MealOptions, RecipeArgs, WorkoutOptions, cmd_day_history, cmd_day_show, cmd_meal_add,
    cmd_meal_delete, cmd_meal_update, cmd_recipe_add, cmd_recipe_categories, cmd_recipe_delete,
    cmd_recipe_list, cmd_recipe_search, cmd_recipe_show, cmd_target_set, cmd_workout_add,
    cmd_workout_delete, cmd_workout_update,
};
use crate::config::Config;
use daybook_core::models::{DEFAULT_PAGE_SIZE, Page};
use daybook_core::service::DaybookService;

#[derive(Parser)]
#[command(
    name = "daybook",
    version,
    about = "A local-first recipe catalog and daily calorie tracker",
    long_about = "Track what goes in (meals) and what goes out (workouts) for each day,\n\
                  keep a searchable recipe catalog, and serve both over a small REST API."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a tracked day or the recent history
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// Manage the daily calorie target
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Log, update and delete meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Log, update and delete workouts
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Manage the recipe catalog
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum DayCommands {
    /// Show meals, workouts and totals for a day (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    /// Set the calorie target for a day
    Set {
        /// Calorie target
        calories: i64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal
    Add {
        /// Meal or recipe name
        name: String,
        #[command(flatten)]
        opts: MealOptions,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a logged meal; options not given keep their current value
    Update {
        /// Meal ID
        meal_id: Uuid,
        /// New meal name
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        opts: MealOptions,
        /// Date the meal was logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a logged meal
    Delete {
        /// Meal ID
        meal_id: Uuid,
        /// Date the meal was logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WorkoutCommands {
    /// Log a workout
    Add {
        /// Workout name
        name: String,
        #[command(flatten)]
        opts: WorkoutOptions,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a logged workout; options not given keep their current value
    Update {
        /// Workout ID
        workout_id: Uuid,
        /// New workout name
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        opts: WorkoutOptions,
        /// Date the workout was logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a logged workout
    Delete {
        /// Workout ID
        workout_id: Uuid,
        /// Date the workout was logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Recipes per page (max 100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    size: u32,
}

impl PageArgs {
    fn to_page(&self) -> Page {
        Page::new(self.page.saturating_sub(1), self.size)
    }
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List recipes by title
    List {
        #[command(flatten)]
        paging: PageArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search recipes, e.g. "title:soup,calories<500"
    Search {
        /// Comma-separated criteria: title:, category:, area:, calories<, calories>
        query: String,
        #[command(flatten)]
        paging: PageArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with ingredients and instructions
    Show {
        /// Recipe ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe to the catalog
    Add {
        #[command(flatten)]
        recipe: RecipeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List distinct recipe categories
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(default_filter);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = DaybookService::new(&config.db_path)?;

    let owner = || config.load_or_create_owner_id();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
        Commands::Day { command } => match command {
            DayCommands::Show { date, json } => cmd_day_show(&svc, owner()?, date, json),
            DayCommands::History { days, json } => cmd_day_history(&svc, owner()?, days, json),
        },
        Commands::Target { command } => match command {
            TargetCommands::Set {
                calories,
                date,
                json,
            } => cmd_target_set(&svc, owner()?, calories, date, json),
        },
        Commands::Meal { command } => match command {
            MealCommands::Add {
                name,
                opts,
                date,
                json,
            } => cmd_meal_add(&svc, owner()?, name, opts, date, json),
            MealCommands::Update {
                meal_id,
                name,
                opts,
                date,
                json,
            } => cmd_meal_update(&svc, owner()?, meal_id, name, opts, date, json),
            MealCommands::Delete {
                meal_id,
                date,
                json,
            } => cmd_meal_delete(&svc, owner()?, meal_id, date, json),
        },
        Commands::Workout { command } => match command {
            WorkoutCommands::Add {
                name,
                opts,
                date,
                json,
            } => cmd_workout_add(&svc, owner()?, name, opts, date, json),
            WorkoutCommands::Update {
                workout_id,
                name,
                opts,
                date,
                json,
            } => cmd_workout_update(&svc, owner()?, workout_id, name, opts, date, json),
            WorkoutCommands::Delete {
                workout_id,
                date,
                json,
            } => cmd_workout_delete(&svc, owner()?, workout_id, date, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::List { paging, json } => cmd_recipe_list(&svc, paging.to_page(), json),
            RecipeCommands::Search {
                query,
                paging,
                json,
            } => cmd_recipe_search(&svc, &query, paging.to_page(), json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
            RecipeCommands::Add { recipe, json } => cmd_recipe_add(&svc, &recipe, json),
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&svc, id, json),
            RecipeCommands::Categories { json } => cmd_recipe_categories(&svc, json),
        },
    }
}
