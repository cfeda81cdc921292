use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "crewclock", version, about = "Crewclock work-session tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a roster member
    Register {
        /// Platform user id
        #[arg(long)]
        user: String,
        /// Display name
        name: String,
    },
    /// Check in and open a timesheet
    Checkin {
        #[arg(long)]
        user: String,
    },
    /// Check out, resolving any open focus session
    Checkout {
        #[arg(long)]
        user: String,
    },
    /// Focus session control
    Focus {
        #[arg(long)]
        user: String,
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Per-user report over a date range
    Report {
        #[arg(long)]
        user: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// End date (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: String,
    },
    /// List registered members
    Roster,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the sweep scheduler loops until interrupted
    Sweep,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Register { user, name } => commands::session::register(&user, &name),
        Commands::Checkin { user } => commands::session::checkin(&user),
        Commands::Checkout { user } => commands::session::checkout(&user),
        Commands::Focus { user, action } => commands::focus::run(&user, action),
        Commands::Report { user, from, to } => commands::report::run(&user, &from, &to),
        Commands::Roster => commands::report::roster(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Sweep => commands::sweep::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
