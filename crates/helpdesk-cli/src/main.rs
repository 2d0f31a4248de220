#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use helpdesk_core::config;
use output::OutputMode;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "hdesk: helpdesk assignment, record filters and stage automation",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Use this database instead of the one in `.hdesk/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Workspace",
        about = "Initialize a helpdesk workspace",
        long_about = "Write .hdesk/config.toml and create the database in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize, running as user 2 in company 1\n    hdesk init --user 2 --company 1\n\n    # Disable scripted team filters\n    hdesk init --no-scripts"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Workspace",
        about = "Load records from a fixture",
        long_about = "Insert or replace users, companies, stages, teams, projects, tasks, tags and tickets from a TOML fixture.",
        after_help = "EXAMPLES:\n    # Seed the workspace\n    hdesk seed fixture.toml\n\n    # Emit machine-readable output\n    hdesk seed fixture.toml --json"
    )]
    Seed(cmd::seed::SeedArgs),

    #[command(
        next_help_heading = "Tickets",
        about = "Create and show tickets",
        after_help = "EXAMPLES:\n    # Create a ticket; the team's method picks the assignee\n    hdesk ticket create --name \"Printer jam\" --team 1\n\n    # Show it\n    hdesk ticket show 1 --json"
    )]
    Ticket {
        #[command(subcommand)]
        command: cmd::ticket::TicketCommand,
    },

    #[command(
        next_help_heading = "Tickets",
        about = "Preview automatic assignation",
        after_help = "EXAMPLES:\n    # Who would the next ticket of team 1 go to?\n    hdesk assign preview --team 1"
    )]
    Assign {
        #[command(subcommand)]
        command: cmd::assign::AssignCommand,
    },

    #[command(
        next_help_heading = "Filters",
        about = "Show the composed project or task filter",
        long_about = "Compose the company, team and scripted filters for the project or task selector.",
        after_help = "EXAMPLES:\n    # Project filter for an existing ticket\n    hdesk domain project --ticket 4\n\n    # Task filter for a new ticket of team 1, with matching tasks\n    hdesk domain task --team 1 --search"
    )]
    Domain(cmd::domain::DomainArgs),

    #[command(
        next_help_heading = "Teams",
        about = "Check team configuration",
        after_help = "EXAMPLES:\n    # Validate team 1's assignation and scripts\n    hdesk team validate 1"
    )]
    Team {
        #[command(subcommand)]
        command: cmd::team::TeamCommand,
    },

    #[command(
        next_help_heading = "Mail",
        about = "Process inbound mail",
        after_help = "EXAMPLES:\n    # A customer replied on ticket 4\n    hdesk mail inbound --ticket 4 --from customer@example.com"
    )]
    Mail {
        #[command(subcommand)]
        command: cmd::mail::MailCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HDESK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "helpdesk=debug,hdesk=debug,info"
        } else {
            "helpdesk=info,hdesk=info,warn"
        })
    });

    let format = env::var("HDESK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(io::stderr)).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = env::current_dir()?;
    let workspace = cmd::Workspace::load(&root, cli.db.as_deref())?;
    let user_config = config::load_user_config()?;
    let output = OutputMode::from_name(&config::resolve_output(
        cli.json,
        &workspace.config,
        &user_config,
    ));

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &workspace, output),
        Commands::Seed(args) => cmd::seed::run_seed(args, &workspace, output),
        Commands::Ticket { command } => cmd::ticket::run_ticket(command, &workspace, output),
        Commands::Assign { command } => cmd::assign::run_assign(command, &workspace, output),
        Commands::Domain(args) => cmd::domain::run_domain(args, &workspace, output),
        Commands::Team { command } => cmd::team::run_team(command, &workspace, output),
        Commands::Mail { command } => cmd::mail::run_mail(command, &workspace, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::compose::DomainKind;

    #[test]
    fn json_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["hdesk", "--json", "domain", "project", "--team", "1"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Domain(ref a) if a.kind == DomainKind::Project));
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["hdesk", "assign", "preview", "--team", "3", "--json"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Assign {
                command: cmd::assign::AssignCommand::Preview(ref a)
            } if a.team == 3
        ));
    }

    #[test]
    fn db_override_is_global() {
        let cli = Cli::parse_from(["hdesk", "team", "validate", "2", "--db", "/tmp/x.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn unknown_domain_kind_is_rejected() {
        assert!(Cli::try_parse_from(["hdesk", "domain", "partner"]).is_err());
    }

    #[test]
    fn mail_inbound_defaults_empty_headers() {
        let cli = Cli::parse_from(["hdesk", "mail", "inbound", "--ticket", "7"]);
        let Commands::Mail {
            command: cmd::mail::MailCommand::Inbound(args),
        } = cli.command
        else {
            panic!("expected mail inbound");
        };
        assert_eq!(args.ticket, 7);
        assert!(args.subject.is_empty());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
