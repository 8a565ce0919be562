mod cli;
mod db;
mod error;
mod exporter;
mod fmt;
mod importer;
mod ledger;
mod lifecycle;
mod models;
#[cfg(feature = "remote")]
mod remote;
mod screen;
mod settings;
mod table;
mod views;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportCommands, StaffCommands, StagesCommands};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let as_user = cli.as_user.as_deref();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            user,
            backend,
            app_id,
        } => cli::init::run(data_dir, user, backend, app_id),
        Commands::Status => cli::status::run(),
        Commands::Report { command } => match command {
            ReportCommands::List {
                filter,
                page,
                by_date,
            } => cli::report::list(filter, page, by_date),
            ReportCommands::Show { id } => cli::report::show(&id),
            ReportCommands::Add {
                stage,
                quantity,
                date,
                participants,
                note,
                entered_by,
            } => cli::report::add(as_user, stage, quantity, date, participants, note, entered_by),
            ReportCommands::Edit {
                id,
                date,
                stage,
                quantity,
                participants,
                note,
                entered_by,
            } => cli::report::edit(as_user, &id, date, stage, quantity, participants, note, entered_by),
            ReportCommands::Approve { id } => cli::report::approve(as_user, &id),
            ReportCommands::Reject { id } => cli::report::reject(as_user, &id),
            ReportCommands::Unapprove { id } => cli::report::unapprove(as_user, &id),
            ReportCommands::Resubmit { id } => cli::report::resubmit(as_user, &id),
            ReportCommands::Delete { ids, yes } => cli::report::delete(ids, yes),
        },
        Commands::Import {
            file,
            dry_run,
            force,
        } => cli::import::run(as_user, &file, dry_run, force),
        Commands::Export {
            ids,
            filter,
            output,
        } => cli::export::run(ids, filter, output),
        Commands::Template { output } => cli::export::template(output),
        Commands::Dashboard {
            all,
            day,
            month,
            from_date,
            to_date,
        } => cli::dashboard::run(all, day, month, from_date, to_date),
        Commands::Stages { command } => match command {
            StagesCommands::List => cli::stages::list(),
            StagesCommands::Add { name, price, note } => {
                cli::stages::add(&name, &price, note.as_deref())
            }
            StagesCommands::SetPrice { name, price } => cli::stages::set_price(&name, &price),
            StagesCommands::Remove { name } => cli::stages::remove(&name),
        },
        Commands::Staff { command } => match command {
            StaffCommands::List => cli::staff::list(),
            StaffCommands::Add { name, position } => cli::staff::add(&name, position.as_deref()),
            StaffCommands::Remove { name } => cli::staff::remove(&name),
        },
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "shopfloor", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if !e.is_user_facing() {
            tracing::error!("{e:?}");
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
