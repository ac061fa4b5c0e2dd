//! Member store command-line entry point.
//!
//! # Responsibility
//! - Expose the four member operations and account transfer over one store.
//! - Print results as JSON; map `NotFound` to exit code 2.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use memberstore_core::{
    core_version, default_log_level, init_logging, init_stderr_logging, Member, MemberStore,
    ProvisioningMode, RepoError, ServiceError, StoreConfig,
};

#[derive(Parser, Debug)]
#[command(name = "memberstore", version, about = "Member record store over SQLite")]
struct Cli {
    /// JSON config file; flags below override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Connection provisioning mode: driver | managed | template
    #[arg(long, global = true)]
    mode: Option<ProvisioningMode>,

    /// Absolute directory for rolling log files (stderr when omitted)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace | debug | info | warn | error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert a new member
    Save { member_id: String, money: i64 },
    /// Look up one member
    Find { member_id: String },
    /// Replace a member's balance (missing ids are ignored)
    Update { member_id: String, money: i64 },
    /// Remove a member (missing ids are ignored)
    Delete { member_id: String },
    /// Move money between two members in one transaction
    Transfer {
        from_id: String,
        to_id: String,
        money: i64,
    },
    /// Print the core version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_not_found(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        println!("{}", serde_json::json!({ "version": core_version() }));
        return Ok(());
    }

    let config = resolve_config(&cli)?;
    start_logging(&config)?;
    debug!(
        "event=cli_start module=cli status=ok mode={} database={}",
        config.mode,
        config.database.display()
    );

    let service = MemberStore::open(&config)
        .with_context(|| format!("failed to open store `{}`", config.database.display()))?
        .into_service();
    let repo = service.repository();

    match cli.command {
        Command::Save { member_id, money } => {
            let saved = repo.save(&Member::new(member_id, money))?;
            print_member(&saved)?;
        }
        Command::Find { member_id } => {
            let member = repo.find_by_id(&member_id)?;
            print_member(&member)?;
        }
        Command::Update { member_id, money } => {
            repo.update(&member_id, money)?;
            println!("{}", serde_json::json!({ "updated": member_id, "money": money }));
        }
        Command::Delete { member_id } => {
            repo.delete(&member_id)?;
            println!("{}", serde_json::json!({ "deleted": member_id }));
        }
        Command::Transfer {
            from_id,
            to_id,
            money,
        } => {
            service.account_transfer(&from_id, &to_id, money)?;
            println!(
                "{}",
                serde_json::json!({ "from": from_id, "to": to_id, "money": money })
            );
        }
        Command::Version => {}
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = Some(level.clone());
    }
    config.validate()?;
    Ok(config)
}

fn start_logging(config: &StoreConfig) -> Result<()> {
    let level = config.log_level.as_deref().unwrap_or("warn");
    let started = match &config.log_dir {
        Some(dir) => {
            let level = config.log_level.as_deref().unwrap_or(default_log_level());
            let dir = dir
                .to_str()
                .context("log directory must be valid UTF-8")?;
            init_logging(level, dir)
        }
        None => init_stderr_logging(level),
    };
    started.map_err(anyhow::Error::msg)
}

fn print_member(member: &Member) -> Result<()> {
    println!("{}", serde_json::to_string(member)?);
    Ok(())
}

fn is_not_found(err: &anyhow::Error) -> bool {
    if let Some(repo_err) = err.downcast_ref::<RepoError>() {
        return repo_err.is_not_found();
    }
    matches!(
        err.downcast_ref::<ServiceError>(),
        Some(ServiceError::Repo(repo_err)) if repo_err.is_not_found()
    )
}

#[cfg(test)]
mod tests {
    use super::{is_not_found, resolve_config, Cli};
    use clap::Parser;
    use memberstore_core::{ProvisioningMode, RepoError, ServiceError};
    use std::path::PathBuf;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "memberstore",
            "--database",
            "/tmp/m.db",
            "--mode",
            "template",
            "find",
            "m1",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/m.db"));
        assert_eq!(config.mode, ProvisioningMode::Template);
    }

    #[test]
    fn unknown_mode_is_rejected_by_the_parser() {
        let parsed = Cli::try_parse_from(["memberstore", "--mode", "pooled", "find", "m1"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn not_found_maps_to_its_own_exit_code() {
        let direct = anyhow::Error::from(RepoError::NotFound("m1".to_string()));
        assert!(is_not_found(&direct));

        let via_service = anyhow::Error::from(ServiceError::Repo(RepoError::NotFound(
            "m2".to_string(),
        )));
        assert!(is_not_found(&via_service));

        let aborted = anyhow::Error::from(ServiceError::TransferAborted {
            member_id: "ex".to_string(),
        });
        assert!(!is_not_found(&aborted));
        assert!(!is_not_found(&anyhow::anyhow!("member not found")));
    }
}
