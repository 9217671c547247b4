use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::error;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use authkeep::auth::read_password;
use authkeep::utils::{format_duration, format_timestamp, initialize_logging};
use authkeep::{Registry, DEFAULT_CONFIG_FILE};

// Define the command-line interface using clap
fn cli() -> Command {
    let name = || Arg::new("name").help("Account name").required(true);
    let password = || {
        Arg::new("password")
            .long("password")
            .value_name("PASSWORD")
            .help("Password (prompted for when omitted)")
    };

    Command::new("authkeep")
        .about("Manage a file-backed credential and session-key registry")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("JSON configuration file")
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Append logs to this file instead of stderr")
                .value_parser(value_parser!(PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("add-user")
                .about("Add a new account")
                .arg(name())
                .arg(password()),
        )
        .subcommand(
            Command::new("delete-user")
                .about("Delete an account")
                .arg(name())
                .arg(
                    Arg::new("revoke")
                        .long("revoke")
                        .help("Also revoke every key the account holds")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Check a password and issue a session key")
                .arg(name())
                .arg(password()),
        )
        .subcommand(
            Command::new("check-key")
                .about("Check that a session key is valid for an account")
                .arg(name())
                .arg(Arg::new("token").help("Session key").required(true))
                .arg(
                    Arg::new("refresh")
                        .long("refresh")
                        .help("Restart the key's lifetime on success")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("cull").about("Remove expired session keys"))
}

// clap enforces required arguments before we get here
fn arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

fn password_from(matches: &ArgMatches) -> io::Result<String> {
    match matches.get_one::<String>("password") {
        Some(password) => Ok(password.clone()),
        None => read_password("Password: "),
    }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let registry = Registry::from_config_file(&config_path)?;

    match matches.subcommand() {
        Some(("add-user", sub)) => {
            let name = arg(sub, "name");
            registry.users().add_user(name, &password_from(sub)?)?;
            println!("User added: {}", name);
        }
        Some(("delete-user", sub)) => {
            let name = arg(sub, "name");
            if sub.get_flag("revoke") {
                let revoked = registry.delete_user_and_revoke(name)?;
                println!("User deleted: {} ({} keys revoked)", name, revoked);
            } else {
                registry.users().delete_user(name)?;
                println!("User deleted: {}", name);
            }
        }
        Some(("login", sub)) => {
            let name = arg(sub, "name");
            let token = registry.verify_and_issue(name, &password_from(sub)?)?;
            println!("{}", token);
            eprintln!(
                "Key valid for {}",
                format_duration(registry.keys().lifetime())
            );
        }
        Some(("check-key", sub)) => {
            let (name, token) = (arg(sub, "name"), arg(sub, "token"));
            if sub.get_flag("refresh") {
                registry.keys().refresh(name, token)?;
            } else {
                registry.keys().verify(name, token)?;
            }
            let until = registry.keys().expires_at(token).unwrap_or_default();
            println!("Key valid until {}", format_timestamp(until));
        }
        Some(("cull", _)) => {
            let culled = registry.keys().cull();
            println!("Culled {} expired keys.", culled);
        }
        _ => unreachable!("subcommand_required is set"),
    }

    registry.flush_dirty()?;
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let log_file = matches.get_one::<PathBuf>("log-file").map(PathBuf::as_path);
    if let Err(e) = initialize_logging(log_file) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authkeep::Config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let matches = cli()
            .try_get_matches_from(["authkeep", "check-key", "alice", "T0K3N", "--refresh"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("config").unwrap(),
            &PathBuf::from(DEFAULT_CONFIG_FILE)
        );
        let (cmd, sub) = matches.subcommand().unwrap();
        assert_eq!(cmd, "check-key");
        assert_eq!(arg(sub, "token"), "T0K3N");
        assert!(sub.get_flag("refresh"));

        assert!(cli().try_get_matches_from(["authkeep"]).is_err());
        assert!(cli().try_get_matches_from(["authkeep", "login"]).is_err());
    }

    #[test]
    fn test_run_add_login_and_check() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("authkeep.json");
        let config = Config {
            hash_cost: 4,
            ..Config::new(dir.path().join("users.csv"), dir.path().join("keys.csv"))
        };
        fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();
        let config_arg = config_path.to_str().unwrap();

        let add = cli()
            .try_get_matches_from(["authkeep", "-c", config_arg, "add-user", "alice", "--password", "secret1"])
            .unwrap();
        run(&add).unwrap();

        let bad = cli()
            .try_get_matches_from(["authkeep", "-c", config_arg, "login", "alice", "--password", "wrong"])
            .unwrap();
        assert!(run(&bad).is_err());

        let login = cli()
            .try_get_matches_from(["authkeep", "-c", config_arg, "login", "alice", "--password", "secret1"])
            .unwrap();
        run(&login).unwrap();

        let registry = Registry::configure(config).unwrap();
        assert_eq!(registry.users().len(), 1);
        assert_eq!(registry.keys().len(), 1);
    }
}
