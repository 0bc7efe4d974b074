pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "crmlite",
    about = "crmlite operator CLI",
    long_about = "Apply migrations, load demo data, provision sign-in accounts, \
                  and inspect configuration.",
    after_help = "Examples:\n  crmlite migrate\n  crmlite seed\n  \
                  crmlite create-user --username admin\n  crmlite config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load demo customers and follow-ups unless customers already exist")]
    Seed,
    #[command(about = "Create a user that can sign in to the web application")]
    CreateUser {
        #[arg(long, help = "Login name for the new user")]
        username: String,
        #[arg(long, help = "Password; read from CRMLITE_USER_PASSWORD when omitted")]
        password: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::CreateUser { username, password } => {
            commands::create_user::run(&username, password)
        }
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn create_user_accepts_optional_password() {
        let cli = Cli::try_parse_from(["crmlite", "create-user", "--username", "admin"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::CreateUser { ref username, password: None } if username == "admin"
        ));

        let cli = Cli::try_parse_from([
            "crmlite",
            "create-user",
            "--username",
            "admin",
            "--password",
            "s3cret",
        ])
        .expect("parse");
        assert!(matches!(cli.command, Command::CreateUser { password: Some(_), .. }));
    }

    #[test]
    fn create_user_requires_username() {
        assert!(Cli::try_parse_from(["crmlite", "create-user"]).is_err());
    }
}
