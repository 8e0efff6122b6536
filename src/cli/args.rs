//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// SalonMoney - VIP investment platform API
#[derive(Parser, Debug)]
#[command(name = "salon-money")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Run database migrations
    Migrate(MigrateArgs),

    /// Manage the payout job queue
    Jobs(JobsArgs),

    /// Operator tasks: bootstrap admins and products
    Admin(AdminArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SERVER_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "SERVER_PORT")]
    pub port: u16,
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub action: MigrateAction,
}

#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset and re-run all migrations
    Fresh,
}

#[derive(Parser, Debug)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub action: JobsAction,
}

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Start the payout worker with its hourly timer
    Work,
    /// Enqueue one payout run (for cron)
    Payout,
    /// List queued jobs by status
    List,
    /// Clear failed jobs
    Clear,
}

#[derive(Parser, Debug)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub action: AdminAction,
}

#[derive(Subcommand, Debug)]
pub enum AdminAction {
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Administrator")]
        name: String,
        /// Read from ADMIN_PASSWORD when omitted
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Insert the default VIP product ladder; existing levels are skipped
    SeedProducts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jobs_payout() {
        let cli = Cli::parse_from(["salon-money", "jobs", "payout"]);
        assert!(matches!(
            cli.command,
            Commands::Jobs(JobsArgs {
                action: JobsAction::Payout
            })
        ));
    }

    #[test]
    fn test_parse_create_admin() {
        let cli = Cli::parse_from([
            "salon-money",
            "-v",
            "admin",
            "create-admin",
            "--email",
            "ops@salon.test",
            "--password",
            "correct-horse",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Admin(AdminArgs {
                action: AdminAction::CreateAdmin { email, name, .. },
            }) => {
                assert_eq!(email, "ops@salon.test");
                assert_eq!(name, "Administrator");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
