use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use vitaltrack::config::Config;
use vitaltrack::startup;

#[derive(Debug, Parser)]
#[command(name = "vitaltrack", about = "Workout and meal tracker server")]
struct Opt {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the API and the web client (default)
    Serve {
        /// Apply pending migrations before accepting traffic
        #[arg(long)]
        migrate: bool,
    },
    /// Apply the database schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let opt = Opt::parse();
    let config = Config::from_env()?;
    startup::init_logging(config.log_format)?;

    match opt.command.unwrap_or(Command::Serve { migrate: false }) {
        Command::Serve { migrate } => startup::serve(config, migrate).await,
        Command::Migrate => startup::migrate(&config).await,
    }
}
