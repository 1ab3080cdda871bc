use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{ClientArgs, InitArgs, PingArgs, PullArgs, PushArgs, UserCmd};

#[derive(Parser)]
#[command(name = "notesync-cli", version, about = "notesync administration and sync client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the state directory and database schema
    Init(InitArgs),
    /// Manage user accounts in the local database
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },
    /// Check that a server answers /healthz
    Ping(PingArgs),
    /// Push a batch file to a server
    Push {
        #[command(flatten)]
        client: ClientArgs,
        #[command(flatten)]
        args: PushArgs,
    },
    /// Pull notes and contents from a server
    Pull {
        #[command(flatten)]
        client: ClientArgs,
        #[command(flatten)]
        args: PullArgs,
    },
}

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init(args) => commands::store::run_init(&args),
        Commands::User { cmd } => commands::store::run_user(cmd),
        Commands::Ping(args) => commands::client::run_ping(&args),
        Commands::Push { client, args } => commands::client::run_push(&client, &args),
        Commands::Pull { client, args } => commands::client::run_pull(&client, &args),
    };
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
