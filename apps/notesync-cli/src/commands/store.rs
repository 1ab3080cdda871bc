use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use notesync_kernel::Kernel;

#[derive(Args, Clone)]
pub struct StateDirArgs {
    /// Directory holding notesync.sqlite
    #[arg(long, env = "NOTESYNC_STATE_DIR", default_value = "state")]
    pub state_dir: PathBuf,
}

#[derive(Args, Clone)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StateDirArgs,
}

#[derive(Subcommand, Clone)]
pub enum UserCmd {
    /// Create a user
    Add {
        username: String,
        /// Password; falls back to NOTESYNC_PASSWORD env
        #[arg(long, env = "NOTESYNC_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        store: StateDirArgs,
    },
    /// Replace a user's password
    Passwd {
        username: String,
        #[arg(long, env = "NOTESYNC_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        store: StateDirArgs,
    },
    /// List users as JSON
    List {
        #[command(flatten)]
        store: StateDirArgs,
        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,
    },
}

pub fn run_init(args: &InitArgs) -> Result<()> {
    let kernel = Kernel::open(&args.store.state_dir)?;
    println!("Initialized {}", kernel.db_path().display());
    Ok(())
}

pub fn run_user(cmd: UserCmd) -> Result<()> {
    match cmd {
        UserCmd::Add {
            username,
            password,
            store,
        } => {
            let kernel = Kernel::open(&store.state_dir)?;
            let id = kernel.create_user(&username, &password)?;
            println!("Created user {username} (id {id})");
        }
        UserCmd::Passwd {
            username,
            password,
            store,
        } => {
            let kernel = Kernel::open(&store.state_dir)?;
            if !kernel.set_password(&username, &password)? {
                bail!("no such user: {username}");
            }
            println!("Updated password for {username}");
        }
        UserCmd::List { store, pretty } => {
            let kernel = Kernel::open(&store.state_dir)?;
            let users = serde_json::to_value(kernel.list_users()?)?;
            if pretty {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                println!("{users}");
            }
        }
    }
    Ok(())
}
