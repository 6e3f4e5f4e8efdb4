use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(about = "Control the offline cache controller and inspect its stores")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Install and activate the configured version
    Register,
    /// Purge every cache store
    Unregister,
    /// List cache stores with their entry counts
    Stores,
    /// Show the stored entry for a URL or an entry key hash
    Lookup {
        /// 64-char entry key, absolute URL, or a path resolved against the configured origin
        target: String,
    },
    /// Run one request through a freshly registered controller
    Fetch {
        /// Absolute URL, or a path resolved against the configured origin
        url: String,

        /// Treat the request as a top-level document load
        #[arg(long)]
        navigate: bool,
    },
}
