use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "readtrack-daemon", about = "Samples running PDF viewers and accumulates reading time")]
pub struct DaemonArgs {
    /// Run in the current process instead of detaching into the background.
    #[arg(long, visible_alias = "no-daemon")]
    pub foreground: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
