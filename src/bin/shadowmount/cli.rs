use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI для ShadowMount: shadow copy -> mount -> copy files -> cleanup
#[derive(Parser, Debug)]
#[command(
    name = "shadowmount",
    version,
    about = "Volume shadow copy sessions for log harvesting",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Use a directory-backed snapshot service rooted here instead of the host service
    #[arg(long, global = true)]
    pub dir_service: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Snapshot the volume of --source, copy matching files to --dest, clean up
    ///
    /// Пример:
    ///   shadowmount extract --source C:\App\Logs --dest D:\Backups\Logs
    ///   shadowmount extract --source C:\App\Logs --dest D:\Backups\Logs --pattern "*.txt"
    Extract {
        /// Directory on the live volume
        #[arg(long)]
        source: PathBuf,
        /// Destination directory (created if missing)
        #[arg(long)]
        dest: PathBuf,
        /// File name glob (default: SHADOWMOUNT_PATTERN or *.log)
        #[arg(long)]
        pattern: Option<String>,
        /// Mount root (default: SHADOWMOUNT_ROOT or built-in)
        #[arg(long)]
        mount_root: Option<PathBuf>,
        /// plain | highlighted | auto
        #[arg(long)]
        log_mode: Option<String>,
        /// With --dir-service: live content of the source volume
        #[arg(long)]
        volume_dir: Option<PathBuf>,
        /// Leave the snapshot mounted (no cleanup); prints the mount point
        #[arg(long, default_value_t = false)]
        keep: bool,
        /// Print process metrics at the end
        #[arg(long, default_value_t = false)]
        metrics: bool,
    },
    /// List all shadow copies on the host
    List {
        /// JSON output (array)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete ALL shadow copies on the host (not only ours)
    DeleteAll {
        /// Required confirmation
        #[arg(long, default_value_t = false)]
        yes: bool,
        /// JSON summary
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Print process metrics at the end
        #[arg(long, default_value_t = false)]
        metrics: bool,
    },
    /// Print effective configuration
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
