use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_extract;
mod cmd_list;
mod cmd_delete_all;
mod cmd_status;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug shadowmount list
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        // Логируем цепочку ошибок и выходим с кодом 1.
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let dir_service = cli.dir_service;
    match cli.cmd {
        cli::Cmd::Extract { source, dest, pattern, mount_root, log_mode, volume_dir, keep, metrics } =>
            cmd_extract::exec(cmd_extract::ExtractArgs {
                source,
                dest,
                pattern,
                mount_root,
                log_mode,
                dir_service,
                volume_dir,
                keep,
                metrics,
            }),

        cli::Cmd::List { json } =>
            cmd_list::exec(dir_service, json),

        cli::Cmd::DeleteAll { yes, json, metrics } =>
            cmd_delete_all::exec(dir_service, yes, json, metrics),

        cli::Cmd::Status { json } =>
            cmd_status::exec(json),
    }
}
