// This runs daemon on windows without creating a console. Disable during development to see
// stdout.
#![windows_subsystem = "windows"]

use std::{env::args, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use readtrack::{
    daemon::{
        args::DaemonArgs,
        lifecycle::DaemonLifecycle,
        start_daemon,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> ExitCode {
    match run_service(args().collect::<Vec<_>>()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("readtrack-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);
    // Detaching changes the working directory, so relative paths have to be resolved first.
    let app_dir = match &args.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            std::path::absolute(dir)?
        }
        None => create_application_default_path()?,
    };

    let mut lifecycle = DaemonLifecycle::new(&app_dir);
    // Refuse before detaching, so the operator sees it.
    lifecycle.ensure_single_instance()?;

    if !args.foreground {
        #[cfg(unix)]
        {
            use daemonize::Daemonize;

            // Forks twice and starts a new session, the child is fully detached. Stdin always
            // points at /dev/null.
            let daemonize = Daemonize::new()
                .working_directory("/")
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent?;
                    println!("Created daemon");
                    return Ok(());
                }
                daemonize::Outcome::Child(child) => {
                    child?;
                }
            }
        }
        #[cfg(windows)]
        {
            let mut command_args = command_args;
            use std::os::windows::process::CommandExt;
            // DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP
            const CREATION_FLAGS: u32 = 0x0000_0008 | 0x0000_0200;

            command_args.push("--foreground".into());
            let process_name = std::env::current_exe()?;
            let mut command = std::process::Command::new(process_name);
            command.args(command_args.into_iter().skip(1));
            command.creation_flags(CREATION_FLAGS);
            command.stdin(std::process::Stdio::null());
            command.stdout(std::process::Stdio::null());
            command.stderr(std::process::Stdio::null());
            #[allow(clippy::zombie_processes)]
            command.spawn()?;
            println!("Created daemon");
            return Ok(());
        }
    }

    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    let runtime = single_thread_runtime()?;
    let shutdown = lifecycle.start()?;
    let result = runtime.block_on(start_daemon(app_dir, shutdown));
    lifecycle.stop();
    result
}
