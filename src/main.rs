//! sslkeylog CLI entry point.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sslkeylog::cli::{write_layouts, write_verify_report, Args, Command};
use sslkeylog_core::KeyLogFile;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Session lifecycle messages are logged at info
    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    match args.command {
        Command::Verify { file, format } => {
            let keylog = KeyLogFile::from_file(&file)
                .with_context(|| format!("Failed to parse key log: {}", file.display()))?;
            write_verify_report(&mut io::stdout(), &file, &keylog, format)?;
            Ok(())
        }
        Command::Layouts => {
            write_layouts(&mut io::stdout())?;
            Ok(())
        }
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        Command::Attach { pid, session } => {
            let tracer = sslkeylog::trace::Tracer::attach(pid)
                .with_context(|| format!("Failed to attach to process {pid}"))?;
            tracing::info!("Attached to process {pid}");
            session_loop::run(tracer, &session)
        }
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        Command::Run { session, command } => {
            let (program, program_args) = command
                .split_first()
                .context("No command given after --")?;
            let tracer = sslkeylog::trace::Tracer::spawn(program, program_args)
                .with_context(|| format!("Failed to start {program}"))?;
            tracing::info!("Started {program} as process {}", tracer.pid());
            session_loop::run(tracer, &session)
        }
        #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
        Command::Attach { .. } | Command::Run { .. } => {
            anyhow::bail!("Tracing is only supported on x86_64 Linux")
        }
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod session_loop {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use signal_hook::consts::{SIGINT, SIGTERM};
    use sslkeylog::cli::SessionArgs;
    use sslkeylog::trace::{drive, Tracer};
    use sslkeylog_core::SessionController;

    /// Log keys until the target exits or a termination signal arrives.
    pub fn run(tracer: Tracer, args: &SessionArgs) -> Result<()> {
        let shutdown = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&shutdown))
                .context("Failed to install signal handler")?;
        }

        let mut session = SessionController::new(args.config());
        drive(tracer, &mut session, args.output.clone(), &shutdown)
            .context("Key logging session failed")?;
        Ok(())
    }
}
