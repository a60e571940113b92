//! Application orchestrator.
//! Loads/merges config, initializes logging, installs signal handlers, validates paths,
//! then runs the requested action and prints the summary.
//!
//! Exit status: 0 clean, 1 when any file failed, 2 when the run was aborted
//! (configuration, invariant violation or interrupt).

use anyhow::Result;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::logging::init_tracing;
use mediasort::cli::Args;
use mediasort::config::{CONFIG_ENV, create_template_config, load_config};
use mediasort::output as out;
use mediasort::{Action, Engine, RunSummary, SyncError, WorkerPool, default_config_path, shutdown};

const EXIT_FILE_ERRORS: u8 = 1;
const EXIT_ABORTED: u8 = 2;
const MAX_FAILURES_LISTED: usize = 20;

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    if args.init_config {
        let path = default_config_path()?;
        create_template_config(&path)?;
        out::print_success(&format!("A template mediasort config was written to: {}", path.display()));
        out::print_info(&format!(
            "Edit `source_dir` and `target_dir`, then re-run. To use a different location set {CONFIG_ENV}."
        ));
        return Ok(ExitCode::SUCCESS);
    }

    // Defaults < XML < env (via clap) < CLI flags.
    let (mut cfg, source) = load_config()?;
    args.apply_overrides(&mut cfg);

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt = init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        let installed = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing in-flight files...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take(); // drop guard here to flush tracing_appender
            }
        });
        if let Err(e) = installed {
            warn!(error = %e, "could not install interrupt handler; Ctrl-C will terminate immediately");
        }
    }

    debug!(?source, ?args, "configuration loaded");

    let result = (|| -> Result<RunSummary> {
        cfg.validate_and_normalize()?;
        let engine = Arc::new(Engine::new(&cfg)?);
        let pool = WorkerPool::new(engine)?;
        let summary = match args.action() {
            Action::Organize => pool.organize()?,
            Action::Cleanup => pool.cleanup()?,
        };
        Ok(summary)
    })();

    let code = match result {
        Ok(summary) => {
            out::print_report(&summary.stats, cfg.dry_run);
            report_failures(&summary);
            if let Some(cause) = &summary.aborted {
                error!(kind = cause.kind, src = %cause.path.display(), error = %cause.message, "run aborted");
                out::print_error(&format!("Run aborted: {}", cause.message));
                ExitCode::from(EXIT_ABORTED)
            } else if summary.interrupted {
                out::print_warn("Run interrupted; remaining files were left in place.");
                ExitCode::from(EXIT_ABORTED)
            } else if summary.has_failures() {
                ExitCode::from(EXIT_FILE_ERRORS)
            } else {
                info!("done");
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            if let Some(se) = e.downcast_ref::<SyncError>() {
                error!(kind = se.kind(), code = se.code(), error = %se, "run aborted");
            } else {
                error!(error = ?e, "run aborted");
            }
            out::print_error(&format!("{e:#}"));
            ExitCode::from(EXIT_ABORTED)
        }
    };

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    Ok(code)
}

fn print_config_location() {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            std::path::Path::new(&explicit).display()
        ));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default mediasort config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run with --init-config to create a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

fn report_failures(summary: &RunSummary) {
    for f in summary.failures.iter().take(MAX_FAILURES_LISTED) {
        out::print_error(&format!("{}: {}", f.path.display(), f.message));
    }
    if summary.failures.len() > MAX_FAILURES_LISTED {
        out::print_error(&format!(
            "... and {} more failures (see log)",
            summary.failures.len() - MAX_FAILURES_LISTED
        ));
    }
}
