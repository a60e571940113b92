use owo_colors::OwoColorize;

use crate::engine::StatsSnapshot;

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print the end-of-run summary. Errors turn the line red, a clean run green.
pub fn print_report(stats: &StatsSnapshot, dry_run: bool) {
    let body = stats.report();
    let line = if dry_run {
        format!("Dry run: {body}")
    } else {
        body
    };
    if !is_tty() {
        println!("{line}");
    } else if stats.errors > 0 {
        println!("{}", line.red().bold());
    } else if stats.is_empty() {
        println!("{}", line.dimmed());
    } else {
        println!("{}", line.green());
    }
}
