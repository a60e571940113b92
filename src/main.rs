use std::process::ExitCode;

mod app;
mod logging;

fn main() -> ExitCode {
    let args = mediasort::cli::parse();
    match app::run(args) {
        Ok(code) => code,
        Err(e) => {
            mediasort::output::print_error(&format!("{e:#}"));
            ExitCode::from(2)
        }
    }
}
