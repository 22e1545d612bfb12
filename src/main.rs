use std::process::ExitCode;

fn main() -> ExitCode {
    #[cfg(feature = "gui")]
    if std::env::args_os().len() <= 1 {
        tube_fetch_lib::cli::init_tracing(false);
        tube_fetch_lib::run();
        return ExitCode::SUCCESS;
    }

    match tube_fetch_lib::cli::main_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
