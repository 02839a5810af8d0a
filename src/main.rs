use std::process::ExitCode;

fn main() -> ExitCode {
    sam_pileup_rs::init_tracing();
    match sam_pileup_rs::cli::parse_from_env().and_then(sam_pileup_rs::run_from_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sam_pileup: {error}");
            ExitCode::from(1)
        }
    }
}
