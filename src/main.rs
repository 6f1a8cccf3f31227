use clap::Parser;
use gas_health::cli;
use tracing::error;

fn main() {
    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = cli::exit_code_for(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };

    match cli::dispatch(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                error!("{:#}", err);
            } else {
                eprintln!("error: {:#}", err);
            }
            std::process::exit(cli::FATAL_EXIT_CODE);
        }
    }
}
