use std::process;

fn main() {
    if let Err(e) = sluice::cli::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
