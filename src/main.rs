use clap::Parser;

mod args;
mod tideman;

fn main() {
    let a = args::Args::parse();
    if a.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    if let Err(e) = tideman::run_election(&a) {
        eprintln!("tidytally: error: {}", e);
        std::process::exit(1);
    }
}
