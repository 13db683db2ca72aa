// src/bin/cli.rs
use rschr_enrich::cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    cli::run()
}
