//! Entry-point for the `pp` binary.
use clap::Parser;
use pp_cli::Cli;
use pp_cli::run_main;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let cli = Cli::parse();
        run_main(cli).await
    })
}
