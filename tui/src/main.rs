use clap::Parser;
use helm_tui::Cli;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    helm_tui::run_main(cli).await
}
