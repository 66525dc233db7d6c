//! Line-oriented macro runner for a virtual tabletop campaign.
//!
//! Reads chat input from stdin, runs it through the macro interpreter and
//! prints the result along with every chat message it produced.
//!
//! ```bash
//! vtt --campaign saves/keep.json --player Gina
//! RUST_LOG=vtt_core=debug vtt
//! ```

mod headless;

use vtt_core::HeadlessConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = parse_config_from_args(&args, HeadlessConfig::from_env());
    headless::run_headless(config).await?;
    Ok(())
}

/// Applies `--campaign` and `--player` on top of the environment defaults.
fn parse_config_from_args(args: &[String], mut config: HeadlessConfig) -> HeadlessConfig {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--campaign" => {
                if let Some(path) = args.get(i + 1) {
                    config = config.with_campaign(path);
                    i += 1;
                }
            }
            "--player" => {
                if let Some(name) = args.get(i + 1) {
                    config = config.with_player(name.as_str());
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    config
}

fn print_help() {
    println!("vtt - run tabletop macros from the command line");
    println!();
    println!("USAGE:");
    println!("  vtt [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help           Show this help message");
    println!("  --campaign <PATH>    Load a saved campaign (default: a demo table)");
    println!("  --player <NAME>      Local player name (default: $VTT_PLAYER or Player)");
    println!();
    println!("ENVIRONMENT:");
    println!("  VTT_PLAYER           Local player name");
    println!("  VTT_TRUST_CHAT       Run chat input trusted (1, true, yes)");
    println!("  VTT_ONLOAD_MACRO     Library macro run when a campaign loads");
    println!("  RUST_LOG             Log filter, written to stderr (default: warn)");
}
