//! Interactive entry point: collect provider choice, key, and prompt, then
//! run the session.

use std::io::{self, Write};

use anyhow::{Context, Result};
use keyprobe_cli::session::{self, SessionConfig};
use keyprobe_providers::ProviderKind;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Select AI Service:");
    println!("1. ChatGPT");
    println!("2. Gemini");
    let choice = read_line("Enter your choice (1 or 2): ")?;

    // "1" selects ChatGPT, anything else falls through to Gemini.
    let kind = if choice == "1" {
        ProviderKind::ChatGpt
    } else {
        ProviderKind::Gemini
    };

    let credential = read_line(&format!(
        "Enter your {} API key: ",
        kind.name().to_uppercase()
    ))?;
    let prompt = read_line("Enter your prompt: ")?;

    let config = SessionConfig {
        provider: kind.name().to_owned(),
        credential,
        prompt,
    };

    if let Some(report) = session::execute(&config).await? {
        println!("{report}");
    }

    Ok(())
}

fn read_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("failed to read stdin")?;
    Ok(input.trim().to_owned())
}
