//! Stream a Gemini response and print the text as it arrives.
//!
//! Run with:
//! ```bash
//! export GEMINI_API_KEY="your-api-key"
//! RUST_LOG=gemstream=debug cargo run --example stream_prompt -- "Tell me a story" sse
//! ```

use std::io::Write;

use gemstream::model::GenerationConfig;
use gemstream::options::{GeminiConfig, GenerateOptions, TransportOptions};
use gemstream::providers::GeminiClient;
use gemstream::{FramingMode, GenerateContentResponse};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "gemstream=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let prompt = args
        .next()
        .unwrap_or_else(|| "Write a short poem about the sea".to_string());
    let framing = match args.next().as_deref() {
        Some("sse") => FramingMode::Sse,
        _ => FramingMode::JsonArray,
    };

    let client = GeminiClient::from_config(GeminiConfig::from_env()?, &TransportOptions::default())?;
    let options = GenerateOptions::default().with_generation_config(GenerationConfig {
        temperature: Some(0.7),
        max_output_tokens: Some(512),
        ..Default::default()
    });

    let mut stdout = std::io::stdout();
    let delivered = client
        .stream_prompt("gemini-1.5-flash", prompt, &options, framing, |event| {
            match event.deserialize::<GenerateContentResponse>() {
                Ok(response) => {
                    print!("{}", response.text().unwrap_or_default());
                    let _ = stdout.flush();
                }
                Err(e) => eprintln!("\nskipping value: {e}"),
            }
        })
        .await?;

    println!("\n\n({delivered} values received)");
    Ok(())
}
