//! Prints the model catalog of a local Ollama server, one name per line.

use std::process::ExitCode;

use pprovider::adapters::ollama::{OLLAMA_BASE_URL, list_models};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let base_url =
        std::env::var("AI_BASE_URL").unwrap_or_else(|_| OLLAMA_BASE_URL.to_string());

    match list_models(&base_url).await {
        Ok(models) if models.is_empty() => {
            println!("no models installed at {base_url}");
            ExitCode::SUCCESS
        }
        Ok(models) => {
            for model in models {
                println!("{model}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("cannot list models at {base_url}: {err}");
            ExitCode::FAILURE
        }
    }
}
