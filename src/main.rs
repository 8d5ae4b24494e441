use std::io::Write;

use botstream::bot::model::requests::{ProtocolMessage, QueryRequest};
use botstream::bot::model::response::ResponseMessage;
use botstream::bot::provider::BotProvider;
use botstream::model::arg::Args;
use botstream::model::config::Config;
use clap::Parser;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {:#}", e);
        std::process::exit(1);
    });

    let provider = BotProvider::from_config(&config).unwrap_or_else(|e| {
        tracing::error!("Failed to create HTTP client: {:#}", e);
        std::process::exit(1);
    });

    let mut options = config.stream_options();
    if let Some(api_key) = args.api_key {
        options.api_key = Some(api_key);
    }
    if options.api_key.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("No API key configured, sending request without authorization");
    }

    let message_id = Uuid::new_v4().to_string();
    let request = QueryRequest::new(vec![
        ProtocolMessage::user(args.message).with_message_id(message_id.clone()),
    ])
    .with_ids(
        Uuid::new_v4().to_string(),
        Uuid::new_v4().to_string(),
        message_id,
    );

    tracing::debug!(bot = %args.bot, "Streaming response");
    let mut stream = provider.stream_request(&request, &args.bot, &options);

    let mut stdout = std::io::stdout();
    let mut answer = String::new();
    let mut suggestions = Vec::new();

    while let Some(message) = stream.recv().await {
        match message {
            ResponseMessage::Text { text, .. } => {
                answer.push_str(&text);
                print!("{}", text);
            }
            ResponseMessage::Replace { text, .. } => {
                // Start over on a fresh line
                answer = text;
                print!("\n{}", answer);
            }
            ResponseMessage::SuggestedReply { text, .. } => suggestions.push(text),
            ResponseMessage::Attachment { attachment, .. } => {
                print!("\n[attachment] {} ({})\n", attachment.name, attachment.url);
            }
            ResponseMessage::Meta(meta) => {
                tracing::debug!(content_type = %meta.content_type, "Received response meta");
            }
            other => tracing::debug!("Ignoring message: {:?}", other),
        }
        let _ = stdout.flush();
    }
    println!();

    if answer.is_empty() {
        tracing::warn!("Bot {} sent no text", args.bot);
    }

    if !suggestions.is_empty() {
        println!();
        for suggestion in suggestions {
            println!("> {}", suggestion);
        }
    }
}
