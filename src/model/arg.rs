use clap::Parser;

/// Stream a message to a bot and print the answer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Bot to query
    #[arg(short, long)]
    pub bot: String,

    /// API key (overrides the config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Message to send
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["botstream", "--bot", "GPT-4o", "--api-key", "k", "Hello there"]).unwrap();
        assert_eq!(args.bot, "GPT-4o");
        assert_eq!(args.api_key.as_deref(), Some("k"));
        assert_eq!(args.message, "Hello there");
        assert!(args.config.is_none());
    }

    #[test]
    fn test_bot_is_required() {
        assert!(Args::try_parse_from(["botstream", "Hello"]).is_err());
    }
}
