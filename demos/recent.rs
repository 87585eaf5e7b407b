//! Browse a mailbox from the command line.
//!
//! Connection settings come from `IMAP_HOST`, `IMAP_PORT`, `IMAP_USER` and `IMAP_PASSWORD`
//! (optionally `IMAP_TLS` and `IMAP_TIMEOUT_MS`), read from the environment or a `.env` file:
//!
//! ```text
//! cargo run --example recent -- recent INBOX --count 20
//! cargo run --example recent -- read INBOX 42
//! RUST_LOG=postbox=trace cargo run --example recent -- folders --mode tree
//! ```

use std::error::Error;

use clap::{Parser, Subcommand, ValueEnum};
use postbox::{ConnectionParams, FolderMode, Header, ImapConnector, MailClient, MailParserDecoder};

#[derive(Parser)]
#[command(about = "Browse an IMAP mailbox")]
struct Cli {
    /// Print the raw IMAP exchange to stderr
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the server accepts the credentials
    Check,
    /// List the account's folders
    Folders {
        #[arg(long, value_enum, default_value_t = Shape::Flat)]
        mode: Shape,
    },
    /// Show the most recent headers of a folder
    Recent {
        folder: String,
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Show the headers of messages to or from an address
    Search { folder: String, query: String },
    /// Print one message, or a range with `--to`
    Read {
        folder: String,
        seq: u32,
        #[arg(long)]
        to: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Flat,
    Raw,
    Tree,
}

impl From<Shape> for FolderMode {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Flat => FolderMode::Flat,
            Shape::Raw => FolderMode::Raw,
            Shape::Tree => FolderMode::Tree,
        }
    }
}

fn print_headers(headers: &[Header]) {
    for h in headers {
        println!("{:>6}  {:<14}  {:<32.32}  {}", h.seq, h.date, h.from, h.subject);
        if let Some(problem) = &h.problem {
            println!("        ({})", problem);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();

    let mut params = ConnectionParams::from_env("IMAP")?;
    params.debug = cli.debug;
    let client = MailClient::new(ImapConnector::new(), MailParserDecoder, params);

    match cli.command {
        Command::Check => {
            client.test_connection()?;
            println!("ok");
        }
        Command::Folders { mode } => {
            let view = client.list_folders(mode.into())?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Recent { folder, count } => {
            print_headers(&client.fetch_recent_headers(&folder, count)?);
        }
        Command::Search { folder, query } => {
            print_headers(&client.search_headers(&folder, &query)?);
        }
        Command::Read { folder, seq, to } => {
            let messages = match to {
                Some(to) => client.read_messages(&folder, seq..=to)?,
                None => vec![client.read_message(&folder, seq)?],
            };
            for m in messages {
                println!("#{} {}", m.seq, m.id);
                println!("From:    {}", m.from);
                println!("To:      {}", m.to);
                if !m.cc.is_empty() {
                    println!("Cc:      {}", m.cc);
                }
                println!("Subject: {}", m.subject.unwrap_or_default());
                println!("Date:    {}", m.date.unwrap_or_default());
                for a in &m.attachments {
                    println!(
                        "Attachment: {} ({}, {} bytes)",
                        a.filename.as_deref().unwrap_or("unnamed"),
                        a.content_type,
                        a.content.len()
                    );
                }
                println!();
                println!("{}", m.text.unwrap_or_default());
            }
        }
    }
    Ok(())
}
