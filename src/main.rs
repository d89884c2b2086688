use std::io::{self as std_io, Write};

use clap::Parser;
use console::{style, Term};
use futures::StreamExt;
use time::{macros::format_description, OffsetDateTime};
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

use blitz_chat::config::Settings;
use blitz_chat::domains::chat::ChatMessage;
use blitz_chat::error::{BlitzChatError, Result};
use blitz_chat::markdown::{parse_blocks, Block, Span};
use blitz_chat::models::{CHAT_MODELS, SPEECH_MODELS};
use blitz_chat::BlitzChat;

#[derive(Parser, Debug)]
#[command(name = "blitz-chat")]
#[command(about = "Streaming LLM chat with local history and long-term memory")]
struct Cli {
    #[arg(long, default_value = "./data/blitz-chat.db")]
    db: String,

    #[arg(long, default_value = "./data/settings.json")]
    config: String,

    /// Continue an existing chat instead of starting a new one.
    #[arg(long)]
    chat: Option<i64>,

    /// One-shot prompt; prints the reply and exits.
    #[arg(long)]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    Chats {
        #[command(subcommand)]
        command: ChatsCommand,
    },
    /// Print a chat transcript.
    History {
        chat_id: i64,
    },
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },
    /// Generate an image and record it.
    Image {
        prompt: String,
    },
    /// Synthesize speech for a text and record the audio file.
    Speak {
        text: String,

        #[arg(long, default_value = "alloy")]
        voice: String,

        #[arg(long, default_value = "mp3")]
        format: String,

        #[arg(long)]
        out: Option<String>,
    },
    /// List known model identifiers.
    Models,
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ChatsCommand {
    List,
    New,
    Delete { chat_id: i64 },
}

#[derive(clap::Subcommand, Debug)]
enum MemoryCommand {
    List,
    Search {
        query: String,

        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    Add {
        content: String,
    },
    Forget {
        memory_id: i64,
    },
    Clear,
    /// Recently generated media records.
    Media,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
    Unset { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,blitz_chat=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(&cli.config, command);
    }
    if let Some(Commands::Models) = &cli.command {
        println!("{}", style("Chat models:").color256(81).bold());
        for model in CHAT_MODELS {
            println!("- {model}");
        }
        println!("{}", style("Speech models:").color256(81).bold());
        for model in SPEECH_MODELS {
            println!("- {model}");
        }
        return Ok(());
    }

    let settings = Settings::from_file(&cli.config)?;
    let app = BlitzChat::open(settings, &cli.db).await?;

    if let Some(command) = &cli.command {
        return handle_command(&app, command).await;
    }

    if let Some(prompt) = &cli.prompt {
        let chat_id = resolve_chat(&app, cli.chat).await?;
        let response = send_and_print(&app, chat_id, prompt, false).await?;
        render_message(&response);
        return Ok(());
    }

    run_repl(&app, cli.chat).await
}

async fn handle_command(app: &BlitzChat, command: &Commands) -> Result<()> {
    match command {
        Commands::Chats { command } => match command {
            ChatsCommand::List => {
                for chat in app.list_chats().await? {
                    let title = chat.title.unwrap_or_else(|| "(untitled)".to_string());
                    println!("{:>5}  {title}", chat.id);
                }
            }
            ChatsCommand::New => {
                let chat = app.create_chat().await?;
                println!("Created chat {}", chat.id);
            }
            ChatsCommand::Delete { chat_id } => {
                app.delete_chat(*chat_id).await?;
                println!("Deleted chat {chat_id}");
            }
        },
        Commands::History { chat_id } => {
            let chat = app.chat_with_messages(*chat_id).await?;
            let title = chat.chat.title.unwrap_or_else(|| "(untitled)".to_string());
            println!("{}", style(title).color256(81).bold());
            for message in &chat.messages {
                print_history_message(message);
            }
        }
        Commands::Memory { command } => handle_memory_command(app, command).await?,
        Commands::Image { prompt } => {
            let image = app.generate_image(prompt).await?;
            println!(
                "{} {}",
                style("Image:").color256(81).bold(),
                image.url.unwrap_or_default()
            );
        }
        Commands::Speak {
            text,
            voice,
            format,
            out,
        } => {
            let path = out
                .clone()
                .unwrap_or_else(|| format!("./data/speech-{}.{format}", std::process::id()));
            let audio = app.synthesize_speech(text, voice, format, &path).await?;
            println!(
                "{} {} ({})",
                style("Audio saved:").color256(81).bold(),
                audio.file_path,
                audio.file_mime_type
            );
        }
        Commands::Models | Commands::Config { .. } => {}
    }
    Ok(())
}

async fn handle_memory_command(app: &BlitzChat, command: &MemoryCommand) -> Result<()> {
    match command {
        MemoryCommand::List => {
            let memories = app.memories().await?;
            if memories.is_empty() {
                println!("{}", style("No memories saved.").color256(245));
            }
            for memory in memories {
                println!(
                    "{:>5}  {}  {}",
                    memory.id,
                    style(format_timestamp(memory.updated_time)).color256(245),
                    memory.content
                );
            }
        }
        MemoryCommand::Search { query, limit } => {
            let results = app.search_memories(query, *limit).await?;
            if results.is_empty() {
                println!("{}", style("No memory matches.").color256(245));
            } else {
                println!("{}", style("Memory matches:").color256(81).bold());
                for memory in results {
                    println!("- {}", memory.content);
                }
            }
        }
        MemoryCommand::Add { content } => {
            let id = app.save_memory(content, None).await?;
            println!("Saved memory {id}");
        }
        MemoryCommand::Forget { memory_id } => {
            app.delete_memory(*memory_id).await?;
            println!("Deleted memory {memory_id}");
        }
        MemoryCommand::Clear => {
            app.delete_all_memories().await?;
            println!("All memories deleted.");
        }
        MemoryCommand::Media => {
            for image in app.list_generated_images().await? {
                println!(
                    "image {:>4}  {}  {}",
                    image.id,
                    image.prompt.unwrap_or_default(),
                    image.url.unwrap_or_default()
                );
            }
            for audio in app.list_generated_audios().await? {
                println!(
                    "audio {:>4}  {}  {}",
                    audio.id, audio.input, audio.file_path
                );
            }
        }
    }
    Ok(())
}

fn handle_config_command(config_path: &str, command: &ConfigCommand) -> Result<()> {
    let mut settings = Settings::from_file(config_path)?;
    match command {
        ConfigCommand::Show => {
            let redacted = settings.redacted();
            let value = serde_json::to_string_pretty(&redacted)
                .map_err(|e| BlitzChatError::Serialization(e.to_string()))?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            settings.set(key, Some(value))?;
            settings.save_to(config_path)?;
            println!("Set {key}");
        }
        ConfigCommand::Unset { key } => {
            settings.set(key, None)?;
            settings.save_to(config_path)?;
            println!("Unset {key}");
        }
    }
    Ok(())
}

async fn resolve_chat(app: &BlitzChat, requested: Option<i64>) -> Result<i64> {
    match requested {
        Some(chat_id) => {
            // Fails early if the id is stale.
            app.chat_with_messages(chat_id).await?;
            Ok(chat_id)
        }
        None => Ok(app.create_chat().await?.id),
    }
}

async fn run_repl(app: &BlitzChat, requested_chat: Option<i64>) -> Result<()> {
    let chat_id = resolve_chat(app, requested_chat).await?;
    println!(
        "{} {}",
        style("⚡ blitz-chat").color256(214).bold(),
        style(format!("(chat {chat_id})")).color256(245)
    );
    println!(
        "{}",
        style("Enter your prompts (Ctrl+D to exit):").color256(245)
    );

    let stdin = io::BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    loop {
        print_user_prompt().map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
        let line = lines
            .next_line()
            .await
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
        let Some(line) = line else {
            println!("\n{}", style("Goodbye ✨").color256(245));
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        print_assistant_prefix();
        match send_and_print(app, chat_id, &line, true).await {
            Ok(response) => {
                println!();
                clear_streamed_output(&response);
                print_assistant_prefix();
                println!();
                render_message(&response);
            }
            Err(e) => {
                println!();
                println!("{}", style(format!("error: {e}")).red());
            }
        }
    }
    Ok(())
}

/// Streams a reply, optionally echoing raw deltas, and returns the full
/// text of the first response choice.
async fn send_and_print(
    app: &BlitzChat,
    chat_id: i64,
    text: &str,
    print_stream: bool,
) -> Result<String> {
    let mut stream = app.send_stream(chat_id, text);
    let mut response = String::new();
    while let Some(item) = stream.next().await {
        let delta = item?;
        if delta.index != 0 {
            continue;
        }
        if print_stream {
            print!("{}", delta.content);
            let _ = std_io::stdout().flush();
        }
        response.push_str(&delta.content);
    }
    Ok(response.trim().to_string())
}

fn print_user_prompt() -> std_io::Result<()> {
    let mut out = std_io::stdout();
    write!(out, "{} ", style("❯").color256(75).bold())?;
    out.flush()
}

fn print_assistant_prefix() {
    print!(
        "{} {} ",
        style("✦").color256(214).bold(),
        style("Blitz").color256(214).bold()
    );
}

const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

fn format_timestamp(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp(millis / 1000)
        .ok()
        .and_then(|dt| dt.format(TIMESTAMP_FORMAT).ok())
        .unwrap_or_else(|| millis.to_string())
}

fn print_history_message(message: &ChatMessage) {
    let who = if message.from_user() {
        style("you").color256(75).bold()
    } else {
        style("blitz").color256(214).bold()
    };
    let stamp = style(format_timestamp(message.time)).color256(245);
    let content = message.content.clone().unwrap_or_default();
    println!("{stamp}  {who}: {content}");
}

fn clear_streamed_output(response: &str) {
    let term = Term::stdout();
    let width = term.size().1.max(1) as usize;
    let mut lines = 0usize;
    for line in response.split('\n') {
        let len = line.chars().count().max(1);
        lines += len.div_ceil(width);
    }
    for _ in 0..lines {
        print!("\x1b[2K\x1b[1A");
    }
    print!("\x1b[2K\r");
    let _ = std_io::stdout().flush();
}

fn render_message(text: &str) {
    for block in parse_blocks(text) {
        match block {
            Block::Paragraph(spans) => {
                for span in &spans {
                    print_span(span);
                }
                println!();
            }
            Block::Code(content) => {
                for line in content.lines() {
                    println!("    {}", style(line).color256(252).on_color256(236));
                }
                println!();
            }
            Block::Think(content) => {
                println!("{}", style("Thought").color256(245).bold());
                for line in content.lines() {
                    println!("{}", style(line).color256(245).italic());
                }
                println!();
            }
        }
    }
}

fn print_span(span: &Span) {
    let mut styled = style(span.text.as_str());
    if span.style.heading || span.style.bold {
        styled = styled.bold();
    }
    if span.style.italic {
        styled = styled.italic();
    }
    if span.style.code {
        styled = styled.color256(252).on_color256(236);
    }
    print!("{styled}");
}
