//! manualctl - command-line front end for an Awesome Manual server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manual_client::ManualClient;
use manual_core::{ManualParams, ManualWrite, ServerConfig, StepAttributes, Upload};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "manualctl")]
#[command(about = "Browse and edit manuals on an Awesome Manual server")]
struct Args {
    /// Server base URL
    #[arg(long, env = "MANUAL_SERVER", default_value_t = default_server())]
    server: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List manuals
    List,
    /// Show a manual with its steps
    Show { id: i64 },
    /// Create a manual
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Tag name (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Step title, in order (repeatable)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Thumbnail image file
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// Delete a manual
    Delete { id: i64 },
}

fn default_server() -> String {
    format!(
        "http://{}:{}",
        ServerConfig::DEFAULT_HOST,
        ServerConfig::DEFAULT_PORT
    )
}

fn content_type_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

async fn read_upload(path: &Path) -> Result<Upload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload::new(filename, content_type_for(path), data))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let client = ManualClient::new(&args.server)?;

    match args.command {
        Command::List => {
            for manual in client.get_manuals().await? {
                let tags: Vec<&str> = manual.tags.iter().map(|t| t.name.as_str()).collect();
                println!(
                    "{:>5}  {}  ({} steps) [{}]",
                    manual.id,
                    manual.title,
                    manual.step_count,
                    tags.join(", ")
                );
            }
        }
        Command::Show { id } => {
            let manual = client.get_manual(id).await?;
            println!("# {}", manual.title);
            if let Some(description) = &manual.description {
                println!("{}", description);
            }
            if !manual.tags.is_empty() {
                let tags: Vec<&str> = manual.tags.iter().map(|t| t.name.as_str()).collect();
                println!("Tags: {}", tags.join(", "));
            }
            if let Some(url) = &manual.thumbnail_url {
                println!("Thumbnail: {}", url);
            }
            for step in &manual.steps {
                println!();
                println!("{}. {}", step.position, step.title);
                if let Some(description) = &step.description {
                    println!("   {}", description);
                }
                if let Some(url) = &step.image_url {
                    println!("   Image: {}", url);
                }
            }
        }
        Command::Create {
            title,
            description,
            tags,
            steps,
            thumbnail,
        } => {
            let params = ManualParams {
                title: Some(title),
                description: description.map(Some),
                tag_names: Some(tags),
                steps_attributes: Some(
                    steps
                        .into_iter()
                        .zip(1..)
                        .map(|(title, position)| StepAttributes::new(title, None, position))
                        .collect(),
                ),
            };
            let mut write = ManualWrite::new(params);
            if let Some(path) = thumbnail {
                write = write.with_thumbnail(read_upload(&path).await?);
            }
            let manual = client.create_manual(write).await?;
            println!("Created manual {}", manual.id);
        }
        Command::Delete { id } => {
            client.delete_manual(id).await?;
            println!("Deleted manual {}", id);
        }
    }

    Ok(())
}
