use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::admin::{ManualFallback, UploadDriver, UploadFile, UploadStatus};
use folio::catalog::{
    CatalogWriter, GalleryRecord, GallerySession, ImageEdit, ImageSession, ProxySource,
    SaveOutcome, SourceChain, StaticDirSource,
};
use folio::client::ProxyClient;
use folio::config::Config;
use folio::site::{self, GalleryFilter, PublicSite};

#[derive(Parser, Debug)]
#[command(name = "folio-admin", about = "Manage portfolio images and galleries")]
struct Cli {
    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resize and upload images into a gallery
    Upload {
        #[arg(short, long)]
        gallery: String,
        /// Keep the images off the home page
        #[arg(long)]
        unfeatured: bool,
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Edit the gallery list
    Galleries {
        #[command(subcommand)]
        sub: GalleryCommands,
    },
    /// Edit the image catalog
    Images {
        #[command(subcommand)]
        sub: ImageCommands,
    },
    /// Print the public page cards as JSON
    Site {
        #[arg(long)]
        gallery: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum GalleryCommands {
    List,
    /// Add a gallery, or replace the one with the same id
    Add {
        id: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Remove {
        index: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ImageCommands {
    List {
        #[arg(long)]
        gallery: Option<String>,
    },
    Edit {
        index: usize,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        gallery: Option<String>,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        featured: Option<bool>,
    },
    /// Remove an entry; stored files are kept
    Delete {
        index: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let client = config.admin.proxy_url.as_deref().map(ProxyClient::new);
    let fallback = ManualFallback::new(&config.admin.fallback_dir);
    let writer = CatalogWriter::new(client.clone(), fallback.clone());

    let mut chain = SourceChain::new();
    if let Some(client) = &client {
        chain = chain.with(ProxySource::new(client.clone()));
    }
    let chain = chain.with(StaticDirSource::new(&config.site.static_dir));

    let confirm = |prompt: &str| cli.yes || ask(prompt);

    match cli.command {
        Commands::Upload {
            gallery,
            unfeatured,
            files,
        } => {
            let mut batch = Vec::with_capacity(files.len());
            for path in &files {
                let data = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                batch.push(UploadFile::new(name, data));
            }

            let driver = UploadDriver::new(client.clone(), fallback, config.site.widths);
            let report = driver.upload_batch(batch, &gallery, !unfeatured).await?;

            for skipped in &report.skipped {
                println!("skipped {} ({:?})", skipped.name, skipped.reason);
            }
            for outcome in &report.outcomes {
                match &outcome.status {
                    UploadStatus::Uploaded { .. } => println!("uploaded {}", outcome.record.filename),
                    UploadStatus::PendingManualUpload { .. } => {
                        if let Some(text) = outcome.instructions() {
                            println!("{text}");
                        }
                    }
                }
            }

            if !report.outcomes.is_empty() {
                let mut session = ImageSession::load(&chain).await?;
                report_save(session.add_uploaded(report.records(), &writer).await?);
            }
            if let Some((name, error)) = report.failed {
                anyhow::bail!("stopped at {name}: {error}");
            }
        }
        Commands::Galleries { sub } => {
            let mut session = GallerySession::load(&chain).await?;
            match sub {
                GalleryCommands::List => {
                    for (i, g) in session.galleries().iter().enumerate() {
                        println!("{i}\t{}\t{}\t{}", g.id, g.name, g.description);
                    }
                }
                GalleryCommands::Add {
                    id,
                    name,
                    description,
                } => {
                    let mut record = GalleryRecord::new(id, name);
                    record.description = description;
                    session.add_or_update_gallery(record)?;
                    report_save(session.save(&writer).await?);
                }
                GalleryCommands::Remove { index } => {
                    if session.remove_gallery(index, &confirm)?.is_some() {
                        report_save(session.save(&writer).await?);
                    }
                }
            }
        }
        Commands::Images { sub } => {
            let mut session = ImageSession::load(&chain).await?;
            match sub {
                ImageCommands::List { gallery } => {
                    let galleries = GallerySession::load(&chain).await?;
                    let rows = session.images_in(gallery.as_deref());
                    match &client {
                        Some(client) => {
                            let cards = site::admin_cards(&rows, galleries.galleries(), client);
                            println!("{}", serde_json::to_string_pretty(&cards)?);
                        }
                        None => {
                            for (i, img) in rows {
                                let label = site::gallery_label(img, galleries.galleries());
                                println!("{i}\t{}\t{label}", img.filename);
                            }
                        }
                    }
                }
                ImageCommands::Edit {
                    index,
                    title,
                    description,
                    gallery,
                    alt,
                    featured,
                } => {
                    let current = session
                        .images()
                        .get(index)
                        .with_context(|| format!("no image at index {index}"))?;
                    let edit = ImageEdit {
                        title: title.unwrap_or_else(|| current.title.clone()),
                        description: description.unwrap_or_else(|| current.description.clone()),
                        gallery: gallery.unwrap_or_else(|| current.gallery.clone()),
                        alt: alt.unwrap_or_else(|| current.alt.clone()),
                        featured: featured.unwrap_or_else(|| current.is_featured()),
                    };
                    report_save(session.edit_image(index, edit, &writer).await?);
                }
                ImageCommands::Delete { index } => {
                    if let Some(outcome) = session.delete_image(index, &confirm, &writer).await? {
                        report_save(outcome);
                    }
                }
            }
        }
        Commands::Site { gallery } => {
            let page = PublicSite::load(&chain, &config.site).await;
            let filter = gallery.map_or(GalleryFilter::All, GalleryFilter::Gallery);
            let view = serde_json::json!({
                "filters": page.filter_buttons(),
                "featured": page.featured_cards(),
                "galleries": page.gallery_cards(),
                "grid": page.grid_cards(&filter),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}

fn ask(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn report_save(outcome: SaveOutcome) {
    match outcome.instructions() {
        None => println!("saved"),
        Some(text) => println!("{text}"),
    }
}
