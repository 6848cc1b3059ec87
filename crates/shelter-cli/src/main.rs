//! shelter-media: operator tool for animal images and protocol documents.
//!
//! Reads DATABASE_URL and the STORAGE_PROVIDER / AZURE_STORAGE_* settings
//! from the environment (or `.env`). The storage backend is built once at
//! start; every command then goes through it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shelter_cli::{command_context, guess_content_type, print_json};
use shelter_core::Config;
use shelter_db::{AnimalImageRepository, AnimalRepository, ProfilePictureCoordinator};
use shelter_infra::{init_telemetry, shutdown_telemetry};
use shelter_storage::{create_storage, MediaStorage};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "shelter-media", about = "Shelter media storage operations")]
struct Cli {
    /// Upper bound for each storage operation, in seconds
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the configured storage backend and report it
    CheckStorage,
    /// Create an animal
    CreateAnimal {
        name: String,
    },
    /// Upload an image for an animal
    UploadImage {
        #[arg(long)]
        animal: Uuid,
        /// Uploading user
        #[arg(long)]
        uploaded_by: Uuid,
        file: PathBuf,
        /// Overrides the type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List live images of an animal
    ListImages {
        #[arg(long)]
        animal: Uuid,
    },
    /// Write an image's stored bytes to a file
    FetchImage {
        image: Uuid,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Make an image the animal's profile picture
    Promote {
        #[arg(long)]
        animal: Uuid,
        #[arg(long)]
        image: Uuid,
    },
    /// Delete an image that is not the active profile picture
    DeleteImage {
        #[arg(long)]
        animal: Uuid,
        #[arg(long)]
        image: Uuid,
    },
    /// Attach or replace an animal's protocol document
    UploadDocument {
        #[arg(long)]
        animal: Uuid,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Write an animal's protocol document to a file
    FetchDocument {
        #[arg(long)]
        animal: Uuid,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Detach an animal's protocol document
    RemoveDocument {
        #[arg(long)]
        animal: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_telemetry("shelter-media")
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = run(cli, config).await;
    shutdown_telemetry().await;
    result
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let pool = shelter_db::connect(&config)
        .await
        .context("Failed to connect to database")?;
    shelter_db::migrate(&pool).await?;

    let ctx = command_context(Duration::from_secs(cli.timeout_secs));
    let storage: Arc<dyn MediaStorage> =
        create_storage(&config.storage, Some(pool.clone()), &ctx)
            .await
            .context("Failed to initialize storage backend")?;
    tracing::info!(provider = %storage.provider(), "Storage backend ready");

    let animals = AnimalRepository::new(pool.clone(), storage.clone());
    let images = AnimalImageRepository::new(pool.clone(), storage.clone());
    let coordinator = ProfilePictureCoordinator::new(pool, storage.clone());

    match cli.command {
        Commands::CheckStorage => {
            println!(
                "storage provider '{}' ready (inline payloads: {})",
                storage.provider(),
                storage.stores_inline()
            );
        }
        Commands::CreateAnimal { name } => {
            let animal = animals.create(&name).await?;
            print_json(&animal)?;
        }
        Commands::UploadImage {
            animal,
            uploaded_by,
            file,
            content_type,
        } => {
            let data = read_file(&file).await?;
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file).to_string());
            let image = images
                .create_image(&ctx, animal, uploaded_by, data, &content_type)
                .await?;
            print_json(&image)?;
        }
        Commands::ListImages { animal } => {
            let list = images.list_for_animal(animal).await?;
            print_json(&list)?;
        }
        Commands::FetchImage { image, out } => {
            let fetched = images.fetch_image_bytes(&ctx, image).await?;
            write_file(&out, &fetched.data).await?;
            println!("{} ({} bytes) -> {}", fetched.content_type, fetched.data.len(), out.display());
        }
        Commands::Promote { animal, image } => {
            let promoted = coordinator.promote(animal, image).await?;
            print_json(&promoted)?;
        }
        Commands::DeleteImage { animal, image } => {
            coordinator.delete_image(&ctx, animal, image).await?;
            println!("image {} deleted", image);
        }
        Commands::UploadDocument {
            animal,
            file,
            content_type,
        } => {
            let data = read_file(&file).await?;
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file).to_string());
            let filename = file.file_name().and_then(|n| n.to_str());
            let updated = animals
                .set_protocol_document(&ctx, animal, data, &content_type, filename)
                .await?;
            print_json(&updated)?;
        }
        Commands::FetchDocument { animal, out } => {
            let fetched = animals.get_protocol_document(&ctx, animal).await?;
            write_file(&out, &fetched.data).await?;
            println!("{} ({} bytes) -> {}", fetched.content_type, fetched.data.len(), out.display());
        }
        Commands::RemoveDocument { animal } => {
            animals.remove_protocol_document(&ctx, animal).await?;
            println!("protocol document of animal {} removed", animal);
        }
    }

    Ok(())
}

async fn read_file(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_file(path: &PathBuf, data: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
