use clap::{ArgAction, Parser, Subcommand};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use gallerist::{
    AutoMatcher, Config, GalleryManager, Operation, Outcome, RelevanceBM25, SharedGallery,
    startup_checks, store,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Act as this user id; permission rules apply. Omit to act as operator.
    #[arg(short, long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all galleries
    List,
    /// Show a gallery's details and image names
    Info { gallery: String },
    /// Create an empty gallery under the first root
    Create {
        gallery: String,
        #[arg(long, default_value = "cli")]
        creator_id: String,
        #[arg(long, default_value = "cli")]
        creator_name: String,
    },
    /// Delete a gallery and its directory
    Remove { gallery: String },
    /// Add an image file to a gallery
    Add {
        gallery: String,
        file: PathBuf,
        #[arg(long, default_value = "")]
        label: String,
        /// Slot to write; 0 picks the smallest free index
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Delete an image by index
    Delete { gallery: String, index: u32 },
    /// Look up an image by index, or by content with --file
    View {
        gallery: String,
        index: Option<u32>,
        #[arg(long, conflicts_with = "index")]
        file: Option<PathBuf>,
    },
    /// Print a random image path
    Random { gallery: String },
    /// Remove byte-identical images, keeping the first of each
    Dedup { gallery: String },
    SetCapacity { gallery: String, capacity: u32 },
    SetCompress {
        gallery: String,
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    SetDuplicate {
        gallery: String,
        #[arg(action = ArgAction::Set)]
        allowed: bool,
    },
    SetFuzzy {
        gallery: String,
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Show or edit tags; without a gallery, print the keyword index
    Tags {
        gallery: Option<String>,
        #[arg(long, num_args = 1.., conflicts_with_all = ["add", "remove"])]
        set: Option<Vec<String>>,
        #[arg(long)]
        add: Option<String>,
        #[arg(long)]
        remove: Option<String>,
    },
    /// Zip a gallery next to its directory
    Export { gallery: String },
    /// Import a zip file as a new gallery
    Import {
        file: PathBuf,
        /// Gallery name; defaults to the file stem
        #[arg(long)]
        name: Option<String>,
    },
    /// Pick an image in reply to a message
    Match { message: String },
    /// BM25 relevance of a message against each gallery, or against --tags
    Score {
        message: String,
        #[arg(long, num_args = 1..)]
        tags: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    if let Err(errors) = startup_checks::perform_startup_checks(&config).await {
        for e in &errors {
            error!("Startup check failed: {}", e);
        }
        std::process::exit(1);
    }

    let store = store::create_store(&config.storage);
    let manager = GalleryManager::new(config, store);
    manager.initialize().await?;

    run(&manager, cli.user.as_deref(), cli.command).await?;

    for gallery in manager.get_all_galleries().await {
        gallery.wait_normalized().await;
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config = toml_edit::de::from_str::<Config>(&content)?;
        info!("Configuration loaded from: {:?}", path);
        Ok(config)
    } else {
        info!("Config file not found at {:?}, using defaults", path);
        Ok(Config::default())
    }
}

/// Print the outcome; rejections go to stderr and end the process.
fn finish<T>(outcome: Outcome<T>, show: impl FnOnce(T) -> String) {
    match outcome {
        Outcome::Done(value) => println!("{}", show(value)),
        Outcome::Rejected(rejection) => {
            eprintln!("{}", rejection);
            std::process::exit(1);
        }
    }
}

fn finish_display<T: Display>(outcome: Outcome<T>) {
    finish(outcome, |value| value.to_string())
}

async fn gallery_for(
    manager: &GalleryManager,
    user: Option<&str>,
    name: &str,
    operation: Operation,
) -> SharedGallery {
    let gallery = match manager.find_gallery(name).await {
        Outcome::Done(gallery) => gallery,
        Outcome::Rejected(rejection) => {
            eprintln!("{}", rejection);
            std::process::exit(1);
        }
    };
    if let Some(user) = user
        && !manager.config().permissions.check(operation, user, name)
    {
        eprintln!("user {} may not {:?} in gallery '{}'", user, operation, name);
        std::process::exit(1);
    }
    gallery
}

async fn run(
    manager: &GalleryManager,
    user: Option<&str>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List => {
            for gallery in manager.get_all_galleries().await {
                let info = gallery.info().await;
                println!(
                    "{}\t{}/{}\t{}",
                    info.name,
                    info.image_count,
                    info.settings.capacity,
                    info.settings.tags.join(",")
                );
            }
        }
        Commands::Info { gallery } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::View).await;
            gallery.wait_normalized().await;
            println!("{}", gallery.info().await);
            for name in gallery.image_names().await? {
                println!("  {}", name);
            }
        }
        Commands::Create {
            gallery,
            creator_id,
            creator_name,
        } => {
            let creator_id = user.map(str::to_string).unwrap_or(creator_id);
            let outcome = manager.create_gallery(&gallery, &creator_id, &creator_name).await?;
            finish(outcome, |g| format!("created {}", g.path().display()));
        }
        Commands::Remove { gallery } => {
            gallery_for(manager, user, &gallery, Operation::Delete).await;
            finish(manager.delete_gallery(&gallery).await?, |name| format!("removed {}", name));
        }
        Commands::Add {
            gallery,
            file,
            label,
            index,
        } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::Add).await;
            let bytes = tokio::fs::read(&file).await?;
            let label = if label.is_empty() {
                user.unwrap_or("cli").to_string()
            } else {
                label
            };
            finish_display(gallery.add_image(&bytes, &label, index).await?);
        }
        Commands::Delete { gallery, index } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::Delete).await;
            finish(gallery.delete_image_by_index(index).await?, |image| {
                format!("deleted {}", image)
            });
        }
        Commands::View {
            gallery,
            index,
            file,
        } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::View).await;
            let outcome = match (index, file) {
                (_, Some(file)) => gallery.view_by_bytes(&tokio::fs::read(&file).await?).await?,
                (Some(index), None) => gallery.view_by_index(index).await?,
                (None, None) => gallery.random_image().await?,
            };
            finish(outcome, |image| image.path.display().to_string());
        }
        Commands::Random { gallery } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::View).await;
            finish(gallery.random_image().await?, |image| image.path.display().to_string());
        }
        Commands::Dedup { gallery } => {
            let gallery = gallery_for(manager, user, &gallery, Operation::Delete).await;
            let report = gallery.remove_duplicates().await?;
            for name in &report.removed {
                println!("removed {}", name);
            }
            println!("{} duplicates removed, {} failed", report.removed.len(), report.failed);
        }
        Commands::SetCapacity { gallery, capacity } => {
            finish_display(manager.set_capacity(&gallery, capacity).await?);
        }
        Commands::SetCompress { gallery, enabled } => {
            finish_display(manager.set_compress(&gallery, enabled).await?);
        }
        Commands::SetDuplicate { gallery, allowed } => {
            finish_display(manager.set_duplicate(&gallery, allowed).await?);
        }
        Commands::SetFuzzy { gallery, enabled } => {
            finish_display(manager.set_fuzzy(&gallery, enabled).await?);
        }
        Commands::Tags {
            gallery: None, ..
        } => {
            let index = manager.keyword_index().await;
            println!("exact: {}", index.exact.join(", "));
            println!("fuzzy: {}", index.fuzzy.join(", "));
        }
        Commands::Tags {
            gallery: Some(gallery),
            set,
            add,
            remove,
        } => {
            let outcome = if let Some(tags) = set {
                manager.set_tags(&gallery, tags).await?
            } else if let Some(tag) = add {
                manager.add_tag(&gallery, &tag).await?
            } else if let Some(tag) = remove {
                manager.remove_tag(&gallery, &tag).await?
            } else {
                let gallery = gallery_for(manager, user, &gallery, Operation::View).await;
                println!("{}", gallery.tags().await.join(", "));
                return Ok(());
            };
            finish(outcome, |info| info.settings.tags.join(", "));
        }
        Commands::Export { gallery } => {
            gallery_for(manager, user, &gallery, Operation::View).await;
            match manager.compress_gallery(&gallery).await? {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("failed to export gallery '{}'", gallery);
                    std::process::exit(1);
                }
            }
        }
        Commands::Import { file, name } => {
            let name = match name {
                Some(name) => name,
                None => gallerist::archive::archive_stem(&file)?,
            };
            let bytes = tokio::fs::read(&file).await?;
            finish(manager.import_archive(&name, &bytes).await?, |g| {
                format!("imported {}", g.path().display())
            });
        }
        Commands::Match { message } => {
            let matcher = AutoMatcher::new(manager.config().matching.clone());
            match matcher.pick(manager, &message).await? {
                Some(hit) => println!(
                    "{}\t{}\t{:.6}\t{}",
                    hit.gallery,
                    hit.mode,
                    hit.score,
                    hit.image.path.display()
                ),
                None => println!("no match"),
            }
        }
        Commands::Score { message, tags } => {
            let bm25 = RelevanceBM25::default();
            match tags {
                Some(tags) => println!("{:.6}", bm25.calc(&tags, &message)),
                None => {
                    for gallery in manager.get_all_galleries().await {
                        let score = bm25.calc(&gallery.tags().await, &message);
                        println!("{}\t{:.6}", gallery.name(), score);
                    }
                }
            }
        }
    }
    Ok(())
}
