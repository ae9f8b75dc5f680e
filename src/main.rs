use clap::{Parser, Subcommand};
use mnemo_migrate::apis::mnemo::MnemoClient;
use mnemo_migrate::apis::webflow::WebflowClient;
use mnemo_migrate::config::Config;
use mnemo_migrate::pipeline::{ConflictPolicy, Migration, MigrationOptions, MigrationRunResult};
use mnemo_migrate::relocator::Relocator;
use mnemo_migrate::storage::GcsStore;
use mnemo_migrate::types::{ContentType, DestinationPort, MigrationOutcome};
use mnemo_migrate::{logging, report};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mnemo-migrate")]
#[command(about = "Webflow to Mnemo content migration and image relocation")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate source collections into the destination store
    Migrate {
        /// Content types to migrate (comma-separated). Available: post, event, news, team, programme
        #[arg(long)]
        types: Option<String>,
        /// Duplicate-slug policy: skip (pre-check, data-preserving) or suffix (-2, -3, ...)
        #[arg(long, default_value = "skip")]
        on_conflict: ConflictPolicy,
        /// Re-encode downloaded images to JPEG before upload
        #[arg(long)]
        reencode: bool,
        /// Stop after walking this many source items per collection
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Re-run image relocation for already-persisted items and update them in place
    RelocateImages {
        /// Content types to process (comma-separated)
        #[arg(long)]
        types: Option<String>,
        /// Re-encode downloaded images to JPEG before upload
        #[arg(long)]
        reencode: bool,
    },
    /// Check whether an item with the given type + slug exists in the destination
    Check {
        #[arg(long)]
        content_type: ContentType,
        #[arg(long)]
        slug: String,
    },
}

fn parse_types(types: Option<String>, config: &Config) -> Vec<ContentType> {
    match types {
        Some(list) => list
            .split(',')
            .filter_map(|s| match s.trim().parse::<ContentType>() {
                Ok(content_type) => Some(content_type),
                Err(e) => {
                    warn!("Skipping unknown content type: {}", e);
                    println!("⚠️  {e}");
                    None
                }
            })
            .collect(),
        // Default to every type with a configured source collection
        None => ContentType::ALL
            .into_iter()
            .filter(|t| config.collections.contains_key(t))
            .collect(),
    }
}

fn print_run_summary(result: &MigrationRunResult) {
    println!("\n📊 Results for {}:", result.content_type);
    println!("   Source items: {}", result.total_source_items);
    println!("   Created: {}", result.created());
    println!("   Updated: {}", result.updated());
    println!("   Skipped: {}", result.skipped());
    println!("   Failed: {}", result.failed());

    let failures: Vec<_> = result
        .outcomes
        .iter()
        .filter_map(|o| match o {
            MigrationOutcome::Failed { source_id, error, .. } => Some((source_id, error)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        warn!("{} failures during run", failures.len());
        println!("\n⚠️  Failures:");
        for (source_id, error) in failures {
            println!("   - {source_id}: {error}");
        }
    }
}

fn build_migration(config: &Config, options: MigrationOptions) -> Migration {
    let source = Arc::new(WebflowClient::new(&config.webflow_token));
    let destination = Arc::new(MnemoClient::new(
        &config.mnemo_base_url,
        config.mnemo_token.clone(),
    ));
    let store = Arc::new(GcsStore::new(
        config.gcs_bucket.clone(),
        config.gcs_token.clone(),
        config.cdn_base_url.clone(),
    ));
    let relocator = Arc::new(Relocator::new(
        store,
        &config.cdn_base_url,
        Duration::from_secs(config.download_timeout_secs),
    ));
    Migration::new(source, destination, relocator, options)
}

async fn run_collections(
    migration: &Migration,
    config: &Config,
    types: &[ContentType],
    report_kind_suffix: &str,
    relocation_pass: bool,
) {
    for content_type in types {
        let collection_id = match config.collection_id(*content_type) {
            Ok(id) => id.to_string(),
            Err(e) => {
                warn!("Skipping {}: {}", content_type, e);
                println!("⚠️  Skipping {content_type}: {e}");
                continue;
            }
        };

        info!("Starting {} for {}", report_kind_suffix, content_type);
        println!("\n🚀 Processing {content_type}...");
        let result = if relocation_pass {
            migration
                .run_relocation_pass(*content_type, &collection_id)
                .await
        } else {
            migration.run_collection(*content_type, &collection_id).await
        };

        print_run_summary(&result);

        let kind = format!("{content_type}-{report_kind_suffix}");
        let migration_report = report::summarize(&kind, result.outcomes);
        match report::write(&migration_report, Path::new(".")) {
            Ok(path) => println!("💾 Report written to {}", path.display()),
            Err(e) => {
                error!("Failed to write report: {}", e);
                println!("❌ Failed to write report: {e}");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    // Configuration problems are fatal before any item is processed
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Migrate {
            types,
            on_conflict,
            reencode,
            limit,
        } => {
            let types = parse_types(types, &config);
            if types.is_empty() {
                eprintln!("❌ No content types to migrate");
                std::process::exit(1);
            }
            println!("🔄 Running migration for: {:?}", types);

            let mut options = MigrationOptions::from_config(&config, on_conflict, reencode);
            options.limit = limit;
            let migration = build_migration(&config, options);
            run_collections(&migration, &config, &types, "migration", false).await;
            println!("\n✅ Migration run complete");
        }
        Commands::RelocateImages { types, reencode } => {
            let types = parse_types(types, &config);
            if types.is_empty() {
                eprintln!("❌ No content types to process");
                std::process::exit(1);
            }
            println!("🖼️  Running image relocation pass for: {:?}", types);

            let options = MigrationOptions::from_config(&config, ConflictPolicy::Skip, reencode);
            let migration = build_migration(&config, options);
            run_collections(&migration, &config, &types, "image-relocation", true).await;
            println!("\n✅ Image relocation pass complete");
        }
        Commands::Check { content_type, slug } => {
            let destination =
                MnemoClient::new(&config.mnemo_base_url, config.mnemo_token.clone());
            match destination.find_by_slug(content_type, &slug).await {
                Ok(Some(item)) => {
                    println!(
                        "✅ Found {} '{}' (id: {})",
                        content_type,
                        slug,
                        item.id.as_deref().unwrap_or("?")
                    );
                }
                Ok(None) => {
                    println!("ℹ️  No {content_type} with slug '{slug}'");
                }
                Err(e) => {
                    error!("Existence check failed: {}", e);
                    eprintln!("❌ Existence check failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
