use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tumorboard_core::migration::{migrate_workflow_files, migrate_workflow_store, MigrationReport};
use tumorboard_core::sources::connect;
use tumorboard_core::{normalize_text, CoreConfig, PatientCatalog, PatientId};

#[derive(Parser)]
#[command(name = "tumorboard")]
#[command(about = "Tumour board patient record CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all resolvable patients
    List,
    /// Print one resolved patient record as JSON
    Show {
        /// Patient identifier
        id: String,
    },
    /// Print the normalised form of a narrative text file
    Normalize {
        /// File holding the raw narrative
        file: PathBuf,
    },
    /// Rewrite alias keys in workflow documents to their canonical names
    Migrate {
        /// Batch root holding patient directories and flat workflow files
        /// (defaults to PATIENT_DATA_ROOT)
        root: Option<PathBuf>,
        /// Migrate the configured workflow store instead of files
        #[arg(long, conflicts_with = "root")]
        store: bool,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_report(report: &MigrationReport, dry_run: bool) {
    let verb = if dry_run { "Would migrate" } else { "Migrated" };
    for (location, rewrites) in &report.changed {
        for rewrite in rewrites {
            println!(
                "{} {}: {} -> {}{}",
                verb,
                location,
                rewrite.alias,
                rewrite.canonical,
                if rewrite.value_moved { "" } else { " (dropped)" }
            );
        }
    }
    for (location, error) in &report.skipped {
        eprintln!("Skipped {}: {}", location, error);
    }
    println!(
        "Scanned {} documents, {} changed, {} skipped",
        report.scanned,
        report.changed.len(),
        report.skipped.len()
    );
}

fn load_config() -> Result<CoreConfig, Box<dyn std::error::Error>> {
    Ok(CoreConfig::from_lookup(|key| std::env::var(key).ok())?)
}

/// Resolved record of one patient as pretty JSON. Unknown patients are an error.
async fn show(cfg: &CoreConfig, id: &str) -> Result<String, Box<dyn std::error::Error>> {
    let id = PatientId::parse(id)?;
    let catalog = PatientCatalog::from_config(cfg).await?;
    let record = catalog.resolve_patient(&id).await?;
    if !record.has_source_data() {
        return Err(format!("Patient {} not found", id).into());
    }
    Ok(serde_json::to_string_pretty(&record)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => {
            let catalog = PatientCatalog::from_config(&load_config()?).await?;
            let snapshot = catalog.resolve_all_patients().await;
            if snapshot.is_empty() {
                println!("No patients found.");
            } else {
                for record in snapshot.records().values() {
                    println!(
                        "ID: {}, Clinical: {}, Recommendation: {}",
                        record.id,
                        record.clinical_provenance.as_str(),
                        record.primary_recommendation.provenance.as_str()
                    );
                }
            }
        }
        Some(Commands::Show { id }) => {
            println!("{}", show(&load_config()?, &id).await?);
        }
        Some(Commands::Normalize { file }) => {
            let raw = std::fs::read_to_string(&file)?;
            println!("{}", normalize_text(Some(&raw)));
        }
        Some(Commands::Migrate {
            root,
            store,
            dry_run,
        }) => {
            let report = if store {
                let cfg = load_config()?;
                let workflow_store = cfg
                    .workflow_store()
                    .ok_or("WORKFLOW_MONGODB_URI is not set, no workflow store to migrate")?;
                let client = connect(&workflow_store.uri).await?;
                migrate_workflow_store(&client, workflow_store, dry_run).await?
            } else {
                let root = match root {
                    Some(root) => root,
                    None => load_config()?.patient_data_root().to_path_buf(),
                };
                migrate_workflow_files(&root, dry_run).await?
            };
            print_report(&report, dry_run);
        }
        None => {
            println!("Use 'tumorboard --help' for commands");
        }
    }

    Ok(())
}
