use std::{path::PathBuf, process, time::Duration};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{Config, parse_timeout},
    fetch::HttpFetcher,
    models::submission::{ArtifactUpload, SubmissionForm},
    services::{
        gallery::list_projects,
        intake::{SubmitProjectError, SubmitProjectParameters, submit_project},
        sweep::{SweepOrphansParameters, sweep_orphans},
        sync::{
            FailurePolicy, SyncCounts, SyncProjectsError, SyncProjectsParameters, SyncReport,
            sync_projects,
        },
    },
    storage::{MetadataStore, artifacts::FsArtifactStore, json::JsonFileMetadataStore},
};

mod config;
mod fetch;
mod models;
mod services;
mod slug;
mod storage;
#[cfg(test)]
mod test_support;
mod ui;

#[derive(Parser)]
#[command(
    name = "showcase",
    about = "Collect student project submissions and publish them as a static site"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new project
    Submit {
        /// Name of the student
        #[arg(long)]
        student_name: String,

        /// Title of the project
        #[arg(short, long)]
        title: String,

        /// Folder name for the published project (normalized to [a-z0-9-])
        #[arg(short, long)]
        slug: String,

        /// Short description of the project
        #[arg(short, long)]
        description: String,

        /// The project's HTML entry point
        #[arg(short, long)]
        file: PathBuf,

        /// MIME type of the file (e.g., "text/html")
        #[arg(long)]
        content_type: Option<String>,
    },

    /// List submitted projects
    List {
        /// Print projects as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download every project into the static hosting tree
    Sync {
        /// Root of the static hosting tree (defaults to SHOWCASE_STUDENTS_DIR)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Per-download timeout in seconds
        #[arg(long, value_name = "SECONDS", value_parser = parse_timeout_arg)]
        timeout: Option<Duration>,

        /// Keep going when a project fails instead of stopping the batch
        #[arg(long)]
        continue_on_error: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete uploaded files that no project references
    Gc {
        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,

        /// Leave files younger than this many minutes alone
        #[arg(long, default_value_t = 60)]
        grace_minutes: u64,
    },
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    counts: SyncCounts,
    #[serde(flatten)]
    report: &'a SyncReport,
}

fn parse_timeout_arg(value: &str) -> Result<Duration, String> {
    parse_timeout(value).map_err(|e| e.to_string())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "showcase=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: Failed to serialize output: {}", e);
            process::exit(1);
        }
    }
}

fn show_gallery(metadata: &impl MetadataStore, json: bool) {
    match list_projects(metadata) {
        Ok(projects) if json => print_json(&projects),
        Ok(projects) => ui::render_gallery(&projects),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nCould not load the projects. Please try again later.");
            process::exit(1);
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let metadata = JsonFileMetadataStore::new(config.metadata_path());

    match cli.command {
        Some(Commands::Submit {
            student_name,
            title,
            slug,
            description,
            file,
            content_type,
        }) => {
            let bytes = match std::fs::read(&file) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("Error: Failed to read '{}': {}", file.display(), e);
                    process::exit(1);
                }
            };

            let params = SubmitProjectParameters {
                form: SubmissionForm {
                    student_name,
                    project_title: title,
                    slug,
                    description,
                },
                file: Some(ArtifactUpload {
                    file_name: file
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    content_type,
                    bytes,
                }),
            };

            let artifacts = FsArtifactStore::new(config.blobs_dir(), config.public_base_url.clone());

            match submit_project(&metadata, &artifacts, params) {
                Ok(result) => ui::render_submission(&result),
                Err(SubmitProjectError::Validation(e)) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
                Err(SubmitProjectError::Conflict(slug)) => {
                    eprintln!("Error: A project with slug '{}' already exists", slug);
                    eprintln!("\nPlease choose another --slug.");
                    eprintln!(
                        "If no listed project uses it, a failed submission left its file behind; `showcase gc` removes it."
                    );
                    process::exit(1);
                }
                Err(SubmitProjectError::Upload(e)) => {
                    eprintln!("Error: Failed to upload the HTML file: {}", e);
                    eprintln!("\nNo project was saved. Please retry the submission.");
                    process::exit(1);
                }
                Err(SubmitProjectError::Persist(e)) => {
                    eprintln!("Error: Failed to save the project: {}", e);
                    eprintln!(
                        "\nThe uploaded file still holds the slug. Run `showcase gc --grace-minutes 0` before retrying."
                    );
                    process::exit(1);
                }
            }
        }
        Some(Commands::List { json }) => show_gallery(&metadata, json),
        Some(Commands::Sync {
            root,
            timeout,
            continue_on_error,
            json,
        }) => {
            let fetcher = match HttpFetcher::new(timeout.unwrap_or(config.fetch_timeout)) {
                Ok(fetcher) => fetcher.allow_local_files(config.blobs_dir()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            };

            let params = SyncProjectsParameters {
                root: root.unwrap_or_else(|| config.students_dir.clone()),
                policy: if continue_on_error {
                    FailurePolicy::Continue
                } else {
                    FailurePolicy::Abort
                },
                lock_path: Some(config.sync_lock_path()),
            };

            match sync_projects(&metadata, &fetcher, params) {
                Ok(report) => {
                    if json {
                        print_json(&SyncOutput {
                            counts: report.counts(),
                            report: &report,
                        });
                    } else {
                        ui::render_sync_report(&report);
                    }
                    if !report.is_success() {
                        process::exit(1);
                    }
                }
                Err(SyncProjectsError::AlreadyRunning(path)) => {
                    eprintln!("Error: Another sync is already running");
                    eprintln!("\nWait for it to finish, or remove '{}' if it crashed.", path.display());
                    process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        Some(Commands::Gc {
            dry_run,
            grace_minutes,
        }) => {
            let artifacts = FsArtifactStore::new(config.blobs_dir(), config.public_base_url.clone());
            let params = SweepOrphansParameters {
                dry_run,
                grace: Duration::from_secs(grace_minutes.saturating_mul(60)),
            };

            match sweep_orphans(&metadata, &artifacts, params) {
                Ok(report) => {
                    ui::render_sweep_report(&report, dry_run);
                    if !report.failed.is_empty() {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        None => show_gallery(&metadata, false),
    }
}
