//! xc-fetch: search xeno-canto, store recordings in a bucket, render mel
//! spectrograms.

mod args;
mod fetch;

use anyhow::{bail, Context, Result};
use args::{Filters, ParamArgs};
use birdcall::SpectrogramGenerator;
use birdcall_store::LocalBucket;
use clap::{Parser, Subcommand};
use fetch::FetchJob;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use xc_lib::{ResponseCache, XenoCantoClient};

#[derive(Parser, Debug)]
#[command(name = "xc-fetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cache API responses in this directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true, default_value = xc_lib::DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search recordings and print a summary
    Search {
        #[command(flatten)]
        filters: Filters,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Results per page (50-500)
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Print one recording as JSON
    Info {
        /// Catalogue number, with or without the XC prefix
        id: String,
    },

    /// Download matching recordings into a bucket
    Fetch {
        #[command(flatten)]
        filters: Filters,

        /// Stop after this many recordings
        #[arg(long)]
        max: Option<usize>,

        #[arg(long, default_value = "100")]
        per_page: u32,

        /// Bucket directory
        #[arg(long, env = "BIRDCALL_BUCKET", default_value = "bucket")]
        bucket: PathBuf,

        /// Local staging directory
        #[arg(long, default_value = "work")]
        work_dir: PathBuf,

        /// Also render and store a spectrogram per recording
        #[arg(long)]
        spectrograms: bool,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Render spectrograms for local audio files, one JSON line per file
    Spectrogram {
        /// Audio files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Files processed in parallel
        #[arg(short, long, default_value = "4")]
        jobs: usize,

        #[command(flatten)]
        params: ParamArgs,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Spectrogram {
            inputs,
            out_dir,
            jobs,
            params,
        } => spectrograms(inputs, out_dir, jobs, &params).await,
        Commands::Search {
            filters,
            page,
            per_page,
        } => {
            let client = api_client(&cli.base_url, cli.cache_dir)?;
            let response = client.search(&filters.to_query(), page, per_page).await?;
            for r in &response.recordings {
                println!(
                    "XC{}\t{}\t{}\t{}\t{}\t{}",
                    r.id,
                    r.scientific_name(),
                    r.english_name,
                    r.country,
                    r.quality,
                    r.length
                );
            }
            println!(
                "{} recordings, {} species, page {} of {}",
                response.num_recordings, response.num_species, response.page, response.num_pages
            );
            Ok(())
        }
        Commands::Info { id } => {
            let client = api_client(&cli.base_url, cli.cache_dir)?;
            match client.recording_by_id(&id).await? {
                Some(recording) => println!("{}", serde_json::to_string_pretty(&recording)?),
                None => bail!("no recording with id {id}"),
            }
            Ok(())
        }
        Commands::Fetch {
            filters,
            max,
            per_page,
            bucket,
            work_dir,
            spectrograms,
            params,
        } => {
            let client = api_client(&cli.base_url, cli.cache_dir)?;
            let store = LocalBucket::open(&bucket, true)?;
            let generator = if spectrograms {
                Some(Arc::new(SpectrogramGenerator::with_overrides(&params.overrides()?)?))
            } else {
                None
            };
            let job = FetchJob {
                client: &client,
                store: &store,
                work_dir,
                generator,
            };
            job.run(&filters.to_query(), max, per_page).await?;
            Ok(())
        }
    }
}

fn api_client(base_url: &str, cache_dir: Option<PathBuf>) -> Result<XenoCantoClient> {
    let client = XenoCantoClient::from_env()?.with_base_url(base_url);
    Ok(match cache_dir {
        Some(dir) => client.with_cache(ResponseCache::new(dir)),
        None => client,
    })
}

async fn spectrograms(inputs: Vec<PathBuf>, out_dir: PathBuf, jobs: usize, params: &ParamArgs) -> Result<()> {
    let generator = Arc::new(SpectrogramGenerator::with_overrides(&params.overrides()?)?);
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let outputs = fetch::output_paths(&out_dir, &inputs)?;
    let total = inputs.len();
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut set = JoinSet::new();
    for (index, (input, output)) in inputs.into_iter().zip(outputs).enumerate() {
        let permit = permits.clone().acquire_owned().await?;
        let generator = generator.clone();
        set.spawn_blocking(move || {
            let _permit = permit;
            let result = generator.generate(&input, &output, &Default::default());
            (index, input, output, result)
        });
    }

    let mut done = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        done.push(joined?);
    }
    done.sort_by_key(|(index, ..)| *index);

    let mut failed = 0;
    for (_, input, output, result) in done {
        let line = match result {
            Ok(result) => serde_json::json!({
                "input": input,
                "output": output,
                "result": result,
            }),
            Err(e) => {
                failed += 1;
                warn!("{}: {e}", input.display());
                serde_json::json!({ "input": input, "error": e.to_string() })
            }
        };
        println!("{line}");
    }

    info!("{} of {total} spectrograms written", total - failed);
    if failed > 0 {
        bail!("{failed} of {total} files failed");
    }
    Ok(())
}
