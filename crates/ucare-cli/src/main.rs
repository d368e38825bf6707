//! ucare - command-line client for Uploadcare

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ucare_client::{
    Client, Config, CopiedFile, CopyTarget, File, Ordering, Paginator, StorePolicy, UploadOptions,
    UploadSource, DEFAULT_API_BASE, DEFAULT_UPLOAD_BASE,
};

#[derive(Parser, Debug)]
#[command(name = "ucare")]
#[command(about = "Manage files in an Uploadcare project")]
#[command(version)]
struct Args {
    /// Project public key
    #[arg(long, env = "UCARE_PUBLIC_KEY")]
    public_key: String,

    /// Project secret key; without it only uploads are possible
    #[arg(long, env = "UCARE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// REST API base URL
    #[arg(long, default_value = DEFAULT_API_BASE, env = "UCARE_API_BASE")]
    api_base: String,

    /// Upload API base URL
    #[arg(long, default_value = DEFAULT_UPLOAD_BASE, env = "UCARE_UPLOAD_BASE")]
    upload_base: String,

    /// Send the secret key in clear instead of signing requests
    #[arg(long)]
    simple_auth: bool,

    /// Multipart parts uploaded at once
    #[arg(long, default_value = "1", env = "UCARE_PART_CONCURRENCY")]
    part_concurrency: usize,

    /// Enable debug logging
    #[arg(short, long, env = "UCARE_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show project information
    Project,
    /// List files
    Files {
        /// Only stored (true) or only unstored (false) files
        #[arg(long)]
        stored: Option<bool>,
        /// List removed files instead of live ones
        #[arg(long)]
        removed: bool,
        /// Page size
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, value_enum)]
        ordering: Option<OrderingArg>,
        /// Stop after this many files
        #[arg(long)]
        max: Option<usize>,
    },
    /// Show one file
    File { id: String },
    /// List groups
    Groups {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one group
    Group { id: String },
    /// Upload a file, or stdin when the path is `-`
    Upload {
        path: PathBuf,
        /// Filename to record; required for stdin
        #[arg(long)]
        filename: Option<String>,
        #[arg(long, value_enum, default_value = "auto")]
        store: StoreArg,
    },
    /// Import a file from a public URL
    FromUrl {
        url: String,
        #[arg(long)]
        filename: Option<String>,
        #[arg(long, value_enum, default_value = "auto")]
        store: StoreArg,
    },
    /// Join uploaded files into a group
    GroupCreate {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Store every file of a group
    GroupStore { id: String },
    /// Copy a file to project storage, or to a custom storage with --target
    Copy {
        id: String,
        /// Custom storage name
        #[arg(long)]
        target: Option<String>,
        /// File naming pattern in the custom storage
        #[arg(long, requires = "target")]
        pattern: Option<String>,
        /// Store the local copy
        #[arg(long, conflicts_with = "target")]
        store: bool,
        #[arg(long)]
        make_public: bool,
    },
    /// Store files
    Store {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete files
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreArg {
    Auto,
    Yes,
    No,
}

impl From<StoreArg> for StorePolicy {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Auto => StorePolicy::Auto,
            StoreArg::Yes => StorePolicy::Store,
            StoreArg::No => StorePolicy::DoNotStore,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderingArg {
    Uploaded,
    UploadedDesc,
    Size,
    SizeDesc,
}

impl From<OrderingArg> for Ordering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Uploaded => Ordering::UploadTimeAsc,
            OrderingArg::UploadedDesc => Ordering::UploadTimeDesc,
            OrderingArg::Size => Ordering::SizeAsc,
            OrderingArg::SizeDesc => Ordering::SizeDesc,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter(args.debug).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::new(args.public_key, args.secret_key)
        .with_bases(args.api_base, args.upload_base)
        .with_part_concurrency(args.part_concurrency);
    if args.simple_auth {
        config = config.with_simple_auth();
    }
    let client = Client::new(config).context("failed to build client")?;

    run(&client, args.command).await
}

async fn run(client: &Client, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Project => print_json(&client.get_project().await?),
        Command::File { id } => print_json(&client.get_file(&id).await?),
        Command::Group { id } => print_json(&client.get_group(&id).await?),
        Command::Files {
            stored,
            removed,
            limit,
            ordering,
            max,
        } => {
            let mut query = client.files().removed(removed);
            if let Some(stored) = stored {
                query = query.stored(stored);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            if let Some(ordering) = ordering {
                query = query.ordering(ordering.into());
            }

            let mut files = query.paginate();
            let count = list_files(&mut files, max, |file| {
                println!(
                    "{}\t{}\t{}",
                    file.uuid,
                    file.size,
                    file.original_filename.as_deref().unwrap_or_default()
                );
            })
            .await?;
            tracing::debug!(count, pages = files.pages_fetched(), "listing finished");
            Ok(())
        }
        Command::Groups { limit } => {
            let mut query = client.groups();
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let mut groups = query.paginate();
            while let Some(group) = groups.next().await {
                let group = group?;
                println!("{}\t{}", group.id, group.files_count);
            }
            Ok(())
        }
        Command::Upload {
            path,
            filename,
            store,
        } => {
            let source = if path.as_os_str() == "-" {
                let filename = filename
                    .clone()
                    .context("--filename is required when uploading from stdin")?;
                UploadSource::reader(tokio::io::stdin(), filename)
            } else {
                UploadSource::path(path)
            };
            let mut options = UploadOptions::new().with_store(store.into());
            if let Some(filename) = filename {
                options = options.with_filename(filename);
            }

            let uploader = client.uploader().on_progress(Box::new(|p| {
                tracing::info!(
                    part = p.current_part,
                    parts = p.total_parts,
                    "{:.1}% uploaded",
                    p.percentage()
                );
            }));
            print_json(&uploader.upload(source, &options).await?)
        }
        Command::FromUrl {
            url,
            filename,
            store,
        } => {
            let mut options = UploadOptions::new().with_store(store.into());
            if let Some(filename) = filename {
                options = options.with_filename(filename);
            }
            let importer = client.importer().on_status(Box::new(|job| {
                tracing::info!(status = ?job.status, percent = ?job.percent(), "import status");
            }));
            print_json(&importer.import(&url, &options).await?)
        }
        Command::GroupCreate { ids } => print_json(&client.create_group(ids.as_slice(), None).await?),
        Command::GroupStore { id } => {
            client.store_group(&id).await?;
            println!("stored\t{}", id);
            Ok(())
        }
        Command::Copy {
            id,
            target,
            pattern,
            store,
            make_public,
        } => {
            let target = match target {
                Some(target) => CopyTarget::Remote {
                    target,
                    make_public,
                    pattern,
                },
                None => CopyTarget::Local { store, make_public },
            };
            match client.copy_file(&id, &target).await? {
                CopiedFile::File(file) => print_json(&file),
                CopiedFile::Url(url) => {
                    println!("{}", url);
                    Ok(())
                }
            }
        }
        Command::Store { ids } => {
            let outcome = client.store_files(&ids).await?;
            report_batch("stored", outcome)
        }
        Command::Delete { ids } => {
            let outcome = client.delete_files(&ids).await?;
            report_batch("deleted", outcome)
        }
    }
}

/// Default log filter when `RUST_LOG` is unset
fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("ucare_client={},ucare_cli={}", level, level)
}

/// Emit up to `max` files; no page is requested once the limit is reached
async fn list_files(
    files: &mut Paginator<File>,
    max: Option<usize>,
    mut emit: impl FnMut(&File),
) -> anyhow::Result<usize> {
    let mut count = 0;
    loop {
        if max.is_some_and(|max| count >= max) {
            break;
        }
        let Some(file) = files.next().await else {
            break;
        };
        emit(&file?);
        count += 1;
    }
    Ok(count)
}

fn report_batch(verb: &str, outcome: ucare_client::BatchOutcome) -> anyhow::Result<()> {
    for file in &outcome.result {
        println!("{}\t{}", verb, file.uuid);
    }
    for (id, problem) in &outcome.problems {
        eprintln!("skipped\t{}\t{}", id, problem);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
