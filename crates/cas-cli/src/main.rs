//! The `cas` binary: a content-addressed artifact cache for build
//! pipelines.

use clap::Parser;

use cas_cli::cli::{Cli, Commands};
use cas_cli::commands::{
    Artifact, DebugMode, Fetch, HashFiles, InputSource, ReadMeta, WriteMeta, version_line,
};
use cas_cli::trace;
use cas_core::Algorithm;
use cas_storage::{ArchiveDecorator, FileStore};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    trace::init(&cli.level)?;

    run(cli).await
}

/// The storage every command works through: the filesystem, with
/// `.archive` paths packing and unpacking their directory.
fn local_storage() -> ArchiveDecorator<FileStore> {
    ArchiveDecorator::new(FileStore::new())
}

fn input_source(arg: Option<String>) -> InputSource {
    arg.map_or(InputSource::Stdin, InputSource::File)
}

async fn run(cli: Cli) -> miette::Result<()> {
    match cli.command {
        Commands::Fetch {
            input,
            state_path,
            algorithm,
            debug,
        } => {
            let algorithm: Algorithm = algorithm.parse()?;
            let fetch = Fetch {
                storage: local_storage(),
                backend: cas_backend::from_name(&cli.backend)?,
                state_path,
                algorithm,
                debug,
                hash_override: None,
            };

            let sentinel = fetch.run(input_source(input)).await?;
            println!("{sentinel}");
        }

        Commands::Artifact {
            hash,
            paths,
            state_path,
        } => {
            let artifact = Artifact {
                storage: local_storage(),
                backend: cas_backend::from_name(&cli.backend)?,
                state_path,
            };

            let (hash, written) = artifact.run(&hash, &paths).await?;
            println!("Storing artifacts for {hash}");
            for path in written {
                println!("- {path}");
            }
        }

        Commands::Hash {
            input,
            algorithm,
            debug,
        } => {
            let algorithm: Algorithm = algorithm.parse()?;
            let debug: DebugMode = debug.parse()?;
            let backend = if debug == DebugMode::Store {
                Some(cas_backend::from_name(&cli.backend)?)
            } else {
                None
            };

            let command = HashFiles {
                storage: local_storage(),
                algorithm,
                debug,
                backend,
            };

            let hash = command.run(input_source(input)).await?;
            println!("{hash}");
        }

        Commands::Read { hash, keys } => {
            let read = ReadMeta {
                backend: cas_backend::from_name(&cli.backend)?,
            };

            for (key, value) in read.run(&hash, &keys).await? {
                println!("{key}: {value}");
            }
        }

        Commands::Write { hash, pairs } => {
            let write = WriteMeta {
                backend: cas_backend::from_name(&cli.backend)?,
            };

            let written = write.run(&hash, &pairs).await?;
            println!("{hash}");
            for (key, value) in written {
                println!("{key}: {value}");
            }
        }

        Commands::Version => println!("{}", version_line()),
    }

    Ok(())
}
