//! bucket-fs command line entry point

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bucket_fs::config::Config;
use bucket_fs::connector::s3::S3ConnectorFactory;
use bucket_fs::driver::Driver;
use bucket_fs::node::{Directory, File, LocalFile, Node};
use bucket_fs::storage::Storage;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: bucket-fs <config.yaml> <command> [args...]");
    eprintln!();
    eprintln!("bucket-fs - browse an object store bucket as a directory tree");
    eprintln!();
    eprintln!("Commands (run against the default configuration):");
    eprintln!("  ls [-r] [dir]          List a directory");
    eprintln!("  tree [dir]             List every directory and file below dir");
    eprintln!("  du [dir]               Total size of the files below dir");
    eprintln!("  mkdir <dir>            Create a directory marker");
    eprintln!("  rmdir [-r] <dir>       Remove a directory marker, or the whole tree");
    eprintln!("  cat <file>             Print a file");
    eprintln!("  put <local> <file>     Upload a local file");
    eprintln!("  get <file> <local>     Download a file");
    eprintln!("  rm <file>              Delete a file");
    eprintln!("  mv <from> <to>         Move a file");
    eprintln!();
    eprintln!("  url <storage> <path>   Public URL of a path in a named storage");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  bucket-fs /etc/bucket-fs/config.yaml ls -r uploads");
}

/// Split `-r` off the remaining arguments
fn take_recursive(args: &[String]) -> (bool, Vec<&str>) {
    let recursive = args.iter().any(|a| a == "-r");
    let rest = args
        .iter()
        .filter(|a| a.as_str() != "-r")
        .map(String::as_str)
        .collect();
    (recursive, rest)
}

fn required<'a>(args: &[&'a str], idx: usize, what: &str) -> Result<&'a str, String> {
    args.get(idx)
        .copied()
        .ok_or_else(|| format!("missing argument: {}", what))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let command = args[2].as_str();
    let (recursive, rest) = take_recursive(&args[3..]);

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Loaded configuration from {:?}", config_path);

    if command == "url" {
        let name = required(&rest, 0, "storage")?;
        let path = required(&rest, 1, "path")?;
        let storage = Storage::from_config(&config, name, &S3ConnectorFactory).await?;
        println!("{}", storage.url(&storage.file(path))?);
        return Ok(());
    }

    let driver = match Driver::from_named(&config, None, &S3ConnectorFactory).await? {
        Some(driver) => Arc::new(driver),
        None => {
            eprintln!("No default configuration in {:?}", config_path);
            std::process::exit(1);
        }
    };
    info!("Using bucket {}", driver.bucket());

    let dir = |path: &str| Directory::new(path).with_driver(driver.clone());
    let file = |path: &str| File::new(path).with_driver(driver.clone());

    match command {
        "ls" => {
            let target = dir(rest.first().copied().unwrap_or(""));
            for item in target.items(recursive).await? {
                print_node(&item);
            }
        }
        "tree" => {
            let target = dir(rest.first().copied().unwrap_or(""));
            for directory in target.directories(true).await? {
                println!("{}/", directory.path());
            }
            for f in target.files(true).await? {
                println!("{}", f.path());
            }
        }
        "du" => {
            let target = dir(rest.first().copied().unwrap_or(""));
            println!("{}\t{}/", target.size().await?, target.path());
        }
        "mkdir" => {
            let target = dir(required(&rest, 0, "dir")?);
            if !target.make().await? {
                eprintln!("Cannot create {}", target.path());
                std::process::exit(1);
            }
        }
        "rmdir" => {
            let target = dir(required(&rest, 0, "dir")?);
            if recursive {
                target.delete_recursive().await?;
            } else if !target.delete().await? {
                eprintln!("Cannot remove {}", target.path());
                std::process::exit(1);
            }
        }
        "cat" => {
            let content = file(required(&rest, 0, "file")?).read().await?;
            std::io::stdout().write_all(&content)?;
        }
        "put" => {
            let local = LocalFile::new(required(&rest, 0, "local")?);
            file(required(&rest, 1, "file")?).copy_from(&local).await?;
        }
        "get" => {
            let source = file(required(&rest, 0, "file")?);
            let local = LocalFile::new(required(&rest, 1, "local")?);
            source.copy_to(&local).await?;
        }
        "rm" => {
            file(required(&rest, 0, "file")?).delete().await?;
        }
        "mv" => {
            let source = file(required(&rest, 0, "from")?);
            let target = file(required(&rest, 1, "to")?);
            source.move_to(&target).await?;
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_node(node: &Node) {
    match node {
        Node::Directory(d) => println!("{}/", d.path()),
        Node::File(f) => println!("{}", f.path()),
    }
}
