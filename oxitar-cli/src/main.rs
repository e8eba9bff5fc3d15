//! OxiTar CLI - tar archives with transparent compression
//!
//! Reads, writes and appends tar archives compressed with gzip, bzip2, xz,
//! zstd or lz4.

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{
    CreateOptions, ExtractArgs, ListOptions, cmd_append, cmd_cat, cmd_create, cmd_extract,
    cmd_info, cmd_list,
};
use oxitar::{CompressionMethod, TarFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxitar")]
#[command(author, version, about = "Tar archives with transparent compression")]
#[command(long_about = "
OxiTar reads and writes tar archives (ustar, pax, gnu) compressed with
gzip, bzip2, xz, zstd or lz4. Compression is detected from magic bytes
when reading and from the file suffix when writing.

Examples:
  oxitar list backup.tar.gz
  oxitar extract backup.tar.zst -o restore
  oxitar extract backup.tar.xz docs/readme.md
  oxitar create site.tar.bz2 public/
  oxitar create - src/ > src.tar
  oxitar append backup.tar.gz notes.txt
  oxitar cat backup.tar.gz docs/readme.md
  oxitar info backup.tar.lz4
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of an archive
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,

        /// Include only entries matching pattern (glob syntax: *.txt, src/**/*)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude entries matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,
    },

    /// Extract entries from an archive
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Entries to extract (all if empty)
        files: Vec<String>,

        /// Include only entries matching pattern (glob syntax: *.txt, src/**/*)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude entries matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,

        /// Keep files that already exist instead of replacing them
        #[arg(short, long)]
        keep_existing: bool,

        /// Do not restore permissions and modification times
        #[arg(long)]
        no_preserve: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create a new archive
    #[command(alias = "c")]
    Create {
        /// Output archive file ("-" for stdout)
        archive: String,

        /// Files and directories to add
        files: Vec<PathBuf>,

        /// Compression (none, gzip, bzip2, xz, zstd, lz4); guessed from the suffix if omitted
        #[arg(short = 'z', long)]
        compression: Option<CompressionMethod>,

        /// Compression level (1-9)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=9))]
        level: Option<u32>,

        /// Tar header format (ustar, pax, gnu)
        #[arg(short, long, default_value = "pax")]
        format: TarFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Add files to an existing archive (creating it if missing)
    #[command(alias = "a")]
    Append {
        /// Archive file to extend
        archive: PathBuf,

        /// Files and directories to add
        files: Vec<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print entry contents to stdout
    Cat {
        /// Archive file to read
        archive: PathBuf,

        /// Entries to print
        #[arg(required = true)]
        names: Vec<String>,

        /// Decode entries from this encoding (e.g. shift_jis, utf-16le)
        #[arg(short, long)]
        encoding: Option<String>,
    },

    /// Show information about an archive
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List {
            archive,
            verbose,
            json,
            include,
            exclude,
        } => cmd_list(
            &archive,
            &ListOptions {
                verbose,
                json,
                include: &include,
                exclude: &exclude,
            },
        ),
        Commands::Extract {
            archive,
            output,
            files,
            include,
            exclude,
            keep_existing,
            no_preserve,
            verbose,
        } => cmd_extract(
            &archive,
            &ExtractArgs {
                output: &output,
                files: &files,
                include: &include,
                exclude: &exclude,
                keep_existing,
                no_preserve,
                verbose,
            },
        ),
        Commands::Create {
            archive,
            files,
            compression,
            level,
            format,
            verbose,
        } => cmd_create(
            &archive,
            &files,
            &CreateOptions {
                compression,
                level,
                format,
                verbose,
            },
        ),
        Commands::Append {
            archive,
            files,
            verbose,
        } => cmd_append(&archive, &files, verbose),
        Commands::Cat {
            archive,
            names,
            encoding,
        } => cmd_cat(&archive, &names, encoding.as_deref()),
        Commands::Info { archive } => cmd_info(&archive),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
