#![deny(clippy::all)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use mongo_csv_sync::{sync_file, Pairing, SyncOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PairingArg {
    /// join a key column against a document field
    Keyed,
    /// upsert into the only document of the collection
    Single,
    /// pair sorted rows with sorted documents by position
    Positional,
}

/// Apply the rows of a csv file as field updates to a mongodb collection.
#[derive(Parser, Debug)]
#[command(name = "mongo-csv-sync", version, about, long_about = None)]
struct Cli {
    /// csv file with a header row
    #[arg(default_value = "MOCK_DATA.csv")]
    path: PathBuf,

    /// mongodb connection string
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    uri: String,

    #[arg(long, default_value = "roommatefinder")]
    db: String,

    #[arg(long, default_value = "users")]
    collection: String,

    #[arg(long, value_enum, default_value_t = PairingArg::Keyed)]
    pairing: PairingArg,

    /// input column holding the join key (keyed pairing)
    #[arg(long, default_value = "email")]
    key_column: String,

    /// document field matched against the join key (keyed pairing)
    #[arg(long, default_value = "email")]
    key_field: String,

    /// column and document field both sides are sorted by (positional pairing)
    #[arg(long, default_value = "email")]
    sort_field: String,

    /// legacy field removed from every written document, repeatable
    #[arg(long = "unset", default_values_t = ["latitude".to_string(), "longitude".to_string()])]
    unset: Vec<String>,

    /// keep legacy fields
    #[arg(long, conflicts_with = "unset")]
    no_unset: bool,

    /// field delimiter of the input file
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl Cli {
    fn into_options(self) -> Result<(PathBuf, SyncOptions), String> {
        if !self.delimiter.is_ascii() {
            return Err(format!(
                "delimiter must be a single ascii character, got '{}'",
                self.delimiter
            ));
        }
        let pairing = match self.pairing {
            PairingArg::Keyed => Pairing::Keyed {
                column: self.key_column,
                field: self.key_field,
            },
            PairingArg::Single => Pairing::Single,
            PairingArg::Positional => Pairing::Positional {
                sort_field: self.sort_field,
            },
        };
        let options = SyncOptions {
            connection_str: self.uri,
            db: self.db,
            collection: self.collection,
            pairing,
            unset_fields: if self.no_unset { Vec::new() } else { self.unset },
            delimiter: self.delimiter as u8,
        };
        Ok((self.path, options))
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (path, options) = match Cli::parse().into_options() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match sync_file(&path, &options, |outcome| println!("{outcome}")) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
