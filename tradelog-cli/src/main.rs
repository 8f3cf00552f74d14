use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::process;
use tradelog::{JournalDocument, JournalStore, TradePlan, TradeRecord, TradelogError};

/// tradelog CLI — inspect a trading journal data directory
#[derive(Parser)]
#[command(name = "tradelog", version, about)]
struct Cli {
    /// Path to the data directory
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Path to the images directory
    #[arg(long, default_value = "images")]
    images_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionName {
    Trades,
    Plans,
}

#[derive(Subcommand)]
enum Command {
    /// List all documents in a collection
    List {
        /// Collection name
        collection: CollectionName,
    },

    /// Show a single document by ID
    Show {
        /// Collection name
        collection: CollectionName,
        /// Document ID
        id: String,
    },

    /// Delete a document
    Remove {
        /// Collection name
        collection: CollectionName,
        /// Document ID
        id: String,
    },

    /// Show document counts per collection
    Status,
}

fn main() {
    let cli = Cli::parse();

    let store = match JournalStore::open(&cli.data_dir, &cli.images_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&cli.command, &store) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(command: &Command, store: &JournalStore) -> tradelog::Result<()> {
    match command {
        Command::List { collection } => match collection {
            CollectionName::Trades => print_json(&store.trades().read_all()?),
            CollectionName::Plans => print_json(&store.plans().read_all()?),
        },
        Command::Show { collection, id } => match collection {
            CollectionName::Trades => {
                print_json(&find_by_id::<TradeRecord>(store.trades().read_all()?, id)?)
            }
            CollectionName::Plans => {
                print_json(&find_by_id::<TradePlan>(store.plans().read_all()?, id)?)
            }
        },
        Command::Remove { collection, id } => {
            match collection {
                CollectionName::Trades => store.trades().remove(id)?,
                CollectionName::Plans => store.plans().remove(id)?,
            }
            println!("deleted {id}");
            Ok(())
        }
        Command::Status => print_json(&serde_json::json!({
            "trades": store.trades().read_all()?.len(),
            "plans": store.plans().read_all()?.len(),
        })),
    }
}

fn find_by_id<T: JournalDocument>(docs: Vec<T>, id: &str) -> tradelog::Result<T> {
    docs.into_iter()
        .find(|doc| doc.id() == id)
        .ok_or_else(|| TradelogError::NotFound {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
        })
}

fn print_json<T: Serialize>(value: &T) -> tradelog::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
