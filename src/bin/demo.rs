//! AtlasDB Demo Binary
//!
//! Saves a few configs, weights and food entries, then reads them back with
//! `all`, `range` and matcher queries.

use atlasdb::{q, Config, ListOptions, Record, Schema, Store, Timestamp};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDB Demo
#[derive(Parser, Debug)]
#[command(name = "atlasdb-demo")]
#[command(about = "Exercise an AtlasDB store with a small diet log")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "test.db")]
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    id: u64,
    height: f64,
    birthday: Timestamp,
}

impl Record for Settings {
    const BUCKET: &'static str = "Config";
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    id: u64,
    date: Timestamp,
    calories: i64,
    food: String,
}

impl Record for Entry {
    const BUCKET: &'static str = "Entry";
}

#[derive(Debug, Serialize, Deserialize)]
struct Weight {
    id: u64,
    date: Timestamp,
    weight: f64,
}

impl Record for Weight {
    const BUCKET: &'static str = "Weight";
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasDB demo v{}", atlasdb::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> atlasdb::Result<()> {
    let config = Config::builder()
        .path(&args.path)
        .schema(Schema::of::<Settings>())
        .schema(Schema::of::<Weight>().index("date"))
        .schema(Schema::of::<Entry>().index("date").index("food"))
        .build();
    let store = Store::open(config)?;
    let now = Timestamp::now();

    // Config
    let mut settings = Settings {
        id: 0,
        height: 186.0,
        birthday: now.add_days(-30 * 365),
    };
    store.save(&mut settings)?;
    println!("config saved");
    let latest: Vec<Settings> = store.all(ListOptions::new().limit(1).reverse())?;
    println!("{:?}", latest);

    // Weight
    let mut weight = Weight {
        id: 0,
        date: now,
        weight: 86.0,
    };
    store.save(&mut weight)?;
    println!("weight saved");
    let weights: Vec<Weight> = store.all(ListOptions::new().reverse())?;
    println!("{:?}", weights);

    // Entries
    add_entry(&store, "apple", 100, now)?;
    add_entry(&store, "bread", 300, now.add_days(-2))?;

    let today: Vec<Entry> = store.range("date", now.add_days(-1), now.add_days(1), ListOptions::new())?;
    println!("Entries from Today:");
    println!("{:?}", today);

    let two_days_ago: Vec<Entry> = store
        .select::<Entry>([q::gt("date", now.add_days(-3)), q::lt("date", now.add_days(-1))])
        .find()?;
    println!("Entries from Two Days Ago:");
    println!("{:?}", two_days_ago);

    let filters = vec![q::eq("calories", 300), q::eq("food", "bread")];
    let bread: Vec<Entry> = store.select::<Entry>(filters).bucket("Entry").find()?;
    tracing::info!("Filtered bread using select() finds data: {:?}", bread);

    let filters = vec![q::eq("calories", 50), q::eq("food", "bread")];
    let none: Vec<Entry> = store.select::<Entry>(filters).bucket("Entry").find()?;
    tracing::info!(
        "Filtered bread using select() finds nothing because no calories match: {:?}",
        none
    );

    store.close()
}

fn add_entry(store: &Store, food: &str, calories: i64, date: Timestamp) -> atlasdb::Result<()> {
    let mut entry = Entry {
        id: 0,
        date,
        calories,
        food: food.to_string(),
    };
    store.save(&mut entry)?;
    println!("entry saved");
    Ok(())
}
