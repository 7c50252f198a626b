/*!
Region Reclaimer: deletes stale chunks from world region files
*/

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use region_store::{
    ChunkPos, PointerTable, RegionPos, SqliteFlagger,
    region::{CHUNKS_PER_REGION, CHUNKS_PER_REGION_SIDE, pointer_offset},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::core::{
    config::{ReclaimerConfig, default_config_path, load_config},
    tracker::{Reclaimer, create_reclaimer_from_config_file},
};

mod core;

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help("Path to the TOML configuration file")
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
}

fn cli() -> Command {
    Command::new("Region Reclaimer")
        .version("0.1.0")
        .about("Reclaims disk space from world chunks nobody visits")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Run deletion cycles for every configured world")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("sweep")
                .about("Run one full deletion cycle for a single world now")
                .arg(config_arg())
                .arg(
                    Arg::new("world")
                        .short('w')
                        .long("world")
                        .help("Name of a configured world")
                        .value_name("NAME")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("flag")
                .about("Record a visit to chunks around a position")
                .arg(config_arg())
                .arg(Arg::new("world").short('w').long("world").value_name("NAME").required(true))
                .arg(
                    Arg::new("x")
                        .long("x")
                        .value_parser(value_parser!(i32))
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    Arg::new("z")
                        .long("z")
                        .value_parser(value_parser!(i32))
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    Arg::new("radius")
                        .short('r')
                        .long("radius")
                        .help("Chunks around the position to flag")
                        .value_parser(value_parser!(i32).range(0..=64))
                        .default_value("4"),
                )
                .arg(
                    Arg::new("permanent")
                        .long("permanent")
                        .help("Never delete these chunks")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("generated"),
                )
                .arg(
                    Arg::new("generated")
                        .long("generated")
                        .help("Record chunk generation rather than a visit")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show which chunk slots of a region file hold data")
                .arg(
                    Arg::new("region")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help("List every present chunk")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn resolve_config(matches: &ArgMatches) -> Result<ReclaimerConfig, Box<dyn std::error::Error>> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(default_config_path);
    if !path.exists() && !matches.contains_id("config") {
        info!("No config at {:?}, using defaults", path);
        return Ok(ReclaimerConfig::default());
    }
    load_config(path)
}

/// Every chunk within `radius` of `(x, z)`, clamped to the coordinate range
fn chunks_around(x: i32, z: i32, radius: i32) -> impl Iterator<Item = (i32, i32)> {
    let xs = x.saturating_sub(radius)..=x.saturating_add(radius);
    xs.flat_map(move |chunk_x| {
        (z.saturating_sub(radius)..=z.saturating_add(radius)).map(move |chunk_z| (chunk_x, chunk_z))
    })
}

fn flag_chunks(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(matches)?;
    let mut flagger = SqliteFlagger::open(&config.flags.flag_db_path)?;

    let world = matches.get_one::<String>("world").ok_or("missing --world")?;
    let x = *matches.get_one::<i32>("x").ok_or("missing --x")?;
    let z = *matches.get_one::<i32>("z").ok_or("missing --z")?;
    let radius = *matches.get_one::<i32>("radius").unwrap_or(&0);

    let flagged = if matches.get_flag("permanent") {
        let mut protected = 0;
        for (chunk_x, chunk_z) in chunks_around(x, z, radius) {
            flagger.flag_permanent(world, chunk_x, chunk_z)?;
            protected += 1;
        }
        protected
    } else if matches.get_flag("generated") {
        let duration = config.flags.generate_duration_ms();
        let mut inserted = 0;
        for (chunk_x, chunk_z) in chunks_around(x, z, radius) {
            inserted += usize::from(flagger.flag_generated(world, chunk_x, chunk_z, duration)?);
        }
        inserted
    } else {
        flagger.flag_visited(world, x, z, radius, config.flags.flag_duration_ms())?
    };

    println!("Flagged {} chunks in {}", flagged, world);
    Ok(())
}

fn inspect_region(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let path = matches.get_one::<PathBuf>("region").ok_or("missing region file")?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("region path has no file name")?;
    let pos = RegionPos::from_file_name(name).ok_or_else(|| format!("{} is not a region file", name))?;

    let table = PointerTable::read_from(&mut std::fs::File::open(path)?)?;
    println!(
        "{}: {}/{} chunks present",
        name,
        table.present_count(),
        CHUNKS_PER_REGION
    );

    if matches.get_flag("verbose") {
        let origin = pos.origin();
        for dz in 0..CHUNKS_PER_REGION_SIDE {
            for dx in 0..CHUNKS_PER_REGION_SIDE {
                let chunk = ChunkPos::new(origin.x + dx, origin.z + dz);
                let offset = pointer_offset(origin, chunk);
                if table.is_empty(offset) {
                    continue;
                }
                let entry = table.entry(offset);
                println!("  chunk {}: sector {} x{}", chunk, entry >> 8, entry & 0xff);
            }
        }
    }
    Ok(())
}

async fn run(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let mut reclaimer = match matches.get_one::<PathBuf>("config") {
        Some(path) => create_reclaimer_from_config_file(path).await?,
        None => Reclaimer::new(resolve_config(matches)?).await?,
    };

    tokio::select! {
        result = reclaimer.start() => {
            if let Err(e) = result {
                eprintln!("Reclaimer error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown");
        }
    }

    reclaimer.shutdown().await
}

async fn sweep(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let world = matches.get_one::<String>("world").ok_or("missing --world")?;
    let mut reclaimer = Reclaimer::new(resolve_config(matches)?).await?;
    let stats = reclaimer.sweep(world).await?;
    reclaimer.shutdown().await?;
    println!("{}", stats);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("run", sub)) => run(sub).await,
        Some(("sweep", sub)) => sweep(sub).await,
        Some(("flag", sub)) => flag_chunks(sub),
        Some(("inspect", sub)) => inspect_region(sub),
        _ => unreachable!("subcommand_required"),
    }
}
