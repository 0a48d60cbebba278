//! CLI argument parsing for urbanform
//!
//! Defines the Command enum and parse_args_from() for all CLI commands.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use urbanform::{FetchConfig, OutputFormat, PipelineConfig, FETCH_POPULATION_RANGE};

pub fn print_usage() {
    eprintln!("urbanform - street-network metrics for world cities");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  urbanform <command> [arguments]");
    eprintln!("  urbanform --help");
    eprintln!("  urbanform --version");
    eprintln!();
    eprintln!("  urbanform cities [--from <N>] [--to <N>] [--limit <N>]");
    eprintln!("  urbanform fetch [--from <N>] [--to <N>] [--limit <N>] [--delay-ms <N>] [--timeout-secs <N>]");
    eprintln!("  urbanform compute");
    eprintln!("  urbanform status");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  cities    List catalog cities in a population band");
    eprintln!("  fetch     Download and cache street graphs for a population band");
    eprintln!("  compute   Compute metrics for every cached graph and write the table");
    eprintln!("  status    Show catalog, cache and table counts");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --output <FORMAT>    Output format: human (default) or json");
    eprintln!("  --data-dir <DIR>     Data directory (default: data)");
    eprintln!("  --catalog <FILE>     City catalog GeoJSON (default: <data-dir>/geonames-all-cities-with-a-population-1000.geojson)");
    eprintln!("  --cache-dir <DIR>    Graph cache directory (default: <data-dir>/cities_graphs)");
    eprintln!("  --output-dir <DIR>   Table directory (default: <data-dir>/processed)");
    eprintln!();
    eprintln!("Cities and fetch arguments:");
    eprintln!(
        "  --from <N>           Minimum population, inclusive (default: {})",
        FETCH_POPULATION_RANGE.start()
    );
    eprintln!(
        "  --to <N>             Maximum population, inclusive (default: {})",
        FETCH_POPULATION_RANGE.end()
    );
    eprintln!("  --limit <N>          Only take the first N cities of the band");
    eprintln!();
    eprintln!("Fetch arguments:");
    eprintln!("  --nominatim-url <URL>  Geocoding endpoint");
    eprintln!("  --overpass-url <URL>   Overpass API endpoint");
    eprintln!("  --user-agent <UA>      User-Agent sent with every request");
    eprintln!("  --delay-ms <N>         Pause before each request (default: 1000)");
    eprintln!("  --timeout-secs <N>     Per-request timeout (default: 180)");
    eprintln!("  --no-progress          Disable the progress bar");
    eprintln!();
    eprintln!("Compute arguments:");
    eprintln!("  --no-progress          Disable the progress bar");
    eprintln!();
    eprintln!("Logging goes to stderr and is controlled by RUST_LOG (default: urbanform=info).");
}

/// Population band selection shared by `cities` and `fetch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandArgs {
    pub from: u64,
    pub to: u64,
    pub limit: Option<usize>,
}

impl Default for BandArgs {
    fn default() -> Self {
        Self {
            from: *FETCH_POPULATION_RANGE.start(),
            to: *FETCH_POPULATION_RANGE.end(),
            limit: None,
        }
    }
}

#[derive(Debug)]
pub enum Command {
    Cities {
        config: PipelineConfig,
        band: BandArgs,
        output_format: OutputFormat,
    },
    Fetch {
        config: PipelineConfig,
        fetch: FetchConfig,
        band: BandArgs,
        progress: bool,
        output_format: OutputFormat,
    },
    Compute {
        config: PipelineConfig,
        progress: bool,
        output_format: OutputFormat,
    },
    Status {
        config: PipelineConfig,
        output_format: OutputFormat,
    },
    Version,
    Help,
}

impl Command {
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Command::Cities { output_format, .. }
            | Command::Fetch { output_format, .. }
            | Command::Compute { output_format, .. }
            | Command::Status { output_format, .. } => *output_format,
            Command::Version | Command::Help => OutputFormat::Human,
        }
    }
}

/// Value following a flag
fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow::anyhow!("{} requires an argument", flag))
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{} expects a non-negative integer, got '{}'", flag, raw))
}

/// Parse a full argument vector (including the program name)
pub fn parse_args_from(args: &[String]) -> Result<Command> {
    if args.len() < 2 {
        return Err(anyhow::anyhow!("Missing command"));
    }

    let command = args[1].as_str();
    match command {
        "--version" | "-V" => return Ok(Command::Version),
        "--help" | "-h" => return Ok(Command::Help),
        "cities" | "fetch" | "compute" | "status" => {}
        other => return Err(anyhow::anyhow!("Unknown command: {}", other)),
    }

    let mut data_dir = PathBuf::from("data");
    let mut catalog: Option<PathBuf> = None;
    let mut cache_dir: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut output_format = OutputFormat::Human;
    let mut band = BandArgs::default();
    let mut fetch = FetchConfig::default();
    let mut progress = true;

    let takes_band = matches!(command, "cities" | "fetch");
    let is_fetch = command == "fetch";
    let takes_progress = matches!(command, "fetch" | "compute");

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--output" => {
                let raw = value(args, i, flag)?;
                output_format = raw.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                i += 2;
            }
            "--data-dir" => {
                data_dir = PathBuf::from(value(args, i, flag)?);
                i += 2;
            }
            "--catalog" => {
                catalog = Some(PathBuf::from(value(args, i, flag)?));
                i += 2;
            }
            "--cache-dir" => {
                cache_dir = Some(PathBuf::from(value(args, i, flag)?));
                i += 2;
            }
            "--output-dir" => {
                output_dir = Some(PathBuf::from(value(args, i, flag)?));
                i += 2;
            }
            "--from" if takes_band => {
                band.from = number(args, i, flag)?;
                i += 2;
            }
            "--to" if takes_band => {
                band.to = number(args, i, flag)?;
                i += 2;
            }
            "--limit" if takes_band => {
                band.limit = Some(number(args, i, flag)?);
                i += 2;
            }
            "--nominatim-url" if is_fetch => {
                fetch.nominatim_url = value(args, i, flag)?.to_string();
                i += 2;
            }
            "--overpass-url" if is_fetch => {
                fetch.overpass_url = value(args, i, flag)?.to_string();
                i += 2;
            }
            "--user-agent" if is_fetch => {
                fetch.user_agent = value(args, i, flag)?.to_string();
                i += 2;
            }
            "--delay-ms" if is_fetch => {
                fetch.request_delay = Duration::from_millis(number(args, i, flag)?);
                i += 2;
            }
            "--timeout-secs" if is_fetch => {
                fetch.timeout = Duration::from_secs(number(args, i, flag)?);
                i += 2;
            }
            "--no-progress" if takes_progress => {
                progress = false;
                i += 1;
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument for {}: {}", command, flag));
            }
        }
    }

    let mut config = PipelineConfig::from_data_dir(&data_dir);
    if let Some(path) = catalog {
        config.catalog_path = path;
    }
    if let Some(path) = cache_dir {
        config.cache_dir = path;
    }
    if let Some(path) = output_dir {
        config.output_dir = path;
    }

    Ok(match command {
        "cities" => Command::Cities {
            config,
            band,
            output_format,
        },
        "fetch" => Command::Fetch {
            config,
            fetch,
            band,
            progress,
            output_format,
        },
        "compute" => Command::Compute {
            config,
            progress,
            output_format,
        },
        _ => Command::Status {
            config,
            output_format,
        },
    })
}

/// Output format asked for on the command line, found even when parsing fails
///
/// The last `--output` wins, as in [`parse_args_from`]. Unknown values fall
/// back to human output.
pub fn requested_output_format(args: &[String]) -> OutputFormat {
    args.windows(2)
        .rev()
        .find(|pair| pair[0] == "--output")
        .and_then(|pair| pair[1].parse().ok())
        .unwrap_or_default()
}
