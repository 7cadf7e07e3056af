use chrono::{DateTime, NaiveDateTime};
use itertools::Itertools;
use serde_json::json;
use std::io::Write;
use std::process::exit;

use bgpkit_stream::{BgpStream, BgpStreamRecord, DumpType, StreamError};
use clap::Parser;
use ipnet::IpNet;
use log::warn;

/// bgpkit-stream is a cli tool that streams BGP records from MRT dump catalogs in time order.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// Data interface to use, see --list-interfaces. Defaults to the first available one.
    #[clap(short = 'd', long)]
    data_interface: Option<String>,

    /// Data interface option as NAME=VALUE, e.g. csv-file=catalog.csv. Can be repeated.
    #[clap(short = 'O', long = "option")]
    options: Vec<String>,

    /// List the available data interfaces and their options, then exit
    #[clap(long)]
    list_interfaces: bool,

    /// Print one line per BGP elem instead of one line per record
    #[clap(short, long)]
    elems: bool,

    /// Output as JSON objects
    #[clap(long)]
    json: bool,

    #[clap(flatten)]
    filters: Filters,
}

#[derive(Parser, Debug)]
struct Filters {
    /// Filter by project name, e.g. ris or routeviews
    #[clap(long)]
    project: Vec<String>,

    /// Filter by collector name, e.g. rrc00
    #[clap(short = 'c', long)]
    collector: Vec<String>,

    /// Filter by dump type: ribs or updates
    #[clap(long = "type")]
    dump_type: Vec<DumpType>,

    /// Filter by peer ASN
    #[clap(short = 'J', long)]
    peer_asn: Vec<u32>,

    /// Filter by origin AS Number
    #[clap(short = 'o', long)]
    origin_asn: Vec<u32>,

    /// Filter by network prefix
    #[clap(short = 'p', long)]
    prefix: Vec<IpNet>,

    /// Include super-prefix when filtering
    #[clap(short = 's', long)]
    include_super: bool,

    /// Include sub-prefix when filtering
    #[clap(short = 'S', long)]
    include_sub: bool,

    /// Filter by elem type: announce (a) or withdraw (w)
    #[clap(short = 'm', long)]
    elem_type: Option<String>,

    /// Filter by AS path regex string
    #[clap(short = 'a', long)]
    as_path: Option<String>,

    /// Start of the time interval, unix timestamp or RFC3339 time string
    #[clap(short = 't', long)]
    start_ts: Option<String>,

    /// End of the time interval, unix timestamp or RFC3339 time string. Omit to stream live.
    #[clap(short = 'T', long)]
    end_ts: Option<String>,

    /// Stream the most recent period instead, e.g. "2 h" or "30m"
    #[clap(short = 'r', long)]
    recent: Option<String>,

    /// Keep waiting for new data after the end of the catalog
    #[clap(short = 'l', long)]
    live: bool,

    /// Accept at most one RIB dump per collector every this many seconds
    #[clap(long)]
    rib_period: Option<u32>,
}

fn string_to_time(time_string: &str) -> Result<i64, String> {
    if let Ok(ts) = time_string.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(time_string) {
        return Ok(t.timestamp());
    }
    match NaiveDateTime::parse_from_str(time_string, "%Y-%m-%d %H:%M:%S") {
        Ok(t) => Ok(t.and_utc().timestamp()),
        Err(_) => Err(format!(
            "Input time must be either Unix timestamp or time string compliant with RFC3339: {}",
            time_string
        )),
    }
}

fn list_interfaces(stream: &BgpStream) -> Result<(), StreamError> {
    for id in stream.data_interfaces() {
        let info = stream.data_interface_info(id)?;
        println!("{}: {}", info.name, info.description);
        for option in stream.data_interface_options(id)? {
            let default = match &option.default {
                Some(d) => format!(" (default: {})", d),
                None => String::new(),
            };
            let required = if option.required { " [required]" } else { "" };
            println!(
                "    {:<12}{}{}{}",
                option.name, option.description, default, required
            );
        }
    }
    Ok(())
}

fn configure(stream: &mut BgpStream, opts: &Opts) -> Result<(), String> {
    if let Some(name) = &opts.data_interface {
        let id = stream.data_interface_id_by_name(name).ok_or_else(|| {
            let known = stream
                .data_interfaces()
                .into_iter()
                .filter_map(|id| stream.data_interface_info(id).ok())
                .map(|info| info.name)
                .join(", ");
            format!("unknown data interface {}, available: {}", name, known)
        })?;
        stream.set_data_interface(id).map_err(|e| e.to_string())?;
    }
    let id = stream
        .data_interface_id()
        .ok_or_else(|| "no data interface available".to_string())?;
    for option in &opts.options {
        let (name, value) = option
            .split_once('=')
            .ok_or_else(|| format!("data interface option {} is not NAME=VALUE", option))?;
        stream
            .set_data_interface_option(id, name.trim(), value.trim())
            .map_err(|e| e.to_string())?;
    }

    let filters = &opts.filters;
    let mut add = |filter_type: &str, value: String| {
        stream
            .add_filter(filter_type, value.as_str())
            .map_err(|e| e.to_string())
    };
    for v in &filters.project {
        add("project", v.clone())?;
    }
    for v in &filters.collector {
        add("collector", v.clone())?;
    }
    for v in &filters.dump_type {
        add("type", v.to_string())?;
    }
    for v in &filters.peer_asn {
        add("peer_asn", v.to_string())?;
    }
    for v in &filters.origin_asn {
        add("origin_asn", v.to_string())?;
    }
    let prefix_type = match (filters.include_super, filters.include_sub) {
        (false, false) => "prefix",
        (true, false) => "prefix_super",
        (false, true) => "prefix_sub",
        (true, true) => "prefix_super_sub",
    };
    for v in &filters.prefix {
        add(prefix_type, v.to_string())?;
    }
    if let Some(v) = &filters.elem_type {
        add("elem_type", v.clone())?;
    }
    if let Some(v) = &filters.as_path {
        add("as_path", v.clone())?;
    }

    match (&filters.recent, &filters.start_ts) {
        (Some(_), Some(_)) => {
            return Err("--recent and --start-ts cannot be used together".to_string());
        }
        (Some(recent), None) => {
            stream
                .add_recent_interval_filter(recent, filters.live)
                .map_err(|e| e.to_string())?;
        }
        (None, Some(start)) => {
            let start = string_to_time(start)?;
            let end = match &filters.end_ts {
                Some(end) => Some(string_to_time(end)?),
                None => None,
            };
            if end.is_some() && filters.live {
                warn!("--live ignored, the interval has an end");
            }
            stream.add_interval_filter(start, end);
        }
        (None, None) => return Err("one of --start-ts or --recent is required".to_string()),
    }
    if let Some(period) = filters.rib_period {
        stream.add_rib_period_filter(period);
    }
    Ok(())
}

fn format_record(record: &BgpStreamRecord, json: bool) -> String {
    if json {
        return json!(record).to_string();
    }
    format!(
        "{}|{}|{}|{}|{:.6}|{:?}|{}|{}",
        record.project,
        record.collector,
        record.dump_type,
        record.dump_time,
        record.timestamp,
        record.position,
        record.locator,
        record.elems.len()
    )
}

fn main() {
    let opts: Opts = Opts::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut stream = BgpStream::new();
    if opts.list_interfaces {
        if let Err(e) = list_interfaces(&stream) {
            eprintln!("{}", e);
            exit(1);
        }
        return;
    }

    if let Err(e) = configure(&mut stream, &opts) {
        eprintln!("{}", e);
        exit(1);
    }
    if let Err(e) = stream.start() {
        eprintln!("{}", e);
        exit(1);
    }

    let mut stdout = std::io::stdout();
    loop {
        let record = match stream.get_next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) if e.is_soft() => {
                warn!("{}", e);
                continue;
            }
            Err(e) => {
                eprintln!("{}", e);
                exit(1);
            }
        };

        let lines: Vec<String> = match opts.elems {
            false => vec![format_record(&record, opts.json)],
            true => record
                .elems
                .iter()
                .map(|elem| match opts.json {
                    true => json!({"collector": record.collector, "elem": elem}).to_string(),
                    false => format!("{}|{}", record.collector, elem),
                })
                .collect(),
        };
        for line in lines {
            if let Err(e) = writeln!(stdout, "{}", &line) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    eprintln!("{}", e);
                }
                exit(1);
            }
        }
    }
}
