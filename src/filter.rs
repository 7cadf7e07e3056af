/*!
## Stream Filters

The filter module defines the predicates a stream uses to select data. The same [FilterSet] is
consulted at two levels:

- coarse filtering: data interfaces skip chunks whose project, collector, dump type or time window
  cannot match (see [Filterable] for [ChunkDescriptor]);
- fine filtering: the reader manager drops records outside the time interval and BGP elements
  that fail the element predicates (see [Filterable] for [BgpElem]).

The available filters are (`filter_type` -- definition):
- `project` -- project name, e.g. `ris` or `routeviews`
- `collector` -- collector name, e.g. `rrc00`
- `type` -- dump type (`ribs` or `updates`)
- `peer_asn` -- peer AS number
- `origin_asn` -- origin AS number
- `prefix(_super, _sub, _super_sub)` -- network prefix and match type
- `elem_type` -- element type (`withdraw` or `announce`)
- `as_path` -- regular expression for AS path string

Multiple values of the same filter type are OR-ed, different filter types are AND-ed.

Time intervals and the RIB sampling period are added with dedicated methods. A filter set must
contain a time interval to be valid.

### Example

```
use bgpkit_stream::FilterSet;

let mut filters = FilterSet::new();
filters.add_filter("collector", "rrc00").unwrap();
filters.add_filter("peer_asn", "64500").unwrap();
filters.add_interval(1633046400, Some(1633050000));
assert!(filters.validate().is_ok());
```
*/
use crate::error::StreamError;
use crate::error::StreamError::InvalidFilter;
use crate::models::{ChunkDescriptor, DecodedRecord, DumpType};
use bgpkit_parser::models::{BgpElem, ElemType};
use ipnet::IpNet;
use regex::Regex;
use std::collections::HashSet;
use std::str::FromStr;

/// A single parsed filter.
#[derive(Debug, Clone)]
pub enum Filter {
    Project(String),
    Collector(String),
    DumpType(DumpType),
    PeerAsn(u32),
    OriginAsn(u32),
    Prefix(IpNet, PrefixMatchType),
    ElemType(ElemType),
    AsPath(Regex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatchType {
    Exact,
    IncludeSuper,
    IncludeSub,
    IncludeSuperSub,
}

fn parse_asn(filter_type: &str, filter_value: &str) -> Result<u32, StreamError> {
    u32::from_str(filter_value.trim()).map_err(|_| {
        InvalidFilter(format!(
            "cannot parse {} from {}",
            filter_type.replace('_', " "),
            filter_value
        ))
    })
}

fn parse_prefix(filter_value: &str, match_type: PrefixMatchType) -> Result<Filter, StreamError> {
    match IpNet::from_str(filter_value.trim()) {
        Ok(v) => Ok(Filter::Prefix(v, match_type)),
        Err(_) => Err(InvalidFilter(format!(
            "cannot parse prefix from {}",
            filter_value
        ))),
    }
}

impl Filter {
    pub fn new(filter_type: &str, filter_value: &str) -> Result<Filter, StreamError> {
        match filter_type {
            "project" => Ok(Filter::Project(filter_value.trim().to_string())),
            "collector" => Ok(Filter::Collector(filter_value.trim().to_string())),
            "type" | "record_type" => Ok(Filter::DumpType(DumpType::from_str(
                filter_value.trim(),
            )?)),
            "peer_asn" => Ok(Filter::PeerAsn(parse_asn(filter_type, filter_value)?)),
            "origin_asn" => Ok(Filter::OriginAsn(parse_asn(filter_type, filter_value)?)),
            "prefix" => parse_prefix(filter_value, PrefixMatchType::Exact),
            "prefix_super" => parse_prefix(filter_value, PrefixMatchType::IncludeSuper),
            "prefix_sub" => parse_prefix(filter_value, PrefixMatchType::IncludeSub),
            "prefix_super_sub" => parse_prefix(filter_value, PrefixMatchType::IncludeSuperSub),
            "elem_type" => match filter_value.trim() {
                "w" | "withdraw" | "withdrawal" => Ok(Filter::ElemType(ElemType::WITHDRAW)),
                "a" | "announce" | "announcement" => Ok(Filter::ElemType(ElemType::ANNOUNCE)),
                _ => Err(InvalidFilter(format!(
                    "cannot parse elem type from {}",
                    filter_value
                ))),
            },
            "as_path" => match Regex::from_str(filter_value) {
                Ok(v) => Ok(Filter::AsPath(v)),
                Err(_) => Err(InvalidFilter(format!(
                    "cannot parse AS path regex from {}",
                    filter_value
                ))),
            },
            _ => Err(InvalidFilter(format!("unknown filter type: {}", filter_type))),
        }
    }
}

/// Time interval in unix seconds. Both ends are inclusive; `end = None` never ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i64,
    pub end: Option<i64>,
}

impl Interval {
    pub fn contains(&self, ts: f64) -> bool {
        ts >= self.start as f64
            && match self.end {
                None => true,
                Some(end) => ts <= end as f64,
            }
    }
}

/// Parse a relative interval like `"30 m"`, `"2h"` or `"1 day"` into a number of seconds.
pub fn parse_recent_interval(window: &str) -> Result<i64, StreamError> {
    let duration = humantime::parse_duration(window.trim()).map_err(|e| {
        InvalidFilter(format!("cannot parse recent interval from {}: {}", window, e))
    })?;
    i64::try_from(duration.as_secs())
        .map_err(|_| InvalidFilter(format!("recent interval {} is too long", window)))
}

/// Collection of filters shared by the data interfaces and the reader manager.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub projects: HashSet<String>,
    pub collectors: HashSet<String>,
    pub dump_types: HashSet<DumpType>,
    pub peer_asns: HashSet<u32>,
    pub origin_asns: HashSet<u32>,
    pub prefixes: Vec<(IpNet, PrefixMatchType)>,
    pub elem_types: HashSet<ElemType>,
    pub as_paths: Vec<Regex>,
    pub interval: Option<Interval>,
    /// Minimum number of seconds between two accepted RIB dumps of the same collector.
    pub rib_period: Option<u32>,
}

impl FilterSet {
    pub fn new() -> FilterSet {
        FilterSet::default()
    }

    pub fn add_filter(&mut self, filter_type: &str, filter_value: &str) -> Result<(), StreamError> {
        self.add(Filter::new(filter_type, filter_value)?);
        Ok(())
    }

    pub fn add(&mut self, filter: Filter) {
        match filter {
            Filter::Project(v) => {
                self.projects.insert(v);
            }
            Filter::Collector(v) => {
                self.collectors.insert(v);
            }
            Filter::DumpType(v) => {
                self.dump_types.insert(v);
            }
            Filter::PeerAsn(v) => {
                self.peer_asns.insert(v);
            }
            Filter::OriginAsn(v) => {
                self.origin_asns.insert(v);
            }
            Filter::Prefix(p, t) => self.prefixes.push((p, t)),
            Filter::ElemType(v) => {
                self.elem_types.insert(v);
            }
            Filter::AsPath(v) => self.as_paths.push(v),
        }
    }

    /// Set the time interval. A later call replaces the earlier interval.
    pub fn add_interval(&mut self, start: i64, end: Option<i64>) {
        self.interval = Some(Interval { start, end });
    }

    /// Set the interval to the last `window` (e.g. `"1 h"`) counted back from `now`.
    ///
    /// With `live` set the interval has no end. Returns the resulting interval.
    pub fn add_recent_interval_at(
        &mut self,
        window: &str,
        live: bool,
        now: i64,
    ) -> Result<Interval, StreamError> {
        let secs = parse_recent_interval(window)?;
        let start = now
            .checked_sub(secs)
            .ok_or_else(|| InvalidFilter(format!("recent interval {} is too long", window)))?;
        let interval = Interval {
            start,
            end: if live { None } else { Some(now) },
        };
        self.interval = Some(interval);
        Ok(interval)
    }

    pub fn add_recent_interval(&mut self, window: &str, live: bool) -> Result<Interval, StreamError> {
        self.add_recent_interval_at(window, live, chrono::Utc::now().timestamp())
    }

    pub fn add_rib_period(&mut self, period: u32) {
        self.rib_period = match period {
            0 => None,
            p => Some(p),
        };
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        match &self.interval {
            None => Err(InvalidFilter("no time interval specified".to_string())),
            Some(Interval {
                start,
                end: Some(end),
            }) if end < start => Err(InvalidFilter(format!(
                "interval end {} is before its start {}",
                end, start
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.interval, Some(Interval { end: None, .. }))
    }

    pub fn has_elem_filters(&self) -> bool {
        !self.peer_asns.is_empty()
            || !self.origin_asns.is_empty()
            || !self.prefixes.is_empty()
            || !self.elem_types.is_empty()
            || !self.as_paths.is_empty()
    }

    /// Apply fine filtering to a decoded record.
    ///
    /// Returns `None` if the record falls outside the interval, or if element filters are set and
    /// none of its elements passes them. Otherwise only the passing elements are kept.
    pub fn filter_record(&self, mut record: DecodedRecord) -> Option<DecodedRecord> {
        if let Some(interval) = &self.interval {
            if !interval.contains(record.timestamp) {
                return None;
            }
        }
        if self.has_elem_filters() {
            record.elems.retain(|e| e.match_filter_set(self));
            if record.elems.is_empty() {
                return None;
            }
        }
        Some(record)
    }
}

pub trait Filterable {
    fn match_filter_set(&self, filters: &FilterSet) -> bool;
}

fn prefix_match(match_prefix: &IpNet, input_prefix: &IpNet, t: &PrefixMatchType) -> bool {
    let exact = input_prefix == match_prefix;
    match t {
        PrefixMatchType::Exact => exact,
        PrefixMatchType::IncludeSuper => input_prefix.contains(match_prefix),
        PrefixMatchType::IncludeSub => match_prefix.contains(input_prefix),
        PrefixMatchType::IncludeSuperSub => {
            input_prefix.contains(match_prefix) || match_prefix.contains(input_prefix)
        }
    }
}

impl Filterable for BgpElem {
    fn match_filter_set(&self, filters: &FilterSet) -> bool {
        if !filters.peer_asns.is_empty() && !filters.peer_asns.iter().any(|v| self.peer_asn == *v)
        {
            return false;
        }
        if !filters.origin_asns.is_empty() {
            let matched = match &self.origin_asns {
                Some(origins) => origins
                    .iter()
                    .any(|o| filters.origin_asns.iter().any(|v| *o == *v)),
                None => false,
            };
            if !matched {
                return false;
            }
        }
        if !filters.prefixes.is_empty()
            && !filters
                .prefixes
                .iter()
                .any(|(p, t)| prefix_match(p, &self.prefix.prefix, t))
        {
            return false;
        }
        if !filters.elem_types.is_empty() && !filters.elem_types.contains(&self.elem_type) {
            return false;
        }
        if !filters.as_paths.is_empty() {
            let path = match &self.as_path {
                Some(path) => path.to_string(),
                None => return false,
            };
            if !filters.as_paths.iter().any(|r| r.is_match(path.as_str())) {
                return false;
            }
        }
        true
    }
}

impl Filterable for ChunkDescriptor {
    fn match_filter_set(&self, filters: &FilterSet) -> bool {
        if !filters.projects.is_empty() && !filters.projects.contains(&self.project) {
            return false;
        }
        if !filters.collectors.is_empty() && !filters.collectors.contains(&self.collector) {
            return false;
        }
        if !filters.dump_types.is_empty() && !filters.dump_types.contains(&self.dump_type) {
            return false;
        }
        match &filters.interval {
            None => true,
            Some(interval) => {
                let started = match interval.end {
                    None => true,
                    Some(end) => self.file_time <= end,
                };
                started && self.end_time() >= interval.start
            }
        }
    }
}
