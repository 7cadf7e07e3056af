//! Data interface backed by the BGPKIT Broker remote catalog.

use crate::datasource::{set_option_value, Cursor, DataInterface, DataInterfaceOption};
use crate::error::StreamError;
use crate::filter::{FilterSet, Filterable};
use crate::models::chunk::sort_chunks;
use crate::models::{ChunkDescriptor, DumpType};
use bgpkit_broker::{BgpkitBroker, BrokerItem};
use log::{debug, warn};

const DEFAULT_BROKER_URL: &str = "https://api.bgpkit.com/v3/broker";

pub struct BrokerInterface {
    options: Vec<DataInterfaceOption>,
}

impl Default for BrokerInterface {
    fn default() -> Self {
        BrokerInterface::new()
    }
}

impl BrokerInterface {
    pub fn new() -> Self {
        BrokerInterface {
            options: vec![DataInterfaceOption::new("url", "broker API endpoint")
                .with_default(DEFAULT_BROKER_URL)
                .required()],
        }
    }
}

/// Project a broker collector belongs to.
///
/// Broker items carry the collector name but no project. RIPE RIS collectors are named
/// `rrcNN`; every other collector the broker indexes belongs to RouteViews.
fn project_of(collector: &str) -> &'static str {
    match collector.starts_with("rrc") {
        true => "ris",
        false => "routeviews",
    }
}

fn item_to_chunk(item: &BrokerItem) -> Option<ChunkDescriptor> {
    let dump_type = match item.data_type.as_str() {
        "rib" | "ribs" => DumpType::Rib,
        "update" | "updates" => DumpType::Update,
        t => {
            warn!("broker: skipping {} with unknown data type {}", item.url, t);
            return None;
        }
    };
    let file_time = item.ts_start.and_utc().timestamp();
    let time_span = item.ts_end.and_utc().timestamp() - file_time;
    Some(ChunkDescriptor::new(
        project_of(&item.collector_id),
        &item.collector_id,
        dump_type,
        &item.url,
        file_time,
        time_span.max(0),
    ))
}

impl DataInterface for BrokerInterface {
    fn name(&self) -> &'static str {
        "broker"
    }

    fn description(&self) -> &'static str {
        "Retrieve metadata information from the BGPKIT Broker API"
    }

    fn options(&self) -> &[DataInterfaceOption] {
        &self.options
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), StreamError> {
        set_option_value(self.name(), &mut self.options, name, value)
    }

    fn query(
        &mut self,
        filters: &FilterSet,
        cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
        let interval = filters.interval.ok_or_else(|| {
            StreamError::InvalidFilter("broker queries need a time interval".to_string())
        })?;
        let start = match cursor.as_timestamp()? {
            Some(after) => after.max(interval.start),
            None => interval.start,
        };
        let end = interval
            .end
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        if end < start {
            return Ok((vec![], cursor.clone()));
        }

        let url = super::option_value(&self.options, "url").unwrap_or(DEFAULT_BROKER_URL);
        let mut broker = BgpkitBroker::new()
            .broker_url(url)
            .ts_start(start.to_string().as_str())
            .ts_end(end.to_string().as_str());
        if filters.collectors.len() == 1 {
            if let Some(collector) = filters.collectors.iter().next() {
                broker = broker.collector_id(collector.as_str());
            }
        }
        if filters.dump_types.len() == 1 {
            if let Some(dump_type) = filters.dump_types.iter().next() {
                let data_type = match dump_type {
                    DumpType::Rib => "rib",
                    DumpType::Update => "updates",
                };
                broker = broker.data_type(data_type);
            }
        }

        debug!("broker: querying {} for [{}, {}]", url, start, end);
        let items = broker
            .query()
            .map_err(|e| StreamError::BackendUnavailable(format!("broker query failed: {}", e)))?;

        let mut latest = cursor.as_timestamp()?;
        let mut chunks = vec![];
        for chunk in items.iter().filter_map(item_to_chunk) {
            latest = Some(latest.map_or(chunk.file_time, |l| l.max(chunk.file_time)));
            if chunk.match_filter_set(filters) {
                chunks.push(chunk);
            }
        }
        sort_chunks(&mut chunks);
        let next = match latest {
            Some(ts) => Cursor::from_timestamp(ts),
            None => cursor.clone(),
        };
        Ok((chunks, next))
    }
}
