/*!
Data interfaces discover chunks of dump data, and the [DataSourceManager] drives the selected one.

A [DataInterface] knows how to ask one catalog technology "which chunks match these filters and
were published after this cursor". The manager keeps a registration table of interfaces, selects
one at runtime by id or name, and turns its answers into descriptors on the input queue, with
duplicate suppression, RIB sampling and the live-mode backoff loop on top.

Built-in interfaces:
- `broker` (feature `broker`): remote catalog served by BGPKIT Broker
- `sqlite` (feature `sqlite`): embedded SQLite catalog
- `csvfile`: CSV file catalog, local or remote
- `singlefile`: one RIB file and/or one updates file
*/
pub mod backoff;
#[cfg(feature = "broker")]
pub mod broker;
pub mod csvfile;
pub mod singlefile;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backoff::{Backoff, BackoffGrowth, BackoffPolicy};

use crate::error::StreamError;
use crate::filter::{FilterSet, Filterable};
use crate::input::InputQueue;
use crate::models::chunk::sort_chunks;
use crate::models::{ChunkDescriptor, ChunkKey, DumpType};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// Position of a data interface in the manager's registration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataInterfaceId(usize);

impl Display for DataInterfaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInterfaceInfo {
    pub id: DataInterfaceId,
    pub name: &'static str,
    pub description: &'static str,
}

/// One configuration option of a data interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInterfaceOption {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<String>,
    pub value: Option<String>,
    pub required: bool,
}

impl DataInterfaceOption {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        DataInterfaceOption {
            name,
            description,
            default: None,
            value: None,
            required: false,
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Current value, falling back to the default.
    pub fn effective_value(&self) -> Option<&str> {
        self.value.as_deref().or(self.default.as_deref())
    }
}

/// Set `name` to `value` in an option table, failing on unknown names.
pub(crate) fn set_option_value(
    interface: &str,
    options: &mut [DataInterfaceOption],
    name: &str,
    value: &str,
) -> Result<(), StreamError> {
    match options.iter_mut().find(|o| o.name == name) {
        Some(option) => {
            option.value = Some(value.to_string());
            Ok(())
        }
        None => Err(StreamError::UnknownOption {
            interface: interface.to_string(),
            option: name.to_string(),
        }),
    }
}

pub(crate) fn option_value<'a>(options: &'a [DataInterfaceOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.effective_value())
}

/// Position of a data interface in its catalog, opaque to everything but the interface itself.
///
/// A fresh stream starts from [Cursor::start].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cursor(Option<String>);

impl Cursor {
    pub fn start() -> Self {
        Cursor(None)
    }

    pub fn new(value: impl Into<String>) -> Self {
        Cursor(Some(value.into()))
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Read a cursor written by [Cursor::from_timestamp].
    pub fn as_timestamp(&self) -> Result<Option<i64>, StreamError> {
        match &self.0 {
            None => Ok(None),
            Some(v) => v.parse::<i64>().map(Some).map_err(|_| {
                StreamError::BackendMisconfigured(format!("invalid timestamp cursor {}", v))
            }),
        }
    }

    pub fn from_timestamp(ts: i64) -> Self {
        Cursor(Some(ts.to_string()))
    }
}

/// A catalog technology that can list the chunks available for a filter set.
///
/// `query` must be idempotent with respect to `cursor`: querying twice with the same cursor and
/// filters against an unchanged catalog returns the same chunks.
pub trait DataInterface: Send {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn options(&self) -> &[DataInterfaceOption];

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), StreamError>;

    /// Check that the configuration is complete. Called by `start`.
    fn validate(&self) -> Result<(), StreamError> {
        match self
            .options()
            .iter()
            .find(|o| o.required && o.effective_value().is_none())
        {
            Some(option) => Err(StreamError::MissingOption {
                interface: self.name().to_string(),
                option: option.name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Acquire whatever the interface needs to answer queries.
    fn start(&mut self) -> Result<(), StreamError> {
        Ok(())
    }

    /// List chunks matching `filters` that come after `cursor`, and the cursor to use next.
    fn query(
        &mut self,
        filters: &FilterSet,
        cursor: &Cursor,
    ) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError>;
}

/// One row of a chunk catalog, with `published` the time the row was added to the catalog.
pub(crate) struct CatalogRow {
    pub chunk: ChunkDescriptor,
    pub published: i64,
}

/// Select the catalog rows published after `cursor` that pass coarse filtering.
///
/// The next cursor is the latest publication time among the rows after `cursor`, whether they
/// match the filters or not.
pub(crate) fn select_published(
    rows: impl IntoIterator<Item = CatalogRow>,
    filters: &FilterSet,
    cursor: &Cursor,
) -> Result<(Vec<ChunkDescriptor>, Cursor), StreamError> {
    let after = cursor.as_timestamp()?;
    let mut latest = after;
    let mut chunks = vec![];
    for row in rows {
        if let Some(after) = after {
            if row.published <= after {
                continue;
            }
        }
        latest = Some(latest.map_or(row.published, |l| l.max(row.published)));
        if row.chunk.match_filter_set(filters) {
            chunks.push(row.chunk);
        }
    }
    sort_chunks(&mut chunks);
    let next = match latest {
        Some(ts) => Cursor::from_timestamp(ts),
        None => cursor.clone(),
    };
    Ok((chunks, next))
}

/// Built-in data interfaces, in registration order.
fn builtin_interfaces() -> Vec<Box<dyn DataInterface>> {
    let mut interfaces: Vec<Box<dyn DataInterface>> = vec![];
    #[cfg(feature = "broker")]
    interfaces.push(Box::new(broker::BrokerInterface::new()));
    #[cfg(feature = "sqlite")]
    interfaces.push(Box::new(sqlite::SqliteInterface::new()));
    interfaces.push(Box::new(csvfile::CsvFileInterface::new()));
    interfaces.push(Box::new(singlefile::SingleFileInterface::new()));
    interfaces
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceStatus {
    On,
    Off,
    Error,
}

/// Chunks older than this many seconds behind the newest chunk are forgotten by duplicate
/// suppression.
const DEDUP_HORIZON_SECS: i64 = 7 * 86400;

pub struct DataSourceManager {
    interfaces: Vec<Box<dyn DataInterface>>,
    active: Option<DataInterfaceId>,
    blocking: bool,
    backoff: Backoff,
    status: DataSourceStatus,
    cursor: Cursor,
    seen: HashSet<ChunkKey>,
    newest_file_time: i64,
    last_rib: HashMap<String, i64>,
}

impl Default for DataSourceManager {
    fn default() -> Self {
        DataSourceManager::new()
    }
}

impl DataSourceManager {
    /// Create a manager with the built-in interfaces registered and the first one selected.
    pub fn new() -> DataSourceManager {
        DataSourceManager::with_interfaces(builtin_interfaces())
    }

    pub fn with_interfaces(interfaces: Vec<Box<dyn DataInterface>>) -> DataSourceManager {
        let active = match interfaces.is_empty() {
            true => None,
            false => Some(DataInterfaceId(0)),
        };
        DataSourceManager {
            interfaces,
            active,
            blocking: false,
            backoff: Backoff::new(BackoffPolicy::default()),
            status: DataSourceStatus::Off,
            cursor: Cursor::start(),
            seen: HashSet::new(),
            newest_file_time: i64::MIN,
            last_rib: HashMap::new(),
        }
    }

    /// Add a data interface to the registration table.
    ///
    /// Fails if an interface with the same name is already registered.
    pub fn register(
        &mut self,
        interface: Box<dyn DataInterface>,
    ) -> Result<DataInterfaceId, StreamError> {
        if self.id_by_name(interface.name()).is_some() {
            return Err(StreamError::BackendMisconfigured(format!(
                "data interface {} already registered",
                interface.name()
            )));
        }
        self.interfaces.push(interface);
        let id = DataInterfaceId(self.interfaces.len() - 1);
        if self.active.is_none() {
            self.active = Some(id);
        }
        Ok(id)
    }

    pub fn interfaces(&self) -> Vec<DataInterfaceId> {
        (0..self.interfaces.len()).map(DataInterfaceId).collect()
    }

    pub fn id_by_name(&self, name: &str) -> Option<DataInterfaceId> {
        self.interfaces
            .iter()
            .position(|i| i.name() == name)
            .map(DataInterfaceId)
    }

    fn interface(&self, id: DataInterfaceId) -> Result<&dyn DataInterface, StreamError> {
        self.interfaces
            .get(id.0)
            .map(|i| i.as_ref())
            .ok_or_else(|| StreamError::UnknownInterface(id.to_string()))
    }

    pub fn info(&self, id: DataInterfaceId) -> Result<DataInterfaceInfo, StreamError> {
        let interface = self.interface(id)?;
        Ok(DataInterfaceInfo {
            id,
            name: interface.name(),
            description: interface.description(),
        })
    }

    pub fn options(&self, id: DataInterfaceId) -> Result<&[DataInterfaceOption], StreamError> {
        Ok(self.interface(id)?.options())
    }

    pub fn set_option(
        &mut self,
        id: DataInterfaceId,
        name: &str,
        value: &str,
    ) -> Result<(), StreamError> {
        match self.interfaces.get_mut(id.0) {
            Some(interface) => interface.set_option(name, value),
            None => Err(StreamError::UnknownInterface(id.to_string())),
        }
    }

    pub fn set_interface(&mut self, id: DataInterfaceId) -> Result<(), StreamError> {
        self.interface(id)?;
        self.active = Some(id);
        Ok(())
    }

    pub fn active_interface(&self) -> Option<DataInterfaceId> {
        self.active
    }

    pub fn set_blocking(&mut self) {
        self.blocking = true;
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn set_backoff(&mut self, policy: BackoffPolicy) {
        self.backoff = Backoff::new(policy);
    }

    pub fn status(&self) -> DataSourceStatus {
        self.status
    }

    /// Validate and start the selected interface.
    pub fn start(&mut self) -> Result<(), StreamError> {
        let id = self.active.ok_or_else(|| {
            StreamError::BackendMisconfigured("no data interface selected".to_string())
        })?;
        let interface = self
            .interfaces
            .get_mut(id.0)
            .ok_or_else(|| StreamError::UnknownInterface(id.to_string()))?;
        let result = interface.validate().and_then(|_| interface.start());
        match result {
            Ok(()) => {
                debug!("data interface {} started", interface.name());
                self.status = DataSourceStatus::On;
                Ok(())
            }
            Err(e) => {
                error!("cannot start data interface {}: {}", interface.name(), e);
                self.status = DataSourceStatus::Error;
                Err(e)
            }
        }
    }

    /// Query the selected interface and append the new chunks to `queue`.
    ///
    /// Returns the number of chunks appended. In batch mode a single query is run and `0` means
    /// there is no more data. In blocking mode empty results and transient errors are retried
    /// after the backoff delay, so the call only returns once chunks are available or a
    /// non-transient error occurs.
    pub fn fetch(
        &mut self,
        filters: &FilterSet,
        queue: &mut InputQueue,
    ) -> Result<usize, StreamError> {
        let id = match (self.status, self.active) {
            (DataSourceStatus::Off, _) | (_, None) => {
                return Err(StreamError::BackendMisconfigured(
                    "data interface not started".to_string(),
                ))
            }
            (_, Some(id)) => id,
        };

        loop {
            let interface = &mut self.interfaces[id.0];
            let name = interface.name();
            match interface.query(filters, &self.cursor) {
                Ok((chunks, next_cursor)) => {
                    self.status = DataSourceStatus::On;
                    self.cursor = next_cursor;
                    let found = chunks.len();
                    let admitted = self.admit(chunks, filters);
                    info!(
                        "{}: {} chunks found, {} new",
                        name,
                        found,
                        admitted.len()
                    );
                    if !admitted.is_empty() {
                        self.backoff.reset();
                        let count = admitted.len();
                        queue.push_many(admitted);
                        return Ok(count);
                    }
                    if !self.blocking {
                        return Ok(0);
                    }
                    let delay = self.backoff.next_delay();
                    debug!("{}: no new data, polling again in {:?}", name, delay);
                    std::thread::sleep(delay);
                }
                Err(e) if self.blocking && e.is_transient() => {
                    let delay = self.backoff.next_delay();
                    warn!("{}: {}, retrying in {:?}", name, e, delay);
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    error!("{}: {}", name, e);
                    self.status = DataSourceStatus::Error;
                    return Err(e);
                }
            }
        }
    }

    /// Drop chunks already delivered and RIBs inside the sampling period.
    fn admit(&mut self, chunks: Vec<ChunkDescriptor>, filters: &FilterSet) -> Vec<ChunkDescriptor> {
        let mut admitted = vec![];
        for chunk in chunks {
            if !self.seen.insert(chunk.key()) {
                debug!("skipping already delivered chunk {}", chunk.locator);
                continue;
            }
            self.newest_file_time = self.newest_file_time.max(chunk.file_time);
            if let (DumpType::Rib, Some(period)) = (chunk.dump_type, filters.rib_period) {
                if let Some(last) = self.last_rib.get(&chunk.collector) {
                    if chunk.file_time < last + period as i64 {
                        debug!("skipping RIB {} inside sampling period", chunk.locator);
                        continue;
                    }
                }
                self.last_rib.insert(chunk.collector.clone(), chunk.file_time);
            }
            admitted.push(chunk);
        }

        let horizon = self.newest_file_time.saturating_sub(DEDUP_HORIZON_SECS);
        self.seen.retain(|(_, _, file_time)| *file_time >= horizon);
        admitted
    }

    pub fn close(&mut self) {
        self.status = DataSourceStatus::Off;
    }
}
