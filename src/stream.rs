/*!
The [BgpStream] ties the pipeline together behind a single pull operation.

```text
get_next_record
  -> reader manager has an open chunk?      yes: return its next record
  -> input queue empty?                     yes: data source manager fetch
  -> pop a batch from the input queue, open it in the reader manager, loop
```

A stream is configured while [Allocated][StreamStatus::Allocated], started once, and then only
read from. Configuration calls made after `start` are ignored with a warning.

### Example

```no_run
use bgpkit_stream::BgpStream;

let mut stream = BgpStream::new();
let csv = stream.data_interface_id_by_name("csvfile").unwrap();
stream.set_data_interface(csv).unwrap();
stream
    .set_data_interface_option(csv, "csv-file", "catalog.csv")
    .unwrap();
stream.add_filter("collector", "rrc00").unwrap();
stream.add_interval_filter(1633046400, Some(1633050000));
stream.start().unwrap();

while let Some(record) = stream.get_next_record().unwrap() {
    for elem in record.elems {
        println!("{}", elem);
    }
}
```
*/
use crate::datasource::{
    BackoffPolicy, DataInterface, DataInterfaceId, DataInterfaceInfo, DataInterfaceOption,
    DataSourceManager,
};
use crate::error::StreamError;
use crate::filter::{FilterSet, Interval};
use crate::input::InputQueue;
use crate::models::BgpStreamRecord;
use crate::reader::{DecoderFactory, ReaderManager};
use log::{debug, info, warn};

/// Lifecycle of a [BgpStream]: `Allocated -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Allocated,
    Running,
    Stopped,
}

pub struct BgpStream {
    filters: FilterSet,
    datasource: DataSourceManager,
    input: InputQueue,
    readers: ReaderManager,
    status: StreamStatus,
    exhausted: bool,
}

impl Default for BgpStream {
    fn default() -> Self {
        BgpStream::new()
    }
}

impl BgpStream {
    /// Create a stream with the built-in data interfaces and the MRT decoder.
    pub fn new() -> BgpStream {
        BgpStream::with_data_source(DataSourceManager::new())
    }

    /// Create a stream around a data source manager, e.g. one with custom interfaces only.
    pub fn with_data_source(datasource: DataSourceManager) -> BgpStream {
        BgpStream {
            filters: FilterSet::new(),
            datasource,
            input: InputQueue::new(),
            readers: ReaderManager::default(),
            status: StreamStatus::Allocated,
            exhausted: false,
        }
    }

    /// Replace the decoder used to open chunks.
    pub fn with_decoder_factory<F: DecoderFactory + 'static>(mut self, factory: F) -> Self {
        self.readers.set_factory(Box::new(factory));
        self
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn is_live(&self) -> bool {
        self.datasource.is_blocking()
    }

    /// Whether configuration calls still take effect. Logs the ignored call otherwise.
    fn configurable(&self, operation: &str) -> bool {
        if self.status == StreamStatus::Allocated {
            return true;
        }
        warn!("ignoring {} on a {:?} stream", operation, self.status);
        false
    }

    /// Add a filter, see [crate::filter] for the available types.
    pub fn add_filter(&mut self, filter_type: &str, filter_value: &str) -> Result<(), StreamError> {
        if !self.configurable("add filter") {
            return Ok(());
        }
        self.filters.add_filter(filter_type, filter_value)
    }

    /// Set the time interval. Without an end the stream runs in live mode.
    pub fn add_interval_filter(&mut self, start: i64, end: Option<i64>) {
        if !self.configurable("add interval filter") {
            return;
        }
        self.filters.add_interval(start, end);
        if end.is_none() {
            self.datasource.set_blocking();
        }
    }

    /// Set the time interval to the most recent `window`, e.g. `"2 h"`.
    pub fn add_recent_interval_filter(&mut self, window: &str, live: bool) -> Result<(), StreamError> {
        if !self.configurable("add recent interval filter") {
            return Ok(());
        }
        let Interval { start, end } = self.filters.add_recent_interval(window, live)?;
        debug!("recent interval {}: [{}, {:?}]", window, start, end);
        if live {
            self.datasource.set_blocking();
        }
        Ok(())
    }

    /// Accept at most one RIB dump per collector every `period` seconds. `0` accepts all.
    pub fn add_rib_period_filter(&mut self, period: u32) {
        if !self.configurable("add rib period filter") {
            return;
        }
        self.filters.add_rib_period(period);
    }

    pub fn data_interfaces(&self) -> Vec<DataInterfaceId> {
        self.datasource.interfaces()
    }

    pub fn data_interface_id_by_name(&self, name: &str) -> Option<DataInterfaceId> {
        self.datasource.id_by_name(name)
    }

    pub fn data_interface_info(&self, id: DataInterfaceId) -> Result<DataInterfaceInfo, StreamError> {
        self.datasource.info(id)
    }

    pub fn data_interface_options(
        &self,
        id: DataInterfaceId,
    ) -> Result<&[DataInterfaceOption], StreamError> {
        self.datasource.options(id)
    }

    /// Look up one option of a data interface by name.
    pub fn data_interface_option_by_name(
        &self,
        id: DataInterfaceId,
        name: &str,
    ) -> Option<&DataInterfaceOption> {
        self.datasource
            .options(id)
            .ok()?
            .iter()
            .find(|o| o.name == name)
    }

    /// The data interface the stream will read from.
    pub fn data_interface_id(&self) -> Option<DataInterfaceId> {
        self.datasource.active_interface()
    }

    pub fn set_data_interface_option(
        &mut self,
        id: DataInterfaceId,
        name: &str,
        value: &str,
    ) -> Result<(), StreamError> {
        if !self.configurable("set data interface option") {
            return Ok(());
        }
        self.datasource.set_option(id, name, value)
    }

    pub fn set_data_interface(&mut self, id: DataInterfaceId) -> Result<(), StreamError> {
        if !self.configurable("set data interface") {
            return Ok(());
        }
        self.datasource.set_interface(id)
    }

    /// Make a custom data interface available to this stream.
    pub fn register_data_interface(
        &mut self,
        interface: Box<dyn DataInterface>,
    ) -> Result<DataInterfaceId, StreamError> {
        if self.status != StreamStatus::Allocated {
            return Err(StreamError::WrongState {
                operation: "register data interface",
                status: self.status,
            });
        }
        self.datasource.register(interface)
    }

    /// Keep polling the data interface for new data instead of ending the stream.
    pub fn set_live_mode(&mut self) {
        if !self.configurable("set live mode") {
            return;
        }
        self.datasource.set_blocking();
    }

    pub fn set_backoff(&mut self, policy: BackoffPolicy) {
        if !self.configurable("set backoff") {
            return;
        }
        self.datasource.set_backoff(policy);
    }

    /// Validate the configuration and start the data interface.
    ///
    /// On failure the stream stays [Allocated][StreamStatus::Allocated] and can be reconfigured
    /// and started again.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.status != StreamStatus::Allocated {
            return Err(StreamError::WrongState {
                operation: "start",
                status: self.status,
            });
        }
        self.filters.validate()?;
        if self.filters.is_live() {
            self.datasource.set_blocking();
        }
        self.datasource.start()?;
        self.status = StreamStatus::Running;
        info!(
            "stream started, {} mode",
            match self.is_live() {
                true => "live",
                false => "batch",
            }
        );
        Ok(())
    }

    /// Return the next record in time order.
    ///
    /// - `Ok(Some(record))`: the next record
    /// - `Ok(None)`: the stream is over; every later call returns `Ok(None)` too. Never happens
    ///   in live mode, where the call blocks until new data shows up.
    /// - `Err(e)`: if [e.is_soft()][StreamError::is_soft] only one chunk was lost and the stream
    ///   can be read further; otherwise the data interface failed.
    pub fn get_next_record(&mut self) -> Result<Option<BgpStreamRecord>, StreamError> {
        if self.status != StreamStatus::Running {
            return Err(StreamError::WrongState {
                operation: "get next record",
                status: self.status,
            });
        }
        if self.exhausted {
            return Ok(None);
        }

        loop {
            if !self.readers.is_empty() {
                if let Some(record) = self.readers.get_next_record(&self.filters)? {
                    return Ok(Some(record));
                }
            }
            if self.input.is_empty() {
                let found = self.datasource.fetch(&self.filters, &mut self.input)?;
                if found == 0 {
                    info!("no more data, end of stream");
                    self.exhausted = true;
                    return Ok(None);
                }
            }
            let batch = self.input.pop_batch();
            debug!(
                "opening {} chunks, {} left in input queue",
                batch.len(),
                self.input.len()
            );
            self.readers.add(batch, &self.filters);
        }
    }

    /// Stop reading: open chunks and queued chunks are released.
    pub fn stop(&mut self) {
        if self.status == StreamStatus::Stopped {
            return;
        }
        self.readers.clear();
        self.input.clear();
        self.datasource.close();
        self.status = StreamStatus::Stopped;
        debug!("stream stopped");
    }

    /// Release everything the stream holds. Safe to call more than once, and run on drop.
    pub fn close(&mut self) {
        self.stop();
    }
}

impl Drop for BgpStream {
    fn drop(&mut self) {
        self.close();
    }
}
