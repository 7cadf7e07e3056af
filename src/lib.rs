/*!
bgpkit-stream streams BGP dump records from pluggable data interfaces, in time order.

A [BgpStream] asks a data interface (a catalog of MRT dump files: BGPKIT Broker, a SQLite
database, a CSV file, or just one or two files) which chunks of data match the configured
filters, opens them, and merges their records by timestamp. Consumers only ever call
[get_next_record][BgpStream::get_next_record].

In live mode (an interval without end) the stream keeps polling the data interface with a
growing backoff delay, and `get_next_record` blocks until new data shows up.

# Example

Read one hour of RIPE RIS rrc00 updates listed in a CSV catalog, keeping only the elements of
peer AS64500:

```no_run
use bgpkit_stream::BgpStream;

let mut stream = BgpStream::new();
let csv = stream.data_interface_id_by_name("csvfile").unwrap();
stream.set_data_interface(csv).unwrap();
stream
    .set_data_interface_option(csv, "csv-file", "https://example.com/catalog.csv")
    .unwrap();
stream.add_filter("collector", "rrc00").unwrap();
stream.add_filter("type", "updates").unwrap();
stream.add_filter("peer_asn", "64500").unwrap();
stream.add_interval_filter(1633046400, Some(1633050000));
stream.start().unwrap();

for elem in stream.into_elem_iter() {
    println!("{}", elem);
}
```

# Custom data interfaces

Any catalog can feed a stream by implementing [DataInterface][datasource::DataInterface] and
registering it with [BgpStream::register_data_interface].
*/
pub mod datasource;
pub mod error;
pub mod filter;
pub mod input;
pub mod iters;
pub mod models;
pub mod reader;
pub mod stream;

pub use datasource::{
    BackoffGrowth, BackoffPolicy, DataInterface, DataInterfaceId, DataInterfaceInfo,
    DataInterfaceOption,
};
pub use error::StreamError;
pub use filter::{Filter, FilterSet, Filterable};
pub use iters::{ElemIterator, FallibleRecordIterator, RecordIterator};
pub use models::*;
pub use reader::{ChunkDecoder, DecoderFactory, MrtDecoderFactory};
pub use stream::{BgpStream, StreamStatus};
