//! Streams MRT files written to disk through the CSV and SQLite catalogs.
use bgpkit_parser::encoder::MrtUpdatesEncoder;
use bgpkit_parser::models::{AsPath, Asn, BgpElem, NetworkPrefix, Origin};
use bgpkit_stream::{BgpStream, DumpType};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

fn elem(ts: f64, peer_asn: u32, prefix: &str) -> BgpElem {
    BgpElem {
        timestamp: ts,
        peer_ip: IpAddr::from_str("10.0.0.1").unwrap(),
        peer_asn: Asn::from(peer_asn),
        prefix: NetworkPrefix::from_str(prefix).unwrap(),
        next_hop: Some(IpAddr::from_str("10.0.0.1").unwrap()),
        as_path: Some(AsPath::from_sequence([peer_asn, 174])),
        origin: Some(Origin::IGP),
        ..Default::default()
    }
}

fn write_updates(dir: &Path, name: &str, elems: &[BgpElem]) -> PathBuf {
    let mut encoder = MrtUpdatesEncoder::new();
    for e in elems {
        encoder.process_elem(e);
    }
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&encoder.export_bytes()).unwrap();
    path
}

/// Two collectors, five minutes of updates each, starting at 1000.
fn setup_dumps() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let rrc00 = write_updates(
        dir.path(),
        "rrc00.updates.mrt",
        &[
            elem(1000.0, 64500, "10.0.0.0/24"),
            elem(1010.0, 64501, "10.0.1.0/24"),
            elem(1020.0, 64500, "10.0.2.0/24"),
        ],
    );
    let rrc01 = write_updates(
        dir.path(),
        "rrc01.updates.mrt",
        &[
            elem(1005.0, 64500, "10.1.0.0/24"),
            elem(1015.0, 64500, "10.1.1.0/24"),
        ],
    );
    (dir, rrc00, rrc01)
}

fn collect(stream: &mut BgpStream) -> Vec<(String, f64)> {
    let mut out = vec![];
    while let Some(record) = stream.get_next_record().unwrap() {
        assert_eq!(record.dump_type, DumpType::Update);
        assert_eq!(record.dump_time, 1000);
        out.push((record.collector.clone(), record.timestamp));
    }
    out
}

fn expected() -> Vec<(String, f64)> {
    vec![
        ("rrc00".to_string(), 1000.0),
        ("rrc01".to_string(), 1005.0),
        ("rrc01".to_string(), 1015.0),
        ("rrc00".to_string(), 1020.0),
    ]
}

#[test]
fn stream_from_csv_catalog() {
    let (dir, rrc00, rrc01) = setup_dumps();
    let catalog = dir.path().join("catalog.csv");
    std::fs::write(
        &catalog,
        format!(
            "path,project,collector,type,file_time,time_span,ts\n\
             {},ris,rrc00,updates,1000,300,1400\n\
             {},ris,rrc01,updates,1000,300,1410\n",
            rrc00.display(),
            rrc01.display()
        ),
    )
    .unwrap();

    let mut stream = BgpStream::new();
    let csv = stream.data_interface_id_by_name("csvfile").unwrap();
    stream.set_data_interface(csv).unwrap();
    stream
        .set_data_interface_option(csv, "csv-file", catalog.to_str().unwrap())
        .unwrap();
    stream.add_filter("peer_asn", "64500").unwrap();
    stream.add_interval_filter(1000, Some(1300));
    stream.start().unwrap();

    assert_eq!(collect(&mut stream), expected());
}

#[cfg(feature = "sqlite")]
#[test]
fn stream_from_sqlite_catalog() {
    let (dir, rrc00, rrc01) = setup_dumps();
    let db = dir.path().join("catalog.sqlite");
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE bgp_data (
            path TEXT NOT NULL, project TEXT NOT NULL, collector TEXT NOT NULL,
            type TEXT NOT NULL, file_time INTEGER NOT NULL, time_span INTEGER NOT NULL,
            ts INTEGER NOT NULL
        );",
    )
    .unwrap();
    for (path, collector) in [(&rrc00, "rrc00"), (&rrc01, "rrc01")] {
        conn.execute(
            "INSERT INTO bgp_data VALUES (?1, 'ris', ?2, 'updates', 1000, 300, 1400)",
            rusqlite::params![path.to_str().unwrap(), collector],
        )
        .unwrap();
    }
    drop(conn);

    let mut stream = BgpStream::new();
    let sqlite = stream.data_interface_id_by_name("sqlite").unwrap();
    stream.set_data_interface(sqlite).unwrap();
    stream
        .set_data_interface_option(sqlite, "db-file", db.to_str().unwrap())
        .unwrap();
    stream.add_filter("peer_asn", "64500").unwrap();
    stream.add_interval_filter(1000, Some(1300));
    stream.start().unwrap();

    assert_eq!(collect(&mut stream), expected());
}

#[test]
fn stream_single_file() {
    let (_dir, rrc00, _) = setup_dumps();

    let mut stream = BgpStream::new();
    let id = stream.data_interface_id_by_name("singlefile").unwrap();
    stream.set_data_interface(id).unwrap();
    stream
        .set_data_interface_option(id, "upd-file", rrc00.to_str().unwrap())
        .unwrap();
    stream.add_filter("prefix", "10.0.1.0/24").unwrap();
    stream.add_interval_filter(0, Some(2000));
    stream.start().unwrap();

    let records: Vec<_> = stream.into_record_iter().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 1010.0);
    assert_eq!(records[0].elems[0].peer_asn, 64501);
}
