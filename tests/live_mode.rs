mod common;

use bgpkit_stream::{BackoffPolicy, StreamError};
use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[test]
fn live_mode_waits_for_new_data() {
    let (interface, queries) = ScriptedInterface::new(vec![
        Ok(vec![]),
        Ok(vec![]),
        Ok(vec![]),
        Ok(vec![updates("rrc00", "late", 600)]),
    ]);
    let factory = MemoryDecoderFactory::new().with_chunk("late", records(&[610.0, 620.0]));
    let mut stream = stream_with(interface, factory);
    stream.add_interval_filter(0, None);
    stream.set_backoff(BackoffPolicy::fixed(Duration::from_millis(1)));
    assert!(stream.is_live());
    stream.start().unwrap();

    let record = stream.get_next_record().unwrap().unwrap();
    assert_eq!(record.timestamp, 610.0);
    assert_eq!(queries.load(Ordering::SeqCst), 4);
    let record = stream.get_next_record().unwrap().unwrap();
    assert_eq!(record.timestamp, 620.0);
}

#[test]
fn live_mode_retries_transient_errors() {
    let (interface, queries) = ScriptedInterface::new(vec![
        Err(StreamError::BackendUnavailable("timeout".to_string())),
        Ok(vec![]),
        Err(StreamError::BackendUnavailable("timeout".to_string())),
        Ok(vec![updates("rrc00", "a", 0)]),
    ]);
    let factory = MemoryDecoderFactory::new().with_chunk("a", records(&[10.0]));
    let mut stream = stream_with(interface, factory);
    stream.add_interval_filter(0, Some(300));
    stream.set_live_mode();
    stream.set_backoff(BackoffPolicy::fixed(Duration::from_millis(1)));
    stream.start().unwrap();

    let record = stream.get_next_record().unwrap().unwrap();
    assert_eq!(record.timestamp, 10.0);
    assert_eq!(queries.load(Ordering::SeqCst), 4);
}

#[test]
fn live_mode_does_not_redeliver_chunks() {
    let (interface, queries) = ScriptedInterface::new(vec![
        Ok(vec![updates("rrc00", "a", 0)]),
        Ok(vec![updates("rrc00", "a", 0)]),
        Ok(vec![updates("rrc00", "a", 0), updates("rrc00", "b", 300)]),
    ]);
    let factory = MemoryDecoderFactory::new()
        .with_chunk("a", records(&[10.0]))
        .with_chunk("b", records(&[310.0]));
    let mut stream = stream_with(interface, factory);
    stream.add_interval_filter(0, None);
    stream.set_backoff(BackoffPolicy::fixed(Duration::from_millis(1)));
    stream.start().unwrap();

    assert_eq!(stream.get_next_record().unwrap().unwrap().timestamp, 10.0);
    let record = stream.get_next_record().unwrap().unwrap();
    assert_eq!(record.timestamp, 310.0);
    assert_eq!(record.locator, "b");
    assert_eq!(queries.load(Ordering::SeqCst), 3);
}
