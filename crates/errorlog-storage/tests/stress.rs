//! Stress tests for errorlog-storage
//!
//! These tests verify the record log under high volume, concurrent
//! appenders, readers running alongside writers, and damaged files.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use errorlog_core::{ErrorLogRequest, ServiceFilter, StatusCode, StoredRecord};
use errorlog_storage::streamblock::{START_BYTE, frame_block};
use errorlog_storage::{
    BlockReader, BlockWriter, RecordLog, RecordLogConfig, StreamBlockError, TextLog, count_blocks,
};
use tempfile::TempDir;

fn record(service: &str, n: u32) -> StoredRecord {
    StoredRecord::new(
        ErrorLogRequest::new(service, "Call")
            .with_code(StatusCode::Unavailable)
            .with_timestamp(n)
            .with_log_message(format!("record {}", n)),
    )
}

async fn open_log(temp: &TempDir) -> RecordLog {
    let config = RecordLogConfig::new(temp.path()).with_sync_on_write(false);
    RecordLog::open(config).await.expect("Failed to open record log")
}

// ============================================================================
// Throughput Tests
// ============================================================================

/// Append 10,000 records, then read them all back in both directions
#[tokio::test]
async fn test_record_log_throughput() {
    let temp = TempDir::new().unwrap();
    let log = open_log(&temp).await;
    let count: u32 = 10_000;

    let start = Instant::now();
    for i in 0..count {
        log.append(&record("svc.Throughput", i))
            .await
            .expect("Failed to append record");
    }
    let duration = start.elapsed();
    println!(
        "Appended {} records in {:?} ({:.2} records/sec)",
        count,
        duration,
        count as f64 / duration.as_secs_f64()
    );

    let mut reader = log.open_reader().await.unwrap();
    let (total, matching) = count_blocks(&mut reader, &ServiceFilter::all())
        .await
        .unwrap();
    assert_eq!(total, count as usize);
    assert_eq!(matching, count as usize);

    let start = Instant::now();
    let history = log
        .history(&ServiceFilter::all(), count as usize)
        .await
        .unwrap();
    println!("Read {} records backward in {:?}", history.len(), start.elapsed());

    assert_eq!(history.len(), count as usize);
    for (i, rec) in history.iter().enumerate() {
        assert_eq!(rec.request.timestamp, count - 1 - i as u32);
    }
}

/// Sparse matches deep in a large log are found in order
#[tokio::test]
async fn test_sparse_history_in_large_log() {
    let temp = TempDir::new().unwrap();
    let log = open_log(&temp).await;

    for i in 0..5_000u32 {
        let service = if i % 997 == 0 { "rare.Service" } else { "common.Service" };
        log.append(&record(service, i)).await.unwrap();
    }

    let history = log
        .history(&ServiceFilter::new(["RARE"]), 100)
        .await
        .unwrap();
    let stamps: Vec<u32> = history.iter().map(|r| r.request.timestamp).collect();
    assert_eq!(stamps, vec![4985, 3988, 2991, 1994, 997, 0]);
}

// ============================================================================
// Concurrent Access Tests
// ============================================================================

/// Concurrent appenders never interleave frames
#[tokio::test]
async fn test_concurrent_appends() {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(open_log(&temp).await);
    let mut handles = vec![];

    // Spawn 10 tasks, each appending 100 records for its own service
    for t in 0..10u32 {
        let log_clone = Arc::clone(&log);
        let handle = tokio::spawn(async move {
            let service = format!("svc{}.Service", t);
            for i in 0..100 {
                log_clone
                    .append(&record(&service, t * 1000 + i))
                    .await
                    .expect("Failed to append");
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let history = log.history(&ServiceFilter::all(), 10_000).await.unwrap();
    assert_eq!(history.len(), 1000);

    let unique: HashSet<u32> = history.iter().map(|r| r.request.timestamp).collect();
    assert_eq!(unique.len(), 1000);

    // Per-service order is preserved: newest first within each service
    for t in 0..10u32 {
        let filter = ServiceFilter::new([format!("svc{}.", t)]);
        let stamps: Vec<u32> = log
            .history(&filter, 1000)
            .await
            .unwrap()
            .iter()
            .map(|r| r.request.timestamp)
            .collect();
        let expected: Vec<u32> = (0..100).rev().map(|i| t * 1000 + i).collect();
        assert_eq!(stamps, expected);
    }
}

/// Readers scanning history while a writer appends see only whole records
#[tokio::test]
async fn test_readers_alongside_writer() {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(open_log(&temp).await);
    log.append(&record("seed.Service", 0)).await.unwrap();

    let writer = {
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            for i in 1..=500 {
                log.append(&record("w.Service", i)).await.unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let log = Arc::clone(&log);
        readers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let history = log.history(&ServiceFilter::all(), 50).await.unwrap();
                assert!(!history.is_empty());
                // Newest first, strictly decreasing
                for pair in history.windows(2) {
                    assert!(pair[0].request.timestamp > pair[1].request.timestamp);
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.expect("Writer panicked");
    for r in readers {
        r.await.expect("Reader panicked");
    }
}

// ============================================================================
// Damaged Data Tests
// ============================================================================

/// Garbage between blocks and corrupt escapes do not hide other records
#[tokio::test]
async fn test_garbage_between_blocks() {
    let mut data = Vec::new();
    for i in 0..100u32 {
        data.extend_from_slice(&frame_block(&record("a.A", i).to_bytes().unwrap()));
        if i % 10 == 0 {
            // stray bytes outside any frame
            data.extend_from_slice(&[0x42, 0x43, 0xFF, 0x07]);
        }
    }

    let mut reader = BlockReader::seekable(Cursor::new(data));
    let mut seen = vec![];
    let mut block = reader.read_last_block().await;
    loop {
        match block {
            Ok(b) => seen.push(StoredRecord::from_bytes(&b).unwrap().request.timestamp),
            Err(StreamBlockError::EndOfStream) => break,
            Err(e) => panic!("unexpected error: {}", e),
        }
        block = reader.read_previous_block().await;
    }
    let expected: Vec<u32> = (0..100).rev().collect();
    assert_eq!(seen, expected);
}

/// A stream cut at every possible length yields only whole blocks
#[tokio::test]
async fn test_truncation_at_every_offset() {
    let blocks: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i, 0x00, 0x01, 0xFF, i]).collect();
    let mut writer = BlockWriter::new(Vec::new());
    for b in &blocks {
        writer.write_block(b).await.unwrap();
    }
    let data = writer.into_inner();

    for cut in 0..=data.len() {
        let prefix = data[..cut].to_vec();

        let mut forward = BlockReader::new(Cursor::new(prefix.clone()));
        let mut read = vec![];
        while let Ok(b) = forward.read_block().await {
            read.push(b);
        }
        assert_eq!(read, blocks[..read.len()].to_vec(), "cut at {}", cut);

        let mut backward = BlockReader::seekable(Cursor::new(prefix));
        if let Ok(last) = backward.read_last_block().await {
            assert_eq!(last, blocks[read.len() - 1], "cut at {}", cut);
        } else {
            assert!(read.is_empty(), "cut at {}", cut);
        }
    }
}

/// A log ending in a torn frame is repaired on reopen
#[tokio::test]
async fn test_reopen_after_torn_write() {
    let temp = TempDir::new().unwrap();
    let path = {
        let log = open_log(&temp).await;
        for i in 0..10 {
            log.append(&record("t.T", i)).await.unwrap();
        }
        log.close().await.unwrap();
        log.path().to_path_buf()
    };

    let mut raw = tokio::fs::read(&path).await.unwrap();
    raw.extend_from_slice(&[START_BYTE, 0x10, 0x20]);
    tokio::fs::write(&path, &raw).await.unwrap();

    let log = open_log(&temp).await;
    log.append(&record("t.T", 10)).await.unwrap();

    let mut reader = log.open_reader().await.unwrap();
    let (total, matching) = count_blocks(&mut reader, &ServiceFilter::all())
        .await
        .unwrap();
    assert_eq!(total, 12);
    assert_eq!(matching, 11);
}

// ============================================================================
// Text Log Rotation Tests
// ============================================================================

/// Many concurrent writers with a tiny limit never lose the active file
#[tokio::test]
async fn test_text_log_rotation_under_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("busy.log");
    let log = Arc::new(TextLog::open(&path, 4096).await.unwrap());

    let mut handles = vec![];
    for t in 0..8 {
        let log = Arc::clone(&log);
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                log.write_str(&format!("writer {} line {}\n", t, i))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let active = tokio::fs::metadata(&path).await.unwrap().len();
    assert!(active < 4096 + 64);
    assert_eq!(active, log.len().await);

    let rotated = tokio::fs::read_to_string(errorlog_storage::append_log::rotated_path(&path))
        .await
        .unwrap();
    // Rotation happens on line boundaries
    assert!(rotated.lines().all(|l| l.starts_with("writer ")));
}
