//! Sessions backed by caller streams.

use oxitar::{
    AddOptions, ArchiveSession, ByteSink, ByteSource, CompressionMethod, ErrorClass, OxiTarError,
    Result, SessionOptions, SharedSink, SharedSource,
};
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn packed(method: CompressionMethod) -> Vec<u8> {
    let mut session =
        ArchiveSession::new_in_memory(SessionOptions::new().with_compression(method)).expect("create");
    for i in 0..5 {
        session
            .add(&format!("part-{i}.txt"), format!("payload {i}").as_bytes(), &AddOptions::default())
            .expect("add");
    }
    session.to_data().expect("data")
}

/// Hands out at most `chunk` bytes per pull, like a socket would.
struct Trickle {
    data: Cursor<Vec<u8>>,
    chunk: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.data.read(&mut buf[..n])
    }
}

/// Fails after a number of bytes with a structured error.
struct Cutoff {
    data: Cursor<Vec<u8>>,
    limit: u64,
}

impl ByteSource for Cutoff {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.data.position() >= self.limit {
            return Err(OxiTarError::invalid_state("upstream cancelled"));
        }
        let room = (self.limit - self.data.position()) as usize;
        let n = buf.len().min(room);
        Ok(self.data.read(&mut buf[..n])?)
    }
}

/// Sink that refuses writes after a budget is spent.
struct Quota {
    written: Vec<u8>,
    budget: usize,
}

impl ByteSink for Quota {
    fn push(&mut self, buf: &[u8]) -> Result<()> {
        if self.written.len() + buf.len() > self.budget {
            return Err(OxiTarError::Io(io::Error::new(
                io::ErrorKind::StorageFull,
                "quota exceeded",
            )));
        }
        self.written.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_source_session_rescans() {
    init_logging();
    for method in [CompressionMethod::None, CompressionMethod::Gzip, CompressionMethod::Zstd] {
        let source: SharedSource = Arc::new(Mutex::new(Trickle {
            data: Cursor::new(packed(method)),
            chunk: 37,
        }));
        let mut session = ArchiveSession::from_source(source).expect("open");
        assert_eq!(session.compression(), method);

        // Later entries first, then earlier ones from the replayed prefix
        assert_eq!(session.read("part-3.txt").expect("read"), b"payload 3");
        assert_eq!(session.read("part-0.txt").expect("read"), b"payload 0");
        assert_eq!(session.count().expect("count"), 5);
        assert_eq!(session.read("part-4.txt").expect("read"), b"payload 4");
    }
}

#[test]
fn test_sink_session_writes_through() {
    let out = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink: SharedSink = out.clone();

    let mut session = ArchiveSession::to_sink(sink, SessionOptions::default()).expect("open");
    session.add("hello.txt", b"hi", &AddOptions::default()).expect("add");
    assert!(session.to_data().is_err());
    session.close().expect("close");

    let bytes = out.lock().expect("lock").clone();
    assert_eq!(bytes.len() % 512, 0);
    let mut reader = ArchiveSession::from_bytes(bytes).expect("reopen");
    assert_eq!(reader.read("hello.txt").expect("read"), b"hi");
}

#[test]
fn test_shared_handles_are_released() {
    let input = Arc::new(Mutex::new(Cursor::new(packed(CompressionMethod::None))));
    let source: SharedSource = input.clone();
    let mut session = ArchiveSession::from_source(source).expect("open");
    // The store and the live reader each hold a clone
    assert!(Arc::strong_count(&input) > 1);
    session.entries().expect("entries");
    assert!(Arc::strong_count(&input) > 1);
    session.close().expect("close");
    assert_eq!(Arc::strong_count(&input), 1);

    let output = Arc::new(Mutex::new(Vec::<u8>::new()));
    {
        let sink: SharedSink = output.clone();
        let _session = ArchiveSession::to_sink(sink, SessionOptions::default()).expect("open");
        assert!(Arc::strong_count(&output) > 1);
    }
    assert_eq!(Arc::strong_count(&output), 1);
    // Dropping finished the archive
    assert_eq!(output.lock().expect("lock").len(), 1024);

    // A failed open does not keep its clone
    let garbage = Arc::new(Mutex::new(Cursor::new(vec![0x55u8; 600])));
    let source: SharedSource = garbage.clone();
    assert!(ArchiveSession::from_source(source).and_then(|mut s| s.entries()).is_err());
    assert_eq!(Arc::strong_count(&garbage), 1);
}

#[test]
fn test_source_failure_surfaces_original_error() {
    let data = packed(CompressionMethod::None);
    let source: SharedSource = Arc::new(Mutex::new(Cutoff {
        data: Cursor::new(data),
        limit: 1024,
    }));
    let mut session = ArchiveSession::from_source(source).expect("open");
    let err = session.entries().expect_err("cut off");
    assert_eq!(err.class(), ErrorClass::InvalidState);
    assert!(err.to_string().contains("upstream cancelled"), "{err}");
}

#[test]
fn test_sink_failure_surfaces_original_error() {
    let sink: SharedSink = Arc::new(Mutex::new(Quota {
        written: Vec::new(),
        budget: 4096,
    }));
    let mut session = ArchiveSession::to_sink(sink, SessionOptions::default()).expect("open");
    // The tar writer is unbuffered, so the quota trips during add
    let err = session
        .add("big.bin", &vec![1u8; 10_000], &AddOptions::default())
        .expect_err("quota");
    match err {
        OxiTarError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::StorageFull),
        other => panic!("unexpected error: {other}"),
    }
}
