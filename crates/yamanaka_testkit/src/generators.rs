//! Generators for device ids, events, and archives.

use flate2::write::GzEncoder;
use flate2::Compression;
use yamanaka_protocol::SyncEvent;

/// Returns a fresh random device id in the form clients actually send.
pub fn device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Builds a gzipped tar archive holding the given files, in memory.
pub fn targz_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, bytes) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *bytes)
            .expect("failed to append archive entry");
    }

    builder
        .into_inner()
        .expect("failed to finish archive")
        .finish()
        .expect("failed to finish gzip stream")
}

/// A sequence of distinct update events, useful for filling a backlog.
pub fn update_events(count: usize) -> Vec<SyncEvent> {
    (0..count)
        .map(|i| SyncEvent::file_updated(format!("note-{i}.md"), "QQ=="))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[test]
    fn device_ids_are_distinct() {
        assert_ne!(device_id(), device_id());
    }

    #[test]
    fn archive_round_trips() {
        let archive = targz_archive(&[("x/y.md", b"hello")]);

        let mut reader = tar::Archive::new(GzDecoder::new(&archive[..]));
        let entries: Vec<_> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect();
        assert_eq!(entries, vec![std::path::PathBuf::from("x/y.md")]);
    }

    #[test]
    fn update_events_are_distinct_paths() {
        let events = update_events(3);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SyncEvent::FileUpdated { path, .. } if path == "note-0.md"));
    }
}
