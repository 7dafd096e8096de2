//! End-to-end flow over the archive decorator: a rule's output directory
//! travels as a single `.archive` cache entry and unpacks file-by-file on
//! the fetching side.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

use cas_backend::ObjectStoreBackend;
use cas_cli::commands::{Artifact, Fetch, InputSource};
use cas_core::{Algorithm, WritableStorage};
use cas_storage::{ArchiveDecorator, MemoryStorage};
use object_store::memory::InMemory;

#[tokio::test]
async fn an_output_directory_round_trips_as_one_archive_entry() {
    let backend: Arc<ObjectStoreBackend> =
        Arc::new(ObjectStoreBackend::new(Arc::new(InMemory::new()), "tests"));

    // A build produced an output tree on the storing side.
    let source = MemoryStorage::new();
    for (path, content) in [
        ("out/bin/tool", "binary bits"),
        ("out/share/readme.md", "docs"),
    ] {
        source
            .write_file(path, Utc::now(), Bytes::from(content.to_string()))
            .await
            .unwrap();
    }

    let artifact = Artifact {
        storage: ArchiveDecorator::new(&source),
        backend: backend.clone(),
        state_path: ".cas/state".to_string(),
    };

    let (_, written) = artifact
        .run("somehash", &["out/.archive".to_string()])
        .await
        .unwrap();
    assert_eq!(written, vec!["out/.archive"]);

    // A fresh machine fetches the same hash.
    let dest = MemoryStorage::new();
    let fetch = Fetch {
        storage: ArchiveDecorator::new(&dest),
        backend,
        state_path: ".cas/state".to_string(),
        algorithm: Algorithm::Sha256,
        debug: false,
        hash_override: Some("somehash".to_string()),
    };

    let sentinel = fetch
        .run(InputSource::Literal(String::new()))
        .await
        .unwrap();
    assert_eq!(sentinel, ".cas/state/somehash");

    // The archive entry unpacked into individual files, plus the marker.
    assert_eq!(
        dest.content("out/bin/tool"),
        Some(Bytes::from_static(b"binary bits"))
    );
    assert_eq!(
        dest.content("out/share/readme.md"),
        Some(Bytes::from_static(b"docs"))
    );
    assert!(dest.content("out/.archive").is_some());

    // Every unpacked file carries the entry's timestamp, like the
    // sentinel does.
    let sentinel_mtime = dest.modified(&sentinel).unwrap();
    assert_eq!(dest.modified("out/bin/tool"), Some(sentinel_mtime));
    assert_eq!(dest.modified("out/share/readme.md"), Some(sentinel_mtime));
}
