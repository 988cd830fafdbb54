//! File-backed firmware store.
//!
//! Layout inside the storage directory:
//!
//! ```text
//! firmware/
//!   firmware.bin   current payload
//!   version.txt    version extracted from firmware.bin
//! ```
//!
//! A publish stages both artifacts as temporary files in the same directory,
//! then renames the payload into place followed by the version sidecar. The
//! payload rename is the commit point: the sidecar is derived data and is
//! repaired from `firmware.bin` when the store is reopened.
//!
//! Readers are served from an in-memory snapshot that is swapped only after
//! the payload rename commits, so they never see a partially written image.

use bytes::Bytes;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::model::FirmwareImage;
use crate::store::{CurrentImage, FirmwareStore, StoreError};
use crate::version::FirmwareVersion;

/// File name of the published payload.
pub const FIRMWARE_FILE: &str = "firmware.bin";

/// File name of the version sidecar.
pub const VERSION_FILE: &str = "version.txt";

const STAGING_PREFIX: &str = ".staging-";
const STAGING_SUFFIX: &str = ".tmp";

/// Firmware store persisted in a local directory.
#[derive(Debug)]
pub struct FileFirmwareStore {
    dir: PathBuf,
    current: CurrentImage,
    /// Serializes publishers; readers never take it.
    publish_lock: Mutex<()>,
    /// Flushes directory entries after the renames.
    sync_dir: fn(&Path) -> io::Result<()>,
}

impl FileFirmwareStore {
    /// Open (or create) a store rooted at `dir` and load the current image.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        remove_staging_files(&dir)?;

        let current = recover(&dir)?;
        match &current {
            Some(image) => info!(
                dir = %dir.display(),
                version = %image.version(),
                size = image.len(),
                "Loaded firmware from storage"
            ),
            None => info!(dir = %dir.display(), "No firmware published yet"),
        }

        Ok(Self {
            dir,
            current: CurrentImage::new(current),
            publish_lock: Mutex::new(()),
            sync_dir,
        })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `image` to disk.
    ///
    /// An error means the payload rename never happened and the previous
    /// image is still the one on disk. Once `firmware.bin` is renamed the
    /// publish is committed: later failures are logged, not returned, since
    /// the sidecar is repaired from the payload on the next open.
    fn persist(&self, image: &FirmwareImage) -> io::Result<()> {
        let firmware = stage(&self.dir, image.payload())?;
        let version = stage(&self.dir, image.version().as_str().as_bytes())?;

        firmware
            .persist(self.dir.join(FIRMWARE_FILE))
            .map_err(|e| e.error)?;

        if let Err(e) = version.persist(self.dir.join(VERSION_FILE)) {
            warn!(error = %e.error, "Failed to update version sidecar");
        }
        if let Err(e) = (self.sync_dir)(&self.dir) {
            warn!(error = %e, "Failed to sync firmware directory");
        }
        Ok(())
    }
}

impl FirmwareStore for FileFirmwareStore {
    fn publish(&self, payload: Bytes) -> Result<FirmwareVersion, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let image = FirmwareImage::new(payload);
        let version = image.version().clone();

        let _guard = self
            .publish_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Err(source) = self.persist(&image) {
            error!(%version, error = %source, "Failed to persist firmware");
            return Err(StoreError::PublishFailed { source });
        }

        info!(%version, size = image.len(), "Published firmware");
        self.current.replace(Arc::new(image));
        Ok(version)
    }

    fn current(&self) -> Option<Arc<FirmwareImage>> {
        self.current.get()
    }
}

/// Write `data` to a synced temporary file inside `dir`.
///
/// The file is removed automatically if it is dropped without being persisted.
fn stage(dir: &Path, data: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    Ok(file)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Delete staging files left behind by an interrupted publish.
fn remove_staging_files(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX) {
            debug!(file = name, "Removing stale staging file");
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Load the current image from disk, repairing the version sidecar if needed.
fn recover(dir: &Path) -> Result<Option<Arc<FirmwareImage>>, StoreError> {
    let payload = match fs::read(dir.join(FIRMWARE_FILE)) {
        Ok(bytes) if bytes.is_empty() => return Ok(None),
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let image = FirmwareImage::new(payload);

    let recorded = fs::read_to_string(dir.join(VERSION_FILE))
        .ok()
        .and_then(|s| FirmwareVersion::parse(s.trim()).ok());

    if recorded.as_ref() != Some(image.version()) {
        warn!(
            recorded = ?recorded.as_ref().map(FirmwareVersion::as_str),
            actual = %image.version(),
            "Version sidecar out of date, rewriting"
        );
        stage(dir, image.version().as_str().as_bytes())?
            .persist(dir.join(VERSION_FILE))
            .map_err(|e| e.error)?;
        sync_dir(dir)?;
    }

    Ok(Some(Arc::new(image)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn read_sidecar(dir: &Path) -> String {
        fs::read_to_string(dir.join(VERSION_FILE)).unwrap()
    }

    #[test]
    fn test_open_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFirmwareStore::open(dir.path()).unwrap();

        assert_eq!(store.current_version().as_str(), "0.0.0");
        assert!(matches!(store.current_binary(), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_open_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("firmware");

        let store = FileFirmwareStore::open(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn test_publish_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFirmwareStore::open(dir.path()).unwrap();
        let payload = Bytes::from_static(b"\xe9\x03FW-V:1.0.5\x00app");

        let version = store.publish(payload.clone()).unwrap();

        assert_eq!(version.as_str(), "1.0.5");
        assert_eq!(fs::read(dir.path().join(FIRMWARE_FILE)).unwrap(), payload.as_ref());
        assert_eq!(read_sidecar(dir.path()), "1.0.5");
        assert_eq!(store.current_binary().unwrap(), payload);
    }

    #[test]
    fn test_publish_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFirmwareStore::open(dir.path()).unwrap();

        store.publish(Bytes::from_static(b"FW-V:1.0.0")).unwrap();
        store.publish(Bytes::from_static(b"FW-V:1.0.1")).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec![FIRMWARE_FILE.to_string(), VERSION_FILE.to_string()]);
    }

    #[test]
    fn test_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileFirmwareStore::open(dir.path()).unwrap();
            store.publish(Bytes::from_static(b"boot FW-V:2.3.4 image")).unwrap();
        }

        let reopened = FileFirmwareStore::open(dir.path()).unwrap();

        assert_eq!(reopened.current_version().as_str(), "2.3.4");
        assert_eq!(reopened.current_binary().unwrap().as_ref(), b"boot FW-V:2.3.4 image");
    }

    #[test]
    fn test_recovery_repairs_stale_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FIRMWARE_FILE), b"FW-V:5.0.0 new payload").unwrap();
        fs::write(dir.path().join(VERSION_FILE), "4.9.9").unwrap();

        let store = FileFirmwareStore::open(dir.path()).unwrap();

        assert_eq!(store.current_version().as_str(), "5.0.0");
        assert_eq!(read_sidecar(dir.path()), "5.0.0");
    }

    #[test]
    fn test_recovery_writes_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FIRMWARE_FILE), b"untagged").unwrap();

        let store = FileFirmwareStore::open(dir.path()).unwrap();

        assert!(store.current_version().is_unknown());
        assert_eq!(read_sidecar(dir.path()), "0.0.0");
    }

    #[test]
    fn test_recovery_ignores_orphan_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VERSION_FILE), "9.9.9").unwrap();

        let store = FileFirmwareStore::open(dir.path()).unwrap();

        assert_eq!(store.current_version().as_str(), "0.0.0");
        assert!(matches!(store.current_binary(), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_empty_firmware_file_is_unpublished() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FIRMWARE_FILE), b"").unwrap();

        let store = FileFirmwareStore::open(dir.path()).unwrap();

        assert!(store.current().is_none());
    }

    #[test]
    fn test_open_removes_stale_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(".staging-abc123.tmp");
        fs::write(&stale, b"half written").unwrap();
        let unrelated = dir.path().join("notes.tmp");
        fs::write(&unrelated, b"keep me").unwrap();

        FileFirmwareStore::open(dir.path()).unwrap();

        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_empty_payload_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFirmwareStore::open(dir.path()).unwrap();
        store.publish(Bytes::from_static(b"FW-V:1.2.3")).unwrap();

        assert!(matches!(store.publish(Bytes::new()), Err(StoreError::EmptyPayload)));

        assert_eq!(store.current_version().as_str(), "1.2.3");
        assert_eq!(read_sidecar(dir.path()), "1.2.3");
    }

    #[test]
    fn test_failed_publish_keeps_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileFirmwareStore::open(&root).unwrap();
        store.publish(Bytes::from_static(b"FW-V:1.0.0 first")).unwrap();

        // Removing the directory makes staging fail.
        fs::remove_dir_all(&root).unwrap();
        let result = store.publish(Bytes::from_static(b"FW-V:2.0.0 second"));

        assert!(matches!(result, Err(StoreError::PublishFailed { .. })));
        assert_eq!(store.current_version().as_str(), "1.0.0");
        assert_eq!(store.current_binary().unwrap().as_ref(), b"FW-V:1.0.0 first");
    }

    #[test]
    fn test_sync_failure_after_commit_still_publishes() {
        fn failing_sync(_dir: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "EIO"))
        }

        let dir = tempfile::tempdir().unwrap();
        let mut store = FileFirmwareStore::open(dir.path()).unwrap();
        store.publish(Bytes::from_static(b"FW-V:1.0.0 first")).unwrap();
        store.sync_dir = failing_sync;

        let version = store.publish(Bytes::from_static(b"FW-V:2.0.0 second")).unwrap();

        // Live readers and a restarted store agree on the committed image.
        assert_eq!(version.as_str(), "2.0.0");
        assert_eq!(store.current_version().as_str(), "2.0.0");
        let reopened = FileFirmwareStore::open(dir.path()).unwrap();
        assert_eq!(reopened.current(), store.current());
    }

    #[test]
    fn test_publish_same_payload_twice() {
        let once_dir = tempfile::tempdir().unwrap();
        let twice_dir = tempfile::tempdir().unwrap();
        let once = FileFirmwareStore::open(once_dir.path()).unwrap();
        let twice = FileFirmwareStore::open(twice_dir.path()).unwrap();
        let payload = Bytes::from_static(b"FW-V:2.0.0 image");

        once.publish(payload.clone()).unwrap();
        twice.publish(payload.clone()).unwrap();
        twice.publish(payload).unwrap();

        assert_eq!(once.current(), twice.current());
        assert_eq!(
            fs::read(once_dir.path().join(FIRMWARE_FILE)).unwrap(),
            fs::read(twice_dir.path().join(FIRMWARE_FILE)).unwrap()
        );
        assert_eq!(read_sidecar(once_dir.path()), read_sidecar(twice_dir.path()));
    }

    #[test]
    fn test_concurrent_readers_see_consistent_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileFirmwareStore::open(dir.path()).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        if let Some(image) = store.current() {
                            let tag = format!("FW-V:{} ", image.version());
                            assert_eq!(image.len() % tag.len(), 0);
                            assert!(image.payload().chunks(tag.len()).all(|c| c == tag.as_bytes()));
                        }
                    }
                })
            })
            .collect();

        for minor in 0..50 {
            let tag = format!("FW-V:1.{minor}.0 ");
            store.publish(Bytes::from(tag.repeat(1024))).unwrap();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.current_version().as_str(), "1.49.0");
        assert_eq!(read_sidecar(dir.path()), "1.49.0");
    }

    #[test]
    fn test_concurrent_publishers_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileFirmwareStore::open(dir.path()).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|n| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        let payload = format!("FW-V:{n}.{i}.0 payload-{n}-{i}");
                        store.publish(Bytes::from(payload)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        // Memory, payload file and sidecar all agree on one image.
        let image = store.current().unwrap();
        let on_disk = fs::read(dir.path().join(FIRMWARE_FILE)).unwrap();
        assert_eq!(image.payload().as_ref(), on_disk.as_slice());
        assert_eq!(read_sidecar(dir.path()), image.version().as_str());

        let reopened = FileFirmwareStore::open(dir.path()).unwrap();
        assert_eq!(reopened.current(), Some(image));
    }
}
