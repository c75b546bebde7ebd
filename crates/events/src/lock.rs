use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
    sync::atomic::{
        AtomicBool,
        Ordering,
    },
    thread,
    time::Duration,
};

/// Cross-process exclusive lock built on file existence, matching the
/// spec's locking discipline exactly: a lock is "held" when `path` exists,
/// acquisition polls for the file's absence every 100ms and then races to
/// create it, release removes it. This is intentionally not an OS `flock` —
/// the event file's tail-follow watcher runs in whatever process observes
/// the change, which may not be the writer, so presence-by-rename/create is
/// the only primitive both sides agree on.
pub struct FileLock {
    path: PathBuf,
    have_lock: AtomicBool,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            have_lock: AtomicBool::new(false),
        }
    }

    pub fn have_lock(&self) -> bool {
        self.have_lock.load(Ordering::SeqCst)
    }

    /// Blocks the calling thread until the lock is acquired. Callers on an
    /// async runtime must run this inside `spawn_blocking`.
    pub fn lock(&self) -> anyhow::Result<()> {
        if self.have_lock.load(Ordering::SeqCst) {
            return Ok(());
        }
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&self.path) {
                Ok(_) => {
                    self.have_lock.store(true, Ordering::SeqCst);
                    return Ok(());
                },
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    thread::sleep(POLL_INTERVAL);
                },
                Err(e) => return Err(errors::internal("could not create lock file", e)),
            }
        }
    }

    pub fn unlock(&self) -> anyhow::Result<()> {
        if !self.have_lock.load(Ordering::SeqCst) {
            return Err(errors::lock_already_released());
        }
        fs::remove_file(&self.path).map_err(|e| errors::internal("could not remove lock file", e))?;
        self.have_lock.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_locked_by_someone(&self) -> bool {
        self.path.exists()
    }
}

pub fn lock_path_for(event_file_path: &Path) -> PathBuf {
    let mut s = event_file_path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}
