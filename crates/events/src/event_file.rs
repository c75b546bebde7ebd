use std::{
    collections::HashMap,
    fs::{
        File,
        OpenOptions,
    },
    io::{
        BufRead,
        BufReader,
        Seek,
        SeekFrom,
        Write,
    },
    path::PathBuf,
    sync::{
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
        mpsc,
        Arc,
    },
    thread,
    time::Duration,
};

use notify::{
    RecommendedWatcher,
    RecursiveMode,
    Watcher,
};
use parking_lot::Mutex;

use crate::{
    event::Event,
    lock::{
        lock_path_for,
        FileLock,
    },
    line_cache::LineOffsetCache,
};

/// A single table's append-only, line-delimited event log: `objects.idb`
/// paired with `objects.idb.lock`. One line per event; a record's id is the
/// 0-based line number of the event that produced its current version.
///
/// Reads never block a concurrent append for long: the line-offset cache is
/// the only thing both paths touch, and extending it is a single forward
/// scan from the last known offset.
pub struct EventFile {
    path: PathBuf,
    lock: FileLock,
    cache: Mutex<LineOffsetCache>,
}

impl EventFile {
    /// Opens the event file at `path`, creating it (empty) if it doesn't
    /// exist yet. Does not replay any content — call [`Self::replay`]
    /// afterward to rebuild in-memory state from the log.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if !path.exists() {
            File::create(&path).map_err(|e| errors::internal("could not create event file", e))?;
        }
        Ok(Self {
            lock: FileLock::new(lock_path_for(&path)),
            path,
            cache: Mutex::new(LineOffsetCache::new()),
        })
    }

    /// Appends `events` under the cross-process lock, returning each
    /// event's assigned line number (== record id) in the same order. The
    /// whole batch lands atomically with respect to other appenders: the
    /// lock is held for the duration of the write.
    pub fn append(&self, events: &[Event]) -> anyhow::Result<Vec<i64>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        self.lock.lock()?;
        let result = self.append_while_locked(events);
        self.lock.unlock()?;
        result
    }

    fn append_while_locked(&self, events: &[Event]) -> anyhow::Result<Vec<i64>> {
        let mut cache = self.cache.lock();
        let current = File::open(&self.path).map_err(|e| errors::internal("could not open event file", e))?;
        cache.extend(&current)?;
        let start = cache.known_lines();

        let mut writer = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| errors::internal("could not open event file for append", e))?;
        for event in events {
            writeln!(writer, "{}", event.to_line()?).map_err(|e| errors::internal("could not append event", e))?;
        }
        writer.flush().map_err(|e| errors::internal("could not flush event file", e))?;
        drop(writer);

        let after = File::open(&self.path).map_err(|e| errors::internal("could not reopen event file", e))?;
        cache.extend(&after)?;

        Ok((0..events.len()).map(|i| (start + i) as i64).collect())
    }

    /// Reads the requested line numbers, returning the raw (still-JSON)
    /// text of each. Looking up a line beyond the current known count is
    /// an internal error — callers are expected to only request ids they
    /// have already observed.
    pub fn read(&self, mut line_numbers: Vec<i64>) -> anyhow::Result<HashMap<i64, String>> {
        if line_numbers.is_empty() {
            return Ok(HashMap::new());
        }
        line_numbers.sort_unstable();
        line_numbers.dedup();

        let mut cache = self.cache.lock();
        let current = File::open(&self.path).map_err(|e| errors::internal("could not open event file", e))?;
        cache.extend(&current)?;

        let mut out = HashMap::with_capacity(line_numbers.len());
        let mut reader = BufReader::new(current);
        for line_number in line_numbers {
            let offset = cache
                .offset_of_line(line_number as usize)
                .ok_or_else(|| anyhow::anyhow!("line {line_number} has not been written yet"))?;
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(|e| errors::internal("could not seek event file", e))?;
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|e| errors::internal("could not read event file", e))?;
            out.insert(line_number, line.trim_end_matches('\n').to_string());
        }
        Ok(out)
    }

    /// Total number of complete lines currently in the file, extending the
    /// offset cache first so this reflects any external writer's progress.
    pub fn line_count(&self) -> anyhow::Result<usize> {
        let mut cache = self.cache.lock();
        let current = File::open(&self.path).map_err(|e| errors::internal("could not open event file", e))?;
        cache.extend(&current)?;
        Ok(cache.known_lines())
    }

    /// Reads every line currently in the file, in order, invoking
    /// `on_line(id, event)` for each. Used both for the one-time startup
    /// replay and, indirectly, to catch a tail-follow reader up to the
    /// current end of file.
    pub fn replay(&self, mut on_line: impl FnMut(i64, Event) -> anyhow::Result<()>) -> anyhow::Result<()> {
        let count = self.line_count()?;
        if count == 0 {
            return Ok(());
        }
        let ids: Vec<i64> = (0..count as i64).collect();
        let lines = self.read(ids.clone())?;
        for id in ids {
            let line = lines.get(&id).expect("line within line_count must be readable");
            on_line(id, Event::from_line(line)?)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Handle for a background filesystem watcher on an event file. Dropping it
/// stops the watcher thread; it does not delete the underlying file.
pub struct TailWatcher {
    stop: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

impl Drop for TailWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl EventFile {
    /// Watches the event file for changes made by some other process (or
    /// thread) and invokes `on_new_line` for every line observed past the
    /// last-read watermark. A change is only acted on when this reader does
    /// **not** currently hold the append lock — an in-process append
    /// already delivers its own lines synchronously through
    /// [`Self::append`]'s caller.
    pub fn spawn_tail_watcher(
        self: &Arc<Self>,
        mut on_new_line: impl FnMut(i64, Event) + Send + 'static,
    ) -> anyhow::Result<TailWatcher> {
        let (tx, rx) = mpsc::channel();
        let mut watcher =
            notify::recommended_watcher(move |res| {
                let _ = tx.send(res);
            })
            .map_err(|e| errors::internal("could not create filesystem watcher", e))?;
        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|e| errors::internal("could not watch event file", e))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let watermark = AtomicUsize::new(self.line_count().unwrap_or(0));
        let file = self.clone();

        thread::spawn(move || {
            while !stop_for_thread.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(Ok(_event)) => {
                        if file.lock.have_lock() {
                            // Our own append; already delivered synchronously.
                            continue;
                        }
                        let Ok(total) = file.line_count() else { continue };
                        let start = watermark.load(Ordering::SeqCst);
                        if total <= start {
                            continue;
                        }
                        let ids: Vec<i64> = (start as i64..total as i64).collect();
                        if let Ok(lines) = file.read(ids.clone()) {
                            for id in ids {
                                if let Some(line) = lines.get(&id) {
                                    if let Ok(ev) = Event::from_line(line) {
                                        on_new_line(id, ev);
                                    }
                                }
                            }
                        }
                        watermark.store(total, Ordering::SeqCst);
                    },
                    Ok(Err(e)) => tracing::warn!(?e, "event file watcher error"),
                    Err(mpsc::RecvTimeoutError::Timeout) => {},
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(TailWatcher { stop, _watcher: watcher })
    }
}
