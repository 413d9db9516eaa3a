//! File tailer: one follower per watched file, rotation detection, and a
//! single bounded event channel toward the coordinator.
//!
//! Each follower runs two threads: a reader that consumes appended lines
//! and a checker that stats the path on an interval. A file is deemed
//! rotated when the stat fails, the size shrank, or the modification time
//! moved backward by more than a minute; the follower then reopens the path
//! and resumes at offset 0. Reentrancy during the reopen window is guarded
//! by a two-state machine (`Steady`/`Rotating`).
//!
//! The channel is bounded; a full buffer blocks the producer, which is the
//! only back-pressure mechanism, so no line is ever dropped. Callers must
//! drop the event receiver before `stop()` so blocked senders can unwind.

use crate::record::{LineRecord, TailerEvent};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

/// How long a single observable sleep slice is; bounds shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Backward mtime movement tolerated before the file counts as rotated.
const MTIME_TOLERANCE: Duration = Duration::from_secs(60);

/// File-level errors surfaced to the caller of `add_file` and friends.
#[derive(Debug)]
pub enum FileError {
    AlreadyWatched(PathBuf),
    NotWatched(PathBuf),
    Stat { path: PathBuf, source: io::Error },
    Open { path: PathBuf, source: io::Error },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::AlreadyWatched(path) => {
                write!(f, "file {} is already being watched", path.display())
            }
            FileError::NotWatched(path) => {
                write!(f, "file {} is not being watched", path.display())
            }
            FileError::Stat { path, source } => {
                write!(f, "cannot access file {}: {}", path.display(), source)
            }
            FileError::Open { path, source } => {
                write!(f, "cannot open file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Stat { source, .. } | FileError::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Tuning knobs; tests shrink the intervals.
#[derive(Debug, Clone)]
pub struct TailerOptions {
    /// Bounded capacity of the event channel.
    pub channel_capacity: usize,
    /// How often each follower stats its path for rotation.
    pub rotation_check_interval: Duration,
    /// Idle sleep when the reader is at end of file.
    pub poll_interval: Duration,
}

impl Default for TailerOptions {
    fn default() -> Self {
        TailerOptions {
            channel_capacity: 1000,
            rotation_check_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Follower lifecycle: `Rotating` suppresses further rotation checks while
/// the reader reopens the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowPhase {
    Steady,
    Rotating,
}

struct FollowerState {
    phase: FollowPhase,
    last_size: u64,
    last_mtime: Option<SystemTime>,
    line_counter: u64,
}

struct FollowerShared {
    path: PathBuf,
    state: Mutex<FollowerState>,
}

struct FollowerHandle {
    stop: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    checker: JoinHandle<()>,
}

/// Owns the set of followers and the outbound event channel.
pub struct Tailer {
    followers: HashMap<PathBuf, FollowerHandle>,
    sender: SyncSender<TailerEvent>,
    receiver: Option<Receiver<TailerEvent>>,
    shutdown: Arc<AtomicBool>,
    options: TailerOptions,
}

impl Tailer {
    pub fn new(options: TailerOptions) -> Self {
        let (sender, receiver) = sync_channel(options.channel_capacity.max(1));
        Tailer {
            followers: HashMap::new(),
            sender,
            receiver: Some(receiver),
            shutdown: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Take the consumer side of the event channel. Single consumer; this
    /// yields `Some` exactly once.
    pub fn events(&mut self) -> Option<Receiver<TailerEvent>> {
        self.receiver.take()
    }

    /// Start following `path` from the beginning of the file.
    pub fn add_file(&mut self, path: &Path) -> Result<(), FileError> {
        let path = path.to_path_buf();
        if self.followers.contains_key(&path) {
            return Err(FileError::AlreadyWatched(path));
        }
        let meta = std::fs::metadata(&path).map_err(|source| FileError::Stat {
            path: path.clone(),
            source,
        })?;
        let file = File::open(&path).map_err(|source| FileError::Open {
            path: path.clone(),
            source,
        })?;

        let shared = Arc::new(FollowerShared {
            path: path.clone(),
            state: Mutex::new(FollowerState {
                phase: FollowPhase::Steady,
                last_size: meta.len(),
                last_mtime: meta.modified().ok(),
                line_counter: 0,
            }),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let shared = Arc::clone(&shared);
            let sender = self.sender.clone();
            let stop = Arc::clone(&stop);
            let shutdown = Arc::clone(&self.shutdown);
            let poll = self.options.poll_interval;
            thread::spawn(move || run_reader(shared, file, sender, stop, shutdown, poll))
        };
        let checker = {
            let shared = Arc::clone(&shared);
            let sender = self.sender.clone();
            let stop = Arc::clone(&stop);
            let shutdown = Arc::clone(&self.shutdown);
            let interval = self.options.rotation_check_interval;
            thread::spawn(move || run_rotation_checker(shared, sender, stop, shutdown, interval))
        };

        self.followers.insert(
            path,
            FollowerHandle {
                stop,
                reader,
                checker,
            },
        );
        Ok(())
    }

    /// Follow `path` from offset 0, replacing an existing follower.
    ///
    /// An already-running follower is signalled and dropped without being
    /// awaited, so for a brief window old and new reader may both emit for
    /// this path. Callers that need a clean cut use `remove_file` first.
    pub fn tail_from_start(&mut self, path: &Path) -> Result<(), FileError> {
        if let Some(handle) = self.followers.remove(path) {
            handle.stop.store(true, Ordering::SeqCst);
        }
        self.add_file(path)
    }

    /// Stop following `path`, awaiting the follower threads.
    pub fn remove_file(&mut self, path: &Path) -> Result<(), FileError> {
        let handle = self
            .followers
            .remove(path)
            .ok_or_else(|| FileError::NotWatched(path.to_path_buf()))?;
        handle.stop.store(true, Ordering::SeqCst);
        let _ = handle.reader.join();
        let _ = handle.checker.join();
        Ok(())
    }

    /// Snapshot of watched paths.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.followers.keys().cloned().collect()
    }

    /// Signal every follower and await completion. The event receiver must
    /// already be dropped so that blocked senders can exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for (_, handle) in self.followers.drain() {
            handle.stop.store(true, Ordering::SeqCst);
            let _ = handle.reader.join();
            let _ = handle.checker.join();
        }
    }
}

/// Sleep in small slices, returning early (false) when a flag is raised.
fn sleep_observing(total: Duration, stop: &AtomicBool, shutdown: &AtomicBool) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::SeqCst) || shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    !(stop.load(Ordering::SeqCst) || shutdown.load(Ordering::SeqCst))
}

fn run_reader(
    shared: Arc<FollowerShared>,
    file: File,
    sender: SyncSender<TailerEvent>,
    stop: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) {
    let mut reader = BufReader::new(file);
    let mut offset: u64 = 0;
    let mut partial: Vec<u8> = Vec::new();
    let mut partial_start: u64 = 0;
    let mut eof_sent = false;

    loop {
        if stop.load(Ordering::SeqCst) || shutdown.load(Ordering::SeqCst) {
            return;
        }

        // The checker flagged a rotation: reopen at offset 0 and resume.
        let rotating = {
            let state = shared.state.lock().expect("follower state poisoned");
            state.phase == FollowPhase::Rotating
        };
        if rotating {
            match File::open(&shared.path) {
                Ok(new_file) => {
                    reader = BufReader::new(new_file);
                    offset = 0;
                    partial.clear();
                    eof_sent = false;
                    let meta = std::fs::metadata(&shared.path).ok();
                    let mut state = shared.state.lock().expect("follower state poisoned");
                    state.last_size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
                    state.last_mtime = meta.and_then(|m| m.modified().ok());
                    state.phase = FollowPhase::Steady;
                }
                Err(_) => {
                    // File is gone; keep polling for it to reappear.
                    if !sleep_observing(poll, &stop, &shutdown) {
                        return;
                    }
                }
            }
            continue;
        }

        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !eof_sent {
                    if sender.send(TailerEvent::Eof(shared.path.clone())).is_err() {
                        return;
                    }
                    eof_sent = true;
                }
                if !sleep_observing(poll, &stop, &shutdown) {
                    return;
                }
            }
            Ok(n) => {
                if partial.is_empty() {
                    partial_start = offset;
                }
                offset += n as u64;
                partial.extend_from_slice(&buf);
                if !partial.ends_with(b"\n") {
                    // Incomplete line: the writer is mid-append. Wait for
                    // the rest instead of emitting a split record.
                    if !sleep_observing(poll, &stop, &shutdown) {
                        return;
                    }
                    continue;
                }
                while partial.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
                    partial.pop();
                }
                let text = String::from_utf8_lossy(&partial).into_owned();
                partial.clear();

                let line_num = {
                    let mut state = shared.state.lock().expect("follower state poisoned");
                    state.line_counter += 1;
                    state.line_counter
                };
                let record =
                    LineRecord::new(&shared.path, line_num, Some(partial_start), text);
                // Blocking send is the back-pressure; a closed channel means
                // the coordinator went away.
                if sender.send(TailerEvent::NewLine(record)).is_err() {
                    return;
                }
                eof_sent = false;
            }
            Err(e) => {
                let event = TailerEvent::FileError {
                    path: shared.path.clone(),
                    message: format!("error reading {}: {}", shared.path.display(), e),
                };
                if sender.send(event).is_err() {
                    return;
                }
                if !sleep_observing(poll, &stop, &shutdown) {
                    return;
                }
            }
        }
    }
}

fn run_rotation_checker(
    shared: Arc<FollowerShared>,
    sender: SyncSender<TailerEvent>,
    stop: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) {
    loop {
        if !sleep_observing(interval, &stop, &shutdown) {
            return;
        }

        let rotated = {
            let mut state = shared.state.lock().expect("follower state poisoned");
            if state.phase == FollowPhase::Rotating {
                // Reopen in progress; checks are suppressed.
                continue;
            }
            match std::fs::metadata(&shared.path) {
                Err(_) => {
                    // Missing file: rotated away (or deleted); the reader
                    // will poll for it to reappear.
                    state.phase = FollowPhase::Rotating;
                    true
                }
                Ok(meta) => {
                    let size = meta.len();
                    let mtime = meta.modified().ok();
                    if size < state.last_size || mtime_moved_backward(mtime, state.last_mtime) {
                        state.phase = FollowPhase::Rotating;
                        true
                    } else {
                        state.last_size = size;
                        state.last_mtime = mtime;
                        false
                    }
                }
            }
        };

        if rotated && sender.send(TailerEvent::FileRotated(shared.path.clone())).is_err() {
            return;
        }
    }
}

/// Truncate-and-recreate can leave the path with an older mtime than the
/// one we recorded; treat a jump backward beyond the tolerance as rotation.
fn mtime_moved_backward(current: Option<SystemTime>, last: Option<SystemTime>) -> bool {
    match (current, last) {
        (Some(current), Some(last)) => match last.duration_since(current) {
            Ok(backward) => backward > MTIME_TOLERANCE,
            Err(_) => false,
        },
        _ => false,
    }
}
