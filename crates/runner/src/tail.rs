// SPDX-License-Identifier: Apache-2.0
//! Tails a growing UE log file and feeds each appended line to a callback.

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EOF_SLEEP: Duration = Duration::from_millis(200);
const ERROR_SLEEP: Duration = Duration::from_millis(500);

/// Handle to a running tailer task. Dropping it does not stop the
/// task; call [`LogTailer::stop`] and await the join handle.
pub struct LogTailer {
    stop: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl LogTailer {
    /// Spawns a background task that tails `path`, calling `on_line` for
    /// each line appended to it. Tolerant of the file not existing yet
    /// and of truncation (detected when size shrinks below the current
    /// read position, at which point the tailer re-opens from offset 0).
    pub fn spawn<F>(path: PathBuf, mut on_line: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_task = Arc::clone(&stop);
        let handle = tokio::task::spawn_blocking(move || run(&path, &stop_for_task, &mut on_line));
        Self { stop, handle }
    }

    /// Signals the tailer to stop and waits for it to finish.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.await;
    }
}

fn run(path: &Path, stop: &AtomicBool, on_line: &mut dyn FnMut(&str)) {
    let mut position: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        if !path.exists() {
            std::thread::sleep(EOF_SLEEP);
            continue;
        }

        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(_) => {
                std::thread::sleep(ERROR_SLEEP);
                continue;
            }
        };
        let mut reader = BufReader::new(file);
        if reader.seek(SeekFrom::Start(position)).is_err() {
            std::thread::sleep(ERROR_SLEEP);
            continue;
        }

        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    std::thread::sleep(EOF_SLEEP);
                    match std::fs::metadata(path) {
                        Ok(meta) if meta.len() < position => break,
                        Ok(_) => continue,
                        Err(_) => break,
                    }
                }
                Ok(n) => {
                    position += n as u64;
                    on_line(&line);
                }
                Err(_) => {
                    std::thread::sleep(ERROR_SLEEP);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn tails_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ue.log");
        std::fs::write(&path, "first\n").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let tailer = LogTailer::spawn(path.clone(), move |line| {
            seen_clone.lock().unwrap().push(line.trim_end().to_string());
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(&path, "first\nsecond\n").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        tailer.stop().await;
        let lines = seen.lock().unwrap().clone();
        assert!(lines.contains(&"first".to_string()));
        assert!(lines.contains(&"second".to_string()));
    }
}
