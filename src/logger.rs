/*
 * This file is part of fanctl.
 *
 * Copyright (C) 2025 fanctl contributors
 *
 * fanctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * fanctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with fanctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use lazy_static::lazy_static;
use thiserror::Error;

pub const DEFAULT_LOG_PATH: &str = "/var/log/fanctl.log";
pub const LOCAL_FALLBACK_PATH: &str = "fanctl.log";
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_BACKUPS: usize = 2;

#[derive(Error, Debug)]
pub enum LogSinkError {
    #[error("no writable log path (tried {tried})")]
    NoWritablePath { tried: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

/// Sink configuration. `candidates` is the ordered list of paths tried at
/// startup; the first one that opens for append wins.
#[derive(Clone, Debug)]
pub struct LogSettings {
    pub candidates: Vec<PathBuf>,
    pub max_bytes: u64,
    pub backups: usize,
    pub foreground: bool,
    pub verbose: bool,
}

impl LogSettings {
    /// The standard candidate chain: an explicit preference first, then the
    /// system path, then a file next to the working directory for the
    /// unprivileged case.
    pub fn with_preferred(preferred: Option<PathBuf>) -> Self {
        let mut candidates = Vec::new();
        if let Some(p) = preferred {
            candidates.push(p);
        }
        candidates.push(PathBuf::from(DEFAULT_LOG_PATH));
        candidates.push(PathBuf::from(LOCAL_FALLBACK_PATH));
        Self {
            candidates,
            max_bytes: DEFAULT_MAX_BYTES,
            backups: DEFAULT_BACKUPS,
            foreground: false,
            verbose: false,
        }
    }
}

struct Sink {
    file: File,
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    foreground: bool,
    verbose: bool,
}

impl Sink {
    fn backup_path(&self, i: usize) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.path.display(), i))
    }

    /// Size-based rotation: current file becomes `.1`, existing backups shift
    /// up, the oldest is dropped. All renames are best-effort.
    fn rotate_if_needed(&mut self, incoming: u64) {
        if self.max_bytes == 0 {
            return;
        }
        let len = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        if len + incoming < self.max_bytes {
            return;
        }
        if self.backups > 0 {
            let _ = fs::remove_file(self.backup_path(self.backups));
            for i in (1..self.backups).rev() {
                let _ = fs::rename(self.backup_path(i), self.backup_path(i + 1));
            }
            let _ = fs::rename(&self.path, self.backup_path(1));
        } else {
            let _ = fs::remove_file(&self.path);
        }
        if let Ok(f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            self.file = f;
        }
    }
}

lazy_static! {
    static ref SINK: Mutex<Option<Sink>> = Mutex::new(None);
}

/// Open the log sink, trying each candidate path in order. Returns the path
/// actually selected; fails only if none of them is writable.
pub fn init(settings: LogSettings) -> Result<PathBuf, LogSinkError> {
    for path in &settings.candidates {
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(path) {
            let sink = Sink {
                file,
                path: path.clone(),
                max_bytes: settings.max_bytes,
                backups: settings.backups,
                foreground: settings.foreground,
                verbose: settings.verbose,
            };
            if let Ok(mut guard) = SINK.lock() {
                *guard = Some(sink);
            }
            return Ok(path.clone());
        }
    }
    let tried = settings
        .candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(LogSinkError::NoWritablePath { tried })
}

fn write_line(level: Level, msg: &str) {
    if let Ok(mut guard) = SINK.lock() {
        if let Some(sink) = guard.as_mut() {
            if level == Level::Debug && !sink.verbose {
                return;
            }
            let line = format!(
                "{} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level,
                msg
            );
            sink.rotate_if_needed(line.len() as u64 + 1);
            let _ = writeln!(sink.file, "{}", line);
            if sink.foreground {
                println!("{}", line);
            }
        }
    }
    // No sink: drop the line. Logging stays best-effort once startup has
    // secured a writable path.
}

pub fn debug(msg: &str) {
    write_line(Level::Debug, msg);
}

pub fn info(msg: &str) {
    write_line(Level::Info, msg);
}

pub fn warn(msg: &str) {
    write_line(Level::Warn, msg);
}

pub fn error(msg: &str) {
    write_line(Level::Error, msg);
}

#[cfg(test)]
pub(crate) fn reset() {
    if let Ok(mut guard) = SINK.lock() {
        *guard = None;
    }
}
