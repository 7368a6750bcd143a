//! the upload queue
//!
//! files go in through [`UploadEngine::add_file`], are served in FIFO order through a fixed
//! pool of slots and come out as [`UploadEvent`]s. small files go up in one request, big
//! ones through an init → chunk → finalize session.
pub mod engine;
pub mod transport;

pub use {
    engine::UploadEngine,
    transport::{HttpTransport, ProgressSink, UploadTransport},
};

use {
    crate::files::FileBlob,
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::{collections::BTreeMap, fmt, time::Duration},
    uuid::Uuid,
};

/// how the upload engine is set up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// the endpoint; chunked uploads append `/init`, `/chunk` and `/finalize`
    pub url: String,
    /// files bigger than this (in bytes) are uploaded in chunks of this size
    pub chunk_size: u64,
    /// how many uploads may be in flight at once
    pub max_concurrent: usize,
    /// start uploading as soon as a file is added
    pub auto_start: bool,
    /// extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/upload".to_string(),
            chunk_size: 5 * 1024 * 1024,
            max_concurrent: 3,
            auto_start: true,
            headers: BTreeMap::new(),
        }
    }
}

/// where an upload is at
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// waiting for a slot (or for `start_all`)
    #[default]
    Idle,
    /// in flight
    Uploading,
    /// stopped by the user, restarts from zero on resume
    Paused,
    /// done
    Completed,
    /// failed, see `error`
    Error,
    /// cancelled by the user
    Cancelled,
}

impl UploadStatus {
    /// whether the item is done for good (until retried)
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Error | UploadStatus::Cancelled
        )
    }

    /// the lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Paused => "paused",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
            UploadStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// one file in the queue
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// a unique id
    pub id: Uuid,
    /// the file
    pub file: FileBlob,
    /// where it's at
    pub status: UploadStatus,
    /// percent done, never decreasing within an attempt
    pub progress: u8,
    /// bytes sent in the current attempt
    pub bytes_uploaded: u64,
    /// average bytes per second of the current attempt
    pub speed: Option<f64>,
    /// estimated time left
    pub eta: Option<Duration>,
    /// why it failed, only set when `status` is `Error`
    pub error: Option<String>,
    /// how many times it was started
    pub attempt: u32,
    /// when it was added
    pub added_at: DateTime<Utc>,
    /// when the current attempt started
    pub started_at: Option<DateTime<Utc>>,
    /// when it completed
    pub completed_at: Option<DateTime<Utc>>,
    /// what the server answered with on success
    pub response: Option<serde_json::Value>,
}

impl UploadItem {
    /// a fresh idle item
    pub fn new(file: FileBlob) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            status: UploadStatus::Idle,
            progress: 0,
            bytes_uploaded: 0,
            speed: None,
            eta: None,
            error: None,
            attempt: 0,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
            response: None,
        }
    }
}

/// how many items are in each state
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// waiting
    pub idle: usize,
    /// in flight
    pub uploading: usize,
    /// paused
    pub paused: usize,
    /// done
    pub completed: usize,
    /// failed
    pub failed: usize,
    /// cancelled
    pub cancelled: usize,
}

/// something that happened in the queue
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// a file was queued
    Added {
        /// the item
        id: Uuid,
    },
    /// an attempt started
    Started {
        /// the item
        id: Uuid,
        /// the attempt number, starting at 1
        attempt: u32,
    },
    /// bytes went out
    Progress {
        /// the item
        id: Uuid,
        /// percent done
        progress: u8,
        /// bytes sent so far
        bytes: u64,
        /// bytes in total
        total: u64,
        /// average bytes per second
        speed: Option<f64>,
        /// estimated time left
        eta: Option<Duration>,
    },
    /// the server accepted the file
    Completed {
        /// the item
        id: Uuid,
        /// what the server answered with
        response: serde_json::Value,
    },
    /// the attempt failed
    Failed {
        /// the item
        id: Uuid,
        /// what went wrong
        error: String,
    },
    /// the user cancelled
    Cancelled {
        /// the item
        id: Uuid,
    },
    /// the user paused
    Paused {
        /// the item
        id: Uuid,
    },
    /// the item left the queue
    Removed {
        /// the item
        id: Uuid,
    },
    /// nothing is in flight or waiting any more
    AllComplete {
        /// the counts at that point
        counts: QueueCounts,
    },
}

impl UploadEvent {
    /// the item the event is about, if any
    pub fn id(&self) -> Option<Uuid> {
        match self {
            UploadEvent::Added { id }
            | UploadEvent::Started { id, .. }
            | UploadEvent::Progress { id, .. }
            | UploadEvent::Completed { id, .. }
            | UploadEvent::Failed { id, .. }
            | UploadEvent::Cancelled { id }
            | UploadEvent::Paused { id }
            | UploadEvent::Removed { id } => Some(*id),
            UploadEvent::AllComplete { .. } => None,
        }
    }
}
