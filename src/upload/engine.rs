//! the upload engine
use {
    crate::{
        error::Result,
        files::FileBlob,
        upload::{
            QueueCounts, UploadEvent, UploadItem, UploadSettings, UploadStatus,
            transport::{ProgressSink, UploadTransport},
        },
    },
    chrono::Utc,
    hashbrown::HashMap,
    serde_json::Value,
    std::{
        sync::{Arc, Mutex, MutexGuard, PoisonError},
        time::Duration,
    },
    tokio::{
        sync::{Notify, OwnedSemaphorePermit, Semaphore, broadcast},
        task::AbortHandle,
        time::Instant,
    },
    tracing::{debug, info, warn},
    uuid::Uuid,
};

/// how many events a slow subscriber may fall behind by
const EVENT_CAPACITY: usize = 256;

/// an item plus whether it wants a slot
#[derive(Debug)]
struct Entry {
    /// the public item
    item: UploadItem,
    /// picked up by the queue when a slot frees
    queued: bool,
}

/// an attempt that holds a slot
#[derive(Debug)]
struct InFlight {
    /// the attempt it belongs to
    attempt: u32,
    /// aborts the request
    task: AbortHandle,
    /// the slot, released when this is dropped
    _permit: OwnedSemaphorePermit,
}

/// everything behind the queue lock
#[derive(Debug, Default)]
struct Queue {
    /// items in the order they were added
    entries: Vec<Entry>,
    /// running attempts by item id
    in_flight: HashMap<Uuid, InFlight>,
    /// something started since the last `AllComplete`
    active: bool,
}

impl Queue {
    /// the entry of an item
    fn entry_mut(&mut self, id: Uuid) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.item.id == id)
    }

    /// nothing in flight and nothing waiting for a slot
    fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
            && !self
                .entries
                .iter()
                .any(|e| e.queued && e.item.status == UploadStatus::Idle)
    }

    /// count items per state
    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for entry in &self.entries {
            match entry.item.status {
                UploadStatus::Idle => counts.idle += 1,
                UploadStatus::Uploading => counts.uploading += 1,
                UploadStatus::Paused => counts.paused += 1,
                UploadStatus::Completed => counts.completed += 1,
                UploadStatus::Error => counts.failed += 1,
                UploadStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

/// state shared between the engine handles and the upload tasks
struct Shared {
    /// the queue
    queue: Mutex<Queue>,
    /// where bytes go
    transport: Arc<dyn UploadTransport>,
    /// engine settings
    settings: UploadSettings,
    /// one permit per concurrent upload
    slots: Arc<Semaphore>,
    /// the event feed
    events: broadcast::Sender<UploadEvent>,
    /// woken whenever the queue goes idle
    idle: Notify,
}

/// the upload engine, cheap to clone and share
///
/// every method that can start an upload spawns onto the current tokio runtime, so they
/// must be called from inside one
#[derive(Clone)]
pub struct UploadEngine {
    /// the shared state
    shared: Arc<Shared>,
}

/// the average speed and remaining time of an attempt
pub fn rates(bytes: u64, total: u64, elapsed: Duration) -> (Option<f64>, Option<Duration>) {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 || bytes == 0 {
        return (None, None);
    }

    let speed = bytes as f64 / secs;
    let eta = Duration::try_from_secs_f64(total.saturating_sub(bytes) as f64 / speed).ok();
    (Some(speed), eta)
}

/// percent of `total` that `bytes` is
fn percent(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (bytes.saturating_mul(100) / total).min(100) as u8
}

impl UploadEngine {
    /// make an engine around a transport
    pub fn new(settings: UploadSettings, transport: Arc<dyn UploadTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let slots = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));

        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                transport,
                settings,
                slots,
                events,
                idle: Notify::new(),
            }),
        }
    }

    /// the settings the engine runs with
    pub fn settings(&self) -> &UploadSettings {
        &self.shared.settings
    }

    /// lock the queue
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// send an event, fine if nobody listens
    fn emit(&self, event: UploadEvent) {
        let _ = self.shared.events.send(event);
    }

    /// subscribe to queue events
    pub fn events(&self) -> broadcast::Receiver<UploadEvent> {
        self.shared.events.subscribe()
    }

    /// queue a file, starting it right away when auto-start is on
    pub fn add_file(&self, file: FileBlob) -> Uuid {
        let item = UploadItem::new(file);
        let id = item.id;
        let auto_start = self.shared.settings.auto_start;

        let mut queue = self.lock();
        debug!(%id, file = %item.file.name, size = item.file.size, "queued upload");
        queue.entries.push(Entry {
            item,
            queued: auto_start,
        });
        self.emit(UploadEvent::Added { id });

        if auto_start {
            self.pump(&mut queue);
        }

        id
    }

    /// queue a batch of files in one go
    ///
    /// nothing starts until the whole batch is in, so the queue can't drain halfway through;
    /// with auto-start off the files just wait for `start_all`
    pub fn add_files(&self, files: impl IntoIterator<Item = FileBlob>) -> Vec<Uuid> {
        let auto_start = self.shared.settings.auto_start;
        let mut queue = self.lock();

        let ids: Vec<Uuid> = files
            .into_iter()
            .map(|file| {
                let item = UploadItem::new(file);
                let id = item.id;
                debug!(%id, file = %item.file.name, size = item.file.size, "queued upload");
                queue.entries.push(Entry {
                    item,
                    queued: auto_start,
                });
                self.emit(UploadEvent::Added { id });
                id
            })
            .collect();

        if auto_start {
            self.pump(&mut queue);
        }

        ids
    }

    /// start an item now if a slot is free; otherwise it waits for one
    ///
    /// returns whether it started
    pub fn upload_file(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let Some(entry) = queue.entry_mut(id) else {
            return false;
        };

        if entry.item.status != UploadStatus::Idle {
            return false;
        }
        entry.queued = true;

        let Ok(permit) = Arc::clone(&self.shared.slots).try_acquire_owned() else {
            debug!(%id, "no free upload slot, item stays queued");
            return false;
        };

        self.start(&mut queue, id, permit);
        true
    }

    /// queue every idle item
    pub fn start_all(&self) {
        let mut queue = self.lock();
        for entry in &mut queue.entries {
            if entry.item.status == UploadStatus::Idle {
                entry.queued = true;
            }
        }
        self.pump(&mut queue);
    }

    /// abort an item; idle ones are cancelled without ever being sent
    ///
    /// returns whether anything changed
    pub fn cancel_upload(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let changed = self.stop(&mut queue, id, UploadStatus::Cancelled);
        if changed {
            self.emit(UploadEvent::Cancelled { id });
            self.pump(&mut queue);
        }
        changed
    }

    /// stop an item; this aborts the request just like a cancel and `resume` starts over
    pub fn pause(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let paused = queue
            .entry_mut(id)
            .is_some_and(|e| matches!(e.item.status, UploadStatus::Idle | UploadStatus::Uploading));

        if paused && self.stop(&mut queue, id, UploadStatus::Paused) {
            self.emit(UploadEvent::Paused { id });
            self.pump(&mut queue);
            return true;
        }
        false
    }

    /// put a paused item back in the queue
    pub fn resume(&self, id: Uuid) -> bool {
        self.requeue(id, |s| s == UploadStatus::Paused)
    }

    /// put a failed or cancelled item back in the queue as a new attempt
    pub fn retry(&self, id: Uuid) -> bool {
        self.requeue(id, |s| matches!(s, UploadStatus::Error | UploadStatus::Cancelled))
    }

    /// drop an item, aborting it first if it's in flight
    pub fn remove(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let Some(index) = queue.entries.iter().position(|e| e.item.id == id) else {
            return false;
        };

        if let Some(flight) = queue.in_flight.remove(&id) {
            flight.task.abort();
        }
        queue.entries.remove(index);
        self.emit(UploadEvent::Removed { id });
        self.pump(&mut queue);
        true
    }

    /// abort everything and empty the queue
    pub fn clear_all(&self) {
        let mut queue = self.lock();
        for (_, flight) in queue.in_flight.drain() {
            flight.task.abort();
        }

        let removed: Vec<Uuid> = queue.entries.drain(..).map(|e| e.item.id).collect();
        for id in &removed {
            self.emit(UploadEvent::Removed { id: *id });
        }

        queue.active = false;
        self.shared.idle.notify_waiters();
        info!(removed = removed.len(), "cleared upload queue");
    }

    /// a snapshot of every item, in queue order
    pub fn items(&self) -> Vec<UploadItem> {
        self.lock().entries.iter().map(|e| e.item.clone()).collect()
    }

    /// a snapshot of one item
    pub fn item(&self, id: Uuid) -> Option<UploadItem> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.item.id == id)
            .map(|e| e.item.clone())
    }

    /// how many items are in each state
    pub fn counts(&self) -> QueueCounts {
        self.lock().counts()
    }

    /// how many slots are free right now
    pub fn free_slots(&self) -> usize {
        self.shared.slots.available_permits()
    }

    /// wait until nothing is in flight and nothing is waiting for a slot
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// move a stopped item back to idle and queue it
    fn requeue(&self, id: Uuid, allowed: impl Fn(UploadStatus) -> bool) -> bool {
        let mut queue = self.lock();
        let Some(entry) = queue.entry_mut(id) else {
            return false;
        };

        if !allowed(entry.item.status) {
            return false;
        }

        entry.item.status = UploadStatus::Idle;
        entry.item.progress = 0;
        entry.item.bytes_uploaded = 0;
        entry.item.speed = None;
        entry.item.eta = None;
        entry.item.error = None;
        entry.queued = true;

        self.pump(&mut queue);
        true
    }

    /// take an item out of the running, releasing its slot
    fn stop(&self, queue: &mut Queue, id: Uuid, status: UploadStatus) -> bool {
        let Some(entry) = queue.entry_mut(id) else {
            return false;
        };

        if entry.item.status.is_terminal() || entry.item.status == status {
            return false;
        }

        entry.item.status = status;
        entry.item.speed = None;
        entry.item.eta = None;
        entry.queued = false;

        if let Some(flight) = queue.in_flight.remove(&id) {
            flight.task.abort();
            debug!(%id, attempt = flight.attempt, %status, "aborted upload");
        }
        true
    }

    /// start queued items while slots are free, then check whether the queue went idle
    fn pump(&self, queue: &mut Queue) {
        loop {
            let next = queue
                .entries
                .iter()
                .find(|e| e.queued && e.item.status == UploadStatus::Idle)
                .map(|e| e.item.id);

            let Some(id) = next else {
                break;
            };

            let Ok(permit) = Arc::clone(&self.shared.slots).try_acquire_owned() else {
                break;
            };

            self.start(queue, id, permit);
        }

        if queue.is_idle() {
            if queue.active {
                queue.active = false;
                let counts = queue.counts();
                info!(
                    completed = counts.completed,
                    failed = counts.failed,
                    cancelled = counts.cancelled,
                    "upload queue drained"
                );
                self.emit(UploadEvent::AllComplete { counts });
            }
            self.shared.idle.notify_waiters();
        }
    }

    /// start an attempt for an item holding a slot
    fn start(&self, queue: &mut Queue, id: Uuid, permit: OwnedSemaphorePermit) {
        let Some(entry) = queue.entry_mut(id) else {
            return;
        };

        entry.queued = false;
        entry.item.status = UploadStatus::Uploading;
        entry.item.attempt += 1;
        entry.item.progress = 0;
        entry.item.bytes_uploaded = 0;
        entry.item.speed = None;
        entry.item.eta = None;
        entry.item.error = None;
        entry.item.started_at = Some(Utc::now());

        let attempt = entry.item.attempt;
        let file = entry.item.file.clone();
        let name = file.name.clone();

        let engine = self.clone();
        let task = tokio::spawn(async move {
            let result = engine.run_attempt(id, attempt, &file).await;
            engine.finish(id, attempt, result);
        });

        queue.in_flight.insert(
            id,
            InFlight {
                attempt,
                task: task.abort_handle(),
                _permit: permit,
            },
        );
        queue.active = true;

        info!(%id, attempt, file = %name, "started upload");
        self.emit(UploadEvent::Started { id, attempt });
    }

    /// send the file, picking the single-request or the chunked path
    async fn run_attempt(&self, id: Uuid, attempt: u32, file: &FileBlob) -> Result<Value> {
        let started = Instant::now();
        let engine = self.clone();
        let total = file.size;

        let report: ProgressSink =
            Arc::new(move |bytes: u64| engine.report(id, attempt, bytes.min(total), total, started));

        let transport = &self.shared.transport;
        let chunk_size = self.shared.settings.chunk_size.max(1);

        if file.size <= chunk_size {
            return transport.upload_whole(file, report).await;
        }

        let session = transport.init_session(file).await?;
        let chunks = file.chunk_count(chunk_size);

        for index in 0..chunks {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(file.size);
            let data = file.read_range(start, end).await?;

            transport
                .upload_chunk(&session, index, chunks, &file.name, data)
                .await?;
            report(end);
        }

        transport.finalize(&session, &file.name).await
    }

    /// record progress of the current attempt
    fn report(&self, id: Uuid, attempt: u32, bytes: u64, total: u64, started: Instant) {
        let mut queue = self.lock();
        if queue.in_flight.get(&id).map(|f| f.attempt) != Some(attempt) {
            return;
        }

        let Some(entry) = queue.entry_mut(id) else {
            return;
        };

        let (speed, eta) = rates(bytes, total, started.elapsed());
        let item = &mut entry.item;
        item.bytes_uploaded = item.bytes_uploaded.max(bytes);
        item.progress = item.progress.max(percent(bytes, total));
        item.speed = speed;
        item.eta = eta;

        self.emit(UploadEvent::Progress {
            id,
            progress: item.progress,
            bytes: item.bytes_uploaded,
            total,
            speed,
            eta,
        });
    }

    /// settle an attempt, ignoring it if the item moved on in the meantime
    fn finish(&self, id: Uuid, attempt: u32, result: Result<Value>) {
        let mut queue = self.lock();
        if queue.in_flight.get(&id).map(|f| f.attempt) != Some(attempt) {
            debug!(%id, attempt, "dropping result of a stale attempt");
            return;
        }

        queue.in_flight.remove(&id);

        if let Some(entry) = queue.entry_mut(id) {
            let item = &mut entry.item;
            match result {
                Ok(response) => {
                    item.status = UploadStatus::Completed;
                    item.progress = 100;
                    item.bytes_uploaded = item.file.size;
                    item.eta = Some(Duration::ZERO);
                    item.completed_at = Some(Utc::now());
                    item.response = Some(response.clone());

                    info!(%id, file = %item.file.name, "upload completed");
                    self.emit(UploadEvent::Completed { id, response });
                }
                Err(e) => {
                    let error = e.to_string();
                    item.status = UploadStatus::Error;
                    item.speed = None;
                    item.eta = None;
                    item.error = Some(error.clone());

                    warn!(%id, file = %item.file.name, %error, "upload failed");
                    self.emit(UploadEvent::Failed { id, error });
                }
            }
        }

        self.pump(&mut queue);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::error::LayeraError,
        async_trait::async_trait,
        hashbrown::HashSet,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    /// decrements the active counter even when the request is aborted
    struct ActiveGuard<'a>(&'a AtomicUsize);

    impl Drop for ActiveGuard<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockTransport {
        log: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl MockTransport {
        fn record(&self, line: String) {
            self.log.lock().unwrap().push(line);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn enter(&self) -> ActiveGuard<'_> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            ActiveGuard(&self.active)
        }
    }

    #[async_trait]
    impl UploadTransport for MockTransport {
        async fn upload_whole(&self, file: &FileBlob, progress: ProgressSink) -> Result<Value> {
            let _guard = self.enter();
            self.record(format!("whole:{}", file.name));

            progress(file.size / 2);
            tokio::time::sleep(Duration::from_millis(100)).await;
            progress(file.size);

            if self.failing.lock().unwrap().contains(&file.name) {
                return Err(LayeraError::Status {
                    status: 500,
                    url: "mock://upload".into(),
                });
            }
            Ok(serde_json::json!({ "name": file.name }))
        }

        async fn init_session(&self, file: &FileBlob) -> Result<String> {
            self.record(format!("init:{}", file.name));
            Ok("session-1".into())
        }

        async fn upload_chunk(
            &self,
            session_id: &str,
            index: u64,
            total_chunks: u64,
            _file_name: &str,
            data: Vec<u8>,
        ) -> Result<()> {
            let _guard = self.enter();
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.record(format!("chunk:{session_id}:{index}/{total_chunks}:{}", data.len()));
            Ok(())
        }

        async fn finalize(&self, session_id: &str, file_name: &str) -> Result<Value> {
            self.record(format!("finalize:{session_id}:{file_name}"));
            Ok(Value::Null)
        }
    }

    fn engine(max_concurrent: usize, chunk_size: u64, auto_start: bool) -> (UploadEngine, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let settings = UploadSettings {
            url: "mock://upload".into(),
            chunk_size,
            max_concurrent,
            auto_start,
            ..UploadSettings::default()
        };
        (UploadEngine::new(settings, transport.clone()), transport)
    }

    fn file(name: &str, size: usize) -> FileBlob {
        FileBlob::from_bytes(name, None, vec![7u8; size])
    }

    fn statuses(engine: &UploadEngine) -> Vec<UploadStatus> {
        engine.items().iter().map(|i| i.status).collect()
    }

    fn drain(rx: &mut broadcast::Receiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_files_two_slots() {
        let (engine, transport) = engine(2, 1024, true);
        let mut rx = engine.events();

        let a = engine.add_file(file("a.txt", 10));
        let b = engine.add_file(file("b.txt", 10));
        let c = engine.add_file(file("c.txt", 10));

        assert_eq!(
            statuses(&engine),
            vec![UploadStatus::Uploading, UploadStatus::Uploading, UploadStatus::Idle]
        );
        assert_eq!(engine.free_slots(), 0);

        engine.wait_idle().await;

        assert_eq!(statuses(&engine), vec![UploadStatus::Completed; 3]);
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 2);
        assert_eq!(engine.free_slots(), 2);

        let started: Vec<Uuid> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Started { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![a, b, c]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_are_sent_in_order() {
        let (engine, transport) = engine(1, 4, true);
        let mut rx = engine.events();

        let id = engine.add_file(file("big.bin", 10));
        engine.wait_idle().await;

        assert_eq!(
            transport.log(),
            vec![
                "init:big.bin",
                "chunk:session-1:0/3:4",
                "chunk:session-1:1/3:4",
                "chunk:session-1:2/3:2",
                "finalize:session-1:big.bin",
            ]
        );

        let progress: Vec<u8> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![40, 80, 100]);
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);

        let item = engine.item(id).unwrap();
        assert_eq!(item.status, UploadStatus::Completed);
        assert_eq!(item.progress, 100);
        assert_eq!(item.bytes_uploaded, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_sends_nothing() {
        let (engine, transport) = engine(1, 1024, true);

        let first = engine.add_file(file("first.txt", 4));
        let second = engine.add_file(file("second.txt", 4));
        assert!(engine.cancel_upload(second));

        engine.wait_idle().await;

        assert_eq!(engine.item(first).unwrap().status, UploadStatus::Completed);
        assert_eq!(engine.item(second).unwrap().status, UploadStatus::Cancelled);
        assert_eq!(transport.log(), vec!["whole:first.txt"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_is_not_an_error() {
        let (engine, _transport) = engine(1, 1024, true);
        let mut rx = engine.events();

        let id = engine.add_file(file("a.txt", 4));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.cancel_upload(id));
        assert!(!engine.cancel_upload(id), "cancelling twice changes nothing");

        engine.wait_idle().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(engine.item(id).unwrap().status, UploadStatus::Cancelled);
        assert_eq!(engine.free_slots(), 1);
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, UploadEvent::Failed { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_retry() {
        let (engine, transport) = engine(1, 1024, true);
        transport.failing.lock().unwrap().insert("bad.txt".into());

        let id = engine.add_file(file("bad.txt", 4));
        engine.wait_idle().await;

        let item = engine.item(id).unwrap();
        assert_eq!(item.status, UploadStatus::Error);
        assert!(item.error.unwrap().contains("500"));
        assert!(!engine.resume(id), "only paused items resume");

        transport.failing.lock().unwrap().clear();
        let mut rx = engine.events();
        assert!(engine.retry(id));
        engine.wait_idle().await;

        let item = engine.item(id).unwrap();
        assert_eq!(item.status, UploadStatus::Completed);
        assert_eq!(item.attempt, 2);
        assert!(item.error.is_none());

        let events = drain(&mut rx);
        assert!(matches!(events[0], UploadEvent::Started { attempt: 2, .. }));
        let progress: Vec<(u8, u64)> = events
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { progress, bytes, .. } => Some((progress, bytes)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(50, 2), (100, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_frees_the_slot_and_resume_starts_over() {
        let (engine, _transport) = engine(1, 1024, true);

        let a = engine.add_file(file("a.txt", 4));
        let b = engine.add_file(file("b.txt", 4));
        assert!(engine.pause(a));

        assert_eq!(engine.item(a).unwrap().status, UploadStatus::Paused);
        assert_eq!(engine.item(b).unwrap().status, UploadStatus::Uploading);

        engine.wait_idle().await;
        assert_eq!(engine.item(a).unwrap().status, UploadStatus::Paused);

        assert!(engine.resume(a));
        engine.wait_idle().await;

        let item = engine.item(a).unwrap();
        assert_eq!(item.status, UploadStatus::Completed);
        assert_eq!(item.attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_start() {
        let (engine, transport) = engine(2, 1024, false);

        let a = engine.add_file(file("a.txt", 4));
        engine.add_file(file("b.txt", 4));
        engine.add_file(file("c.txt", 4));
        engine.wait_idle().await;

        assert_eq!(statuses(&engine), vec![UploadStatus::Idle; 3]);
        assert!(transport.log().is_empty());

        assert!(engine.upload_file(a));
        engine.wait_idle().await;
        assert_eq!(transport.log(), vec!["whole:a.txt"]);

        engine.start_all();
        engine.wait_idle().await;
        assert_eq!(statuses(&engine), vec![UploadStatus::Completed; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_complete_fires_once_per_drain() {
        let (engine, _transport) = engine(2, 1024, true);
        let mut rx = engine.events();

        engine.add_file(file("a.txt", 4));
        engine.add_file(file("b.txt", 4));
        engine.wait_idle().await;

        let done: Vec<QueueCounts> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::AllComplete { counts } => Some(counts),
                _ => None,
            })
            .collect();

        assert_eq!(done.len(), 1);
        assert_eq!(done[0].completed, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_is_queued_before_anything_drains() {
        let (engine, _transport) = engine(1, 1024, true);
        let mut rx = engine.events();

        let ids = engine.add_files([file("a.txt", 4), file("b.txt", 4), file("c.txt", 4)]);
        assert_eq!(ids.len(), 3);

        let counts = loop {
            match rx.recv().await {
                Ok(UploadEvent::AllComplete { counts }) => break counts,
                Ok(_) => {}
                Err(e) => panic!("event feed broke: {e}"),
            }
        };

        assert_eq!(counts.completed, 3);
        assert_eq!(statuses(&engine), vec![UploadStatus::Completed; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_waits_for_start_all_without_auto_start() {
        let (engine, transport) = engine(2, 1024, false);

        engine.add_files([file("a.txt", 4), file("b.txt", 4)]);
        engine.wait_idle().await;
        assert!(transport.log().is_empty());

        engine.start_all();
        engine.wait_idle().await;
        assert_eq!(statuses(&engine), vec![UploadStatus::Completed; 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear_all() {
        let (engine, _transport) = engine(1, 1024, true);

        let a = engine.add_file(file("a.txt", 4));
        engine.add_file(file("b.txt", 4));
        engine.add_file(file("c.txt", 4));

        assert!(engine.remove(a));
        assert!(!engine.remove(a));
        assert_eq!(engine.items().len(), 2);
        assert_eq!(engine.counts().uploading, 1);

        engine.clear_all();
        assert!(engine.items().is_empty());
        engine.wait_idle().await;
        assert_eq!(engine.free_slots(), 1);
    }

    #[test]
    fn test_rates() {
        let (speed, eta) = rates(50, 100, Duration::from_secs(2));
        assert_eq!(speed, Some(25.0));
        assert_eq!(eta, Some(Duration::from_secs(2)));

        assert_eq!(rates(0, 100, Duration::from_secs(1)), (None, None));
        assert_eq!(rates(10, 100, Duration::ZERO), (None, None));
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 100);
    }
}
