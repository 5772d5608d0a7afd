/// Messages consumed by the sync worker, in delivery order.
#[derive(Debug)]
pub enum SyncMsg {
    /// Raw notification from the directory watcher.
    Event(notify::Event),
    /// The watcher backend reported a failure.
    WatchError(notify::Error),
    /// No more events follow. Sent once the watcher is dropped.
    Stop,
}
