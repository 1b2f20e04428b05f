use std::sync::Mutex;

/// Message kinds the host surface distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Transient status line, always shown.
    Status,
    /// Informational notification.
    Info,
    /// Warning notification.
    Warn,
}

/// Notification interface toward the host editor.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn status(&self, message: &str);
    async fn info(&self, message: &str);
    async fn warn(&self, message: &str);
}

/// Prints to stdout/stderr.
pub struct StdoutNotifier;

#[async_trait::async_trait]
impl Notifier for StdoutNotifier {
    async fn status(&self, message: &str) {
        println!("[pulse] {message}");
    }

    async fn info(&self, message: &str) {
        println!("[pulse] {message}");
    }

    async fn warn(&self, message: &str) {
        eprintln!("[pulse] warning: {message}");
    }
}

/// Collects messages in memory (for testing).
pub struct CollectNotifier {
    messages: Mutex<Vec<(NoticeKind, String)>>,
}

impl Default for CollectNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(NoticeKind, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: NoticeKind) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.of_kind(NoticeKind::Info)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.of_kind(NoticeKind::Warn)
    }

    pub fn statuses(&self) -> Vec<String> {
        self.of_kind(NoticeKind::Status)
    }

    fn push(&self, kind: NoticeKind, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}

#[async_trait::async_trait]
impl Notifier for CollectNotifier {
    async fn status(&self, message: &str) {
        self.push(NoticeKind::Status, message);
    }

    async fn info(&self, message: &str) {
        self.push(NoticeKind::Info, message);
    }

    async fn warn(&self, message: &str) {
        self.push(NoticeKind::Warn, message);
    }
}
