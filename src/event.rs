use tokio::sync::mpsc;

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
  Success,
  Error,
}

/// Events raised for whatever UI sits on top of the client core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
  /// Short message for the user (toast, status line, stderr)
  Notice { kind: NoticeKind, message: String },
  /// The session was rejected by the server; show the login entry point
  RedirectToLogin,
}

/// Sending half of the event channel.
///
/// Cheap to clone. A sink created with [`EventSink::disconnected`] drops
/// everything, and events sent after the stream is gone are dropped too.
#[derive(Debug, Clone)]
pub struct EventSink {
  tx: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl EventSink {
  /// Create a connected sink and the stream that receives its events
  pub fn channel() -> (Self, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx: Some(tx) }, EventStream { rx })
  }

  pub fn disconnected() -> Self {
    Self { tx: None }
  }

  pub fn success(&self, message: impl Into<String>) {
    self.send(AppEvent::Notice {
      kind: NoticeKind::Success,
      message: message.into(),
    });
  }

  pub fn error(&self, message: impl Into<String>) {
    self.send(AppEvent::Notice {
      kind: NoticeKind::Error,
      message: message.into(),
    });
  }

  pub fn redirect_to_login(&self) {
    self.send(AppEvent::RedirectToLogin);
  }

  fn send(&self, event: AppEvent) {
    if let Some(tx) = &self.tx {
      // Ignore send errors - the receiver may have been dropped
      let _ = tx.send(event);
    }
  }
}

/// Receiving half of the event channel
pub struct EventStream {
  rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventStream {
  /// Receive the next event
  pub async fn next(&mut self) -> Option<AppEvent> {
    self.rx.recv().await
  }

  /// Take every event queued so far without waiting
  pub fn drain(&mut self) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = self.rx.try_recv() {
      events.push(event);
    }
    events
  }
}
