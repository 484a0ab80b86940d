//! Message-passing sink.
//!
//! A front-end that owns its own thread (a GUI event loop, a TUI renderer)
//! holds the receiving end and applies [`SinkEvent`]s on that thread. The
//! pipeline side never blocks: events are pushed onto an unbounded channel.

use tokio::sync::mpsc;

use super::StatusSink;

/// One pipeline event, as seen by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Status(String),
    LogLine(String),
    Progress { current: usize, max: usize },
    Warning(String),
    Ready,
}

/// Forwards every event over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver a front-end should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn post(&self, event: SinkEvent) {
        // A closed receiver means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

impl StatusSink for ChannelSink {
    fn on_status(&self, text: &str) {
        self.post(SinkEvent::Status(text.to_string()));
    }

    fn on_log_line(&self, text: &str) {
        self.post(SinkEvent::LogLine(text.to_string()));
    }

    fn on_progress(&self, current: usize, max: usize) {
        self.post(SinkEvent::Progress { current, max });
    }

    fn on_warning(&self, text: &str) {
        self.post(SinkEvent::Warning(text.to_string()));
    }

    fn on_ready(&self) {
        self.post(SinkEvent::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_status("Downloading latest build...");
        sink.on_log_line("200 OK");
        sink.on_progress(2, 6);
        sink.on_ready();

        assert_eq!(
            rx.try_recv().unwrap(),
            SinkEvent::Status("Downloading latest build...".to_string())
        );
        assert_eq!(rx.try_recv().unwrap(), SinkEvent::LogLine("200 OK".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            SinkEvent::Progress { current: 2, max: 6 }
        );
        assert_eq!(rx.try_recv().unwrap(), SinkEvent::Ready);
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_status("still fine");
    }

    #[test]
    fn posts_from_another_thread() {
        let (sink, mut rx) = ChannelSink::new();
        std::thread::spawn(move || sink.on_warning("from worker"))
            .join()
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SinkEvent::Warning("from worker".to_string())
        );
    }
}
