use std::future::Future;
use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;

use super::frame::{BusError, BusFrame};

/// The bus collaborator contract.
///
/// `Ok(None)` means the source has ended for good. Implementations must be cancel-safe:
/// the ingest loop races `next_frame` against shutdown.
pub trait BusSource: Send {
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<BusFrame>, BusError>> + Send;

    fn describe(&self) -> String;
}

/// In-process producer handing frames over a channel.
pub struct ChannelSource {
    receiver: mpsc::Receiver<BusFrame>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<BusFrame>) -> Self {
        Self { receiver }
    }

    pub fn pair(capacity: usize) -> (mpsc::Sender<BusFrame>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl BusSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<BusFrame>, BusError> {
        Ok(self.receiver.recv().await)
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

/// Newline-delimited JSON frames, e.g. `{"signal_id":"speed","value":42.0}`.
///
/// Lines are read on a dedicated OS thread and handed over a bounded channel, so a
/// blocking `read` (stdin, a serial device) never pins a runtime worker and shutdown
/// never waits on it. A line that does not parse is reported as [`BusError::Malformed`];
/// read errors are hard failures.
pub struct LineSource {
    lines: mpsc::Receiver<io::Result<String>>,
    label: String,
}

impl LineSource {
    pub fn spawn<R>(reader: R, label: &str, capacity: usize) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        thread::Builder::new()
            .name(format!("{}-reader", label))
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    // Receiver gone means the ingest loop has stopped
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(Self {
            lines: rx,
            label: label.to_string(),
        })
    }
}

impl BusSource for LineSource {
    async fn next_frame(&mut self) -> Result<Option<BusFrame>, BusError> {
        loop {
            let Some(line) = self.lines.recv().await else {
                return Ok(None);
            };
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| BusError::Malformed(e.to_string()));
        }
    }

    fn describe(&self) -> String {
        format!("lines:{}", self.label)
    }
}
