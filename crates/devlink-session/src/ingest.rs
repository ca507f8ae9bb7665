use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use devlink_transport::TransportChannel;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};

/// Pause after a non-timeout read error before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Bytes buffered between the ingest thread and its consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64 * 1024;

const THREAD_NAME: &str = "devlink-log-ingest";

/// Pulls unsolicited log output off a dedicated channel, one byte at a time.
///
/// Read errors never end ingestion: a disconnected or noisy log port is
/// retried until the ingestor is told to stop.
#[derive(Debug, Clone, Copy)]
pub struct LogIngestor {
    retry_delay: Duration,
    capacity: usize,
}

impl Default for LogIngestor {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LogIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the queue capacity used by [`spawn`](Self::spawn). Zero is raised to one.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Feed every byte read from `channel` to `sink` until `stop` is set.
    ///
    /// `stop` is checked between reads, so shutdown latency is bounded by
    /// the channel's read timeout.
    pub fn run<F>(&self, channel: &mut TransportChannel, mut sink: F, stop: &AtomicBool)
    where
        F: FnMut(u8),
    {
        let mut failing = false;
        while !stop.load(Ordering::SeqCst) {
            match channel.read_byte() {
                Ok(byte) => {
                    if failing {
                        debug!(address = channel.address(), "log channel recovered");
                        failing = false;
                    }
                    sink(byte);
                }
                // Quiet line; nothing to report.
                Err(err) if err.is_timeout() => {}
                Err(err) => {
                    if !failing {
                        debug!(address = channel.address(), error = %err, "log read failed, retrying");
                        failing = true;
                    } else {
                        trace!(address = channel.address(), error = %err, "log read still failing");
                    }
                    thread::sleep(self.retry_delay);
                }
            }
        }
        debug!(address = channel.address(), "log ingestion stopped");
    }

    /// Run ingestion on a background thread feeding a bounded queue.
    ///
    /// `channel` must already be open. The thread blocks while the queue is
    /// full, so no bytes are dropped.
    pub fn spawn(&self, mut channel: TransportChannel) -> Result<LogStream> {
        if !channel.is_open() {
            return Err(SessionError::NotOpen);
        }

        let (sender, receiver) = mpsc::sync_channel(self.capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let ingestor = *self;
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let sink = forward_to(sender, Arc::clone(&thread_stop));
                ingestor.run(&mut channel, sink, &thread_stop);
                channel
            })
            .map_err(SessionError::Spawn)?;

        Ok(LogStream {
            receiver,
            stop,
            handle: Some(handle),
        })
    }
}

/// Queue sink that stops ingestion once the consumer is gone.
fn forward_to(sender: SyncSender<u8>, stop: Arc<AtomicBool>) -> impl FnMut(u8) {
    move |byte| {
        if sender.send(byte).is_err() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

/// Consumer end of a spawned [`LogIngestor`].
///
/// Dropping the stream signals the thread to stop without waiting for it.
#[derive(Debug)]
pub struct LogStream {
    receiver: Receiver<u8>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<TransportChannel>>,
}

impl LogStream {
    /// Block until the next byte arrives. `None` once ingestion has ended
    /// and the queue is drained.
    pub fn recv(&self) -> Option<u8> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<u8> {
        match self.receiver.recv_timeout(timeout) {
            Ok(byte) => Some(byte),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<u8> {
        self.receiver.try_recv().ok()
    }

    /// Blocking iterator over incoming bytes; ends when ingestion ends.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.receiver.iter()
    }

    /// Every byte queued right now, without blocking.
    pub fn drain(&self) -> Vec<u8> {
        self.receiver.try_iter().collect()
    }

    /// Whether the ingest thread is still running.
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop ingestion and wait for the thread, handing the channel back.
    ///
    /// Returns `None` if the ingest thread panicked.
    pub fn stop(mut self) -> Option<TransportChannel> {
        self.stop.store(true, Ordering::SeqCst);
        // Disconnect the queue so a thread blocked on a full queue wakes up.
        let (_, idle) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.receiver, idle));
        self.handle.take()?.join().ok()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use devlink_transport::{StreamConnector, TerminatorPair, TransportConfig};

    use super::*;

    /// Yields its bytes, then fails every read as if unplugged.
    struct FlakyStream {
        bytes: VecDeque<u8>,
        failures: Arc<AtomicUsize>,
    }

    impl Read for FlakyStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.bytes.pop_front() {
                Some(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                _ => {
                    self.failures.fetch_add(1, Ordering::SeqCst);
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"))
                }
            }
        }
    }

    impl Write for FlakyStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn flaky_channel(bytes: &[u8]) -> (TransportChannel, Arc<AtomicUsize>) {
        let failures = Arc::new(AtomicUsize::new(0));
        let stream = FlakyStream {
            bytes: bytes.iter().copied().collect(),
            failures: Arc::clone(&failures),
        };
        let mut channel = TransportChannel::new(
            TransportConfig::new("log", 115_200),
            TerminatorPair::new("\n", "\n").unwrap(),
            StreamConnector::new(stream),
        );
        channel.open().unwrap();
        (channel, failures)
    }

    fn fast_ingestor() -> LogIngestor {
        LogIngestor::new().with_retry_delay(Duration::from_millis(2))
    }

    #[test]
    fn run_delivers_bytes_and_survives_errors() {
        let (mut channel, failures) = flaky_channel(&[0x41, 0x42]);
        let stop = Arc::new(AtomicBool::new(false));
        let received = Mutex::new(Vec::new());

        let stopper = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::SeqCst);
            })
        };
        fast_ingestor().run(
            &mut channel,
            |byte| received.lock().unwrap().push(byte),
            &stop,
        );
        stopper.join().unwrap();

        assert_eq!(*received.lock().unwrap(), [0x41, 0x42]);
        assert!(failures.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn spawned_stream_keeps_running_after_errors() {
        let (channel, failures) = flaky_channel(&[0x41, 0x42]);
        let stream = fast_ingestor().spawn(channel).unwrap();

        assert_eq!(stream.recv_timeout(Duration::from_secs(5)), Some(0x41));
        assert_eq!(stream.recv_timeout(Duration::from_secs(5)), Some(0x42));

        thread::sleep(Duration::from_millis(30));
        assert!(stream.is_alive());
        assert!(failures.load(Ordering::SeqCst) >= 1);
        assert!(stream.try_recv().is_none());

        let channel = stream.stop().expect("ingest thread should not panic");
        assert!(channel.is_open());
    }

    #[test]
    fn stop_unblocks_a_full_queue() {
        let (channel, _) = flaky_channel(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let stream = fast_ingestor().with_capacity(2).spawn(channel).unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(stream.stop().is_some());
    }

    #[test]
    fn spawn_requires_open_channel() {
        let channel = TransportChannel::new(
            TransportConfig::new("log", 115_200),
            TerminatorPair::new("\n", "\n").unwrap(),
            StreamConnector::new(io::Cursor::new(Vec::new())),
        );
        assert!(matches!(
            LogIngestor::new().spawn(channel),
            Err(SessionError::NotOpen)
        ));
    }

    #[test]
    fn drain_returns_queued_bytes() {
        let (channel, _) = flaky_channel(b"boot ok\n");
        let stream = fast_ingestor().spawn(channel).unwrap();

        let mut collected = Vec::new();
        while collected.len() < 8 {
            match stream.recv_timeout(Duration::from_secs(5)) {
                Some(byte) => collected.push(byte),
                None => break,
            }
            collected.extend(stream.drain());
        }
        assert_eq!(collected, b"boot ok\n");
    }
}
