//! Playing over TCP.
//!
//! A remote player connects to the tournament server and sends its name as a JSON string.
//! From then on the server drives the conversation: the [`ProxyPlayer`] on the server side
//! turns [`WrappedPlayer`](crate::timeout_player::WrappedPlayer) calls into JSON messages,
//! and the [`PlayerRelay`] on the client side turns those messages back into calls on a local
//! [`Player`](crate::player_interface::Player). See [`wire`] for the message shapes.
//!
//! Values are written one per line but read with a streaming decoder, so peers may send
//! them with any whitespace in between.

mod proxy;
mod relay;
pub mod wire;

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde_json::{de::IoRead, Deserializer, StreamDeserializer, Value};
use tracing::trace;

pub use proxy::ProxyPlayer;
pub use relay::PlayerRelay;

/// Reading half of a connection, failing with [`io::ErrorKind::TimedOut`] once the current
/// deadline has passed, however the bytes trickle in.
struct DeadlineReader {
    stream: TcpStream,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = self
            .deadline
            .lock()
            .map_err(|_| io::Error::other("deadline lock poisoned"))?;
        let timeout = match *deadline {
            None => None,
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "deadline passed"));
                }
                Some(left)
            }
        };
        drop(deadline);
        self.stream.set_read_timeout(timeout)?;
        self.stream.read(buf)
    }
}

/// A TCP connection carrying a stream of JSON values.
pub(crate) struct JsonStream {
    writer: TcpStream,
    deadline: Arc<Mutex<Option<Instant>>>,
    values: StreamDeserializer<'static, IoRead<BufReader<DeadlineReader>>, Value>,
}

impl JsonStream {
    pub(crate) fn new(stream: TcpStream) -> anyhow::Result<Self> {
        let reader = stream
            .try_clone()
            .context("could not clone the connection for reading")?;
        let deadline = Arc::new(Mutex::new(None));
        let reader = DeadlineReader {
            stream: reader,
            deadline: Arc::clone(&deadline),
        };
        Ok(Self {
            writer: stream,
            deadline,
            values: Deserializer::from_reader(BufReader::new(reader)).into_iter(),
        })
    }

    pub(crate) fn send(&mut self, value: &Value) -> io::Result<()> {
        trace!(%value, "send");
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Next value from the peer, or `None` once the peer closed the connection.
    ///
    /// With a `timeout`, the whole value must arrive within it. Otherwise the call fails with
    /// an error of kind [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::TimedOut`],
    /// depending on the platform.
    pub(crate) fn receive(&mut self, timeout: Option<Duration>) -> io::Result<Option<Value>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        *self
            .deadline
            .lock()
            .map_err(|_| io::Error::other("deadline lock poisoned"))? = deadline;
        match self.values.next() {
            None => Ok(None),
            Some(Ok(value)) => {
                trace!(%value, "receive");
                Ok(Some(value))
            }
            Some(Err(e)) => Err(e.into()),
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

pub(crate) fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
