//! Stream wrappers: receive-only, send-only and bidirectional.
//!
//! The wrappers translate the engine's end-of-stream and error conditions
//! into [`StreamReadResult::finished`], turn a final write into a stream
//! finish, and enforce per-direction deadlines.

use peerquic_types::{StreamId, StreamReadResult, StreamWriteParameters};
use quinn::{RecvStream, SendStream};
use tokio::time::Instant;
use tracing::trace;

use crate::deadline::Deadline;
use crate::error::StreamError;

fn stream_id(id: quinn::StreamId) -> StreamId {
    StreamId(quinn::VarInt::from(id).into_inner())
}

/// The receive side of a stream.
#[derive(Debug)]
pub struct ReadableStream {
    stream: RecvStream,
    deadline: Deadline,
    finished: bool,
}

impl ReadableStream {
    pub(crate) fn new(stream: RecvStream) -> Self {
        Self {
            stream,
            deadline: Deadline::new(),
            finished: false,
        }
    }

    /// Read available bytes into `buf`.
    ///
    /// Returns `finished = true` once the peer has finished the stream. A
    /// deadline expiry returns [`StreamError::TimedOut`] and leaves the stream
    /// readable; any other error ends the read side, and later calls return
    /// the finished result without reading.
    pub async fn read_into(&mut self, buf: &mut [u8]) -> Result<StreamReadResult, StreamError> {
        if self.finished {
            return Ok(StreamReadResult::finished());
        }

        let read = self.deadline.guard(self.stream.read(buf)).await?;
        match read {
            Ok(Some(amount)) => {
                trace!(stream = %self.stream_id(), amount, "read");
                Ok(StreamReadResult::data(amount))
            }
            Ok(None) => {
                trace!(stream = %self.stream_id(), "peer finished stream");
                self.finished = true;
                Ok(StreamReadResult::finished())
            }
            Err(e) => {
                self.finished = true;
                Err(e.into())
            }
        }
    }

    pub fn stream_id(&self) -> StreamId {
        stream_id(self.stream.id())
    }

    /// Whether the read side has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Set the deadline for pending and future reads; `None` disables it.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }

    /// Handle for moving the read deadline from another task.
    pub fn read_deadline(&self) -> Deadline {
        self.deadline.clone()
    }

    /// Ask the peer to stop sending; the read side ends immediately.
    pub fn stop(&mut self, error_code: u32) -> Result<(), StreamError> {
        self.finished = true;
        self.stream
            .stop(quinn::VarInt::from_u32(error_code))
            .map_err(|e| StreamError::Closed(e.to_string()))
    }

    /// Give up the wrapper and return the engine stream.
    pub fn detach(self) -> RecvStream {
        self.stream
    }
}

/// The send side of a stream.
#[derive(Debug)]
pub struct WritableStream {
    stream: SendStream,
    deadline: Deadline,
    finished: bool,
}

impl WritableStream {
    pub(crate) fn new(stream: SendStream) -> Self {
        Self {
            stream,
            deadline: Deadline::new(),
            finished: false,
        }
    }

    /// Write all of `params.data`, then finish the stream if requested.
    ///
    /// The finish is only attempted after the data was written. Writing after
    /// a finished write fails with [`StreamError::Finished`].
    ///
    /// When the write deadline passes first, the error is
    /// [`StreamError::WriteTimedOut`] carrying how many bytes went out; the
    /// stream stays open and a later write can continue with the rest.
    pub async fn write(&mut self, params: StreamWriteParameters) -> Result<(), StreamError> {
        if self.finished {
            return Err(StreamError::Finished);
        }

        let StreamWriteParameters { data, finished } = params;
        let mut written = 0;
        while written < data.len() {
            // `SendStream::write` is cancel-safe, so an expired deadline
            // never loses track of accepted bytes
            match self.deadline.guard(self.stream.write(&data[written..])).await {
                Ok(result) => written += result?,
                Err(_) => return Err(StreamError::WriteTimedOut { written }),
            }
        }
        trace!(stream = %self.stream_id(), len = written, finished, "wrote");

        if finished {
            self.finish()?;
        }
        Ok(())
    }

    /// Finish the stream without writing more data.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.finished {
            return Ok(());
        }
        self.finish()
    }

    /// Abandon the stream; unsent data is discarded and the peer sees a reset.
    pub fn reset(&mut self, error_code: u32) -> Result<(), StreamError> {
        self.finished = true;
        self.stream
            .reset(quinn::VarInt::from_u32(error_code))
            .map_err(|e| StreamError::Closed(e.to_string()))
    }

    /// Wait until the peer has received everything up to the finish, or has
    /// stopped the stream. Returns the peer's stop code in the latter case.
    ///
    /// Closing the session discards data the peer has not acknowledged yet,
    /// so wait for this before stopping right after a final write.
    pub async fn stopped(&mut self) -> Result<Option<u64>, StreamError> {
        let stopped = self.deadline.guard(self.stream.stopped()).await?;
        match stopped {
            Ok(code) => Ok(code.map(quinn::VarInt::into_inner)),
            Err(quinn::StoppedError::ConnectionLost(e)) => Err(StreamError::ConnectionLost(e)),
            Err(e) => Err(StreamError::Closed(e.to_string())),
        }
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.stream
            .finish()
            .map_err(|e| StreamError::Closed(e.to_string()))?;
        self.finished = true;
        Ok(())
    }

    pub fn stream_id(&self) -> StreamId {
        stream_id(self.stream.id())
    }

    /// Whether the write side has been finished or reset.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Set the deadline for pending and future writes; `None` disables it.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }

    /// Handle for moving the write deadline from another task.
    pub fn write_deadline(&self) -> Deadline {
        self.deadline.clone()
    }

    /// Give up the wrapper and return the engine stream.
    pub fn detach(self) -> SendStream {
        self.stream
    }
}

/// A full-duplex stream: one send side and one receive side sharing an id.
#[derive(Debug)]
pub struct BidirectionalStream {
    send: WritableStream,
    recv: ReadableStream,
}

impl BidirectionalStream {
    pub(crate) fn new(send: SendStream, recv: RecvStream) -> Self {
        Self {
            send: WritableStream::new(send),
            recv: ReadableStream::new(recv),
        }
    }

    /// See [`ReadableStream::read_into`].
    pub async fn read_into(&mut self, buf: &mut [u8]) -> Result<StreamReadResult, StreamError> {
        self.recv.read_into(buf).await
    }

    /// See [`WritableStream::write`].
    pub async fn write(&mut self, params: StreamWriteParameters) -> Result<(), StreamError> {
        self.send.write(params).await
    }

    pub fn stream_id(&self) -> StreamId {
        self.send.stream_id()
    }

    /// Set both the read and the write deadline.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.recv.set_read_deadline(deadline);
        self.send.set_write_deadline(deadline);
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.recv.set_read_deadline(deadline);
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.send.set_write_deadline(deadline);
    }

    /// Finish the send side without writing more data.
    pub fn close(&mut self) -> Result<(), StreamError> {
        self.send.close()
    }

    /// Separate the halves so reads and writes can run on different tasks.
    pub fn split(self) -> (WritableStream, ReadableStream) {
        (self.send, self.recv)
    }

    /// Give up the wrapper and return the engine streams.
    pub fn detach(self) -> (SendStream, RecvStream) {
        (self.send.detach(), self.recv.detach())
    }
}
