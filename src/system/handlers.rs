// src/system/handlers.rs

//! Read/write handlers attached to captured child streams.
//!
//! A handler runs on the pump thread of the stream it is attached to, never on the caller's
//! thread, so every handler must be `Send`. Results are shared back to the caller through
//! `Arc<Mutex<_>>` buffers or channels.

use crate::constants::DEFAULT_CHUNK_SIZE;
use std::fmt;
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives the output of a child stream.
pub trait ReadHandler: Send {
    /// Called with every chunk read from the stream. Chunks are never empty.
    fn on_output(&mut self, chunk: &[u8]);

    /// Called once when the stream reaches end-of-file or the pump is finished.
    fn on_eof(&mut self) {}

    /// Maximum number of bytes handed to a single `on_output` call.
    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }
}

/// What a [`WriteHandler`] wants after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Call again when the stream is writable.
    Pending,
    /// No more input. The endpoint is closed so the child sees end-of-file.
    Finished,
}

/// Feeds the input of a child stream.
pub trait WriteHandler: Send {
    /// Called whenever the stream is writable.
    fn on_writable(&mut self, endpoint: &mut dyn Write) -> io::Result<WriteProgress>;
}

// --- Output handlers ---

/// Collects everything the child writes into a shared in-memory buffer.
///
/// Clones share the same buffer: keep one clone, hand the other to the spawn call.
#[derive(Debug, Clone, Default)]
pub struct CaptureOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CaptureOutput {
    /// Creates an empty capture buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the bytes captured so far.
    pub fn data(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The captured bytes as text. Invalid UTF-8 sequences are replaced.
    pub fn string(&self) -> String {
        String::from_utf8_lossy(&self.data()).into_owned()
    }

    /// `true` while nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl ReadHandler for CaptureOutput {
    fn on_output(&mut self, chunk: &[u8]) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }
}

/// Calls a closure with every chunk of output.
pub struct OutputCallback<F> {
    callback: F,
    chunk_size: usize,
}

impl<F> OutputCallback<F>
where
    F: FnMut(&[u8]) + Send,
{
    /// Wraps `callback` using the default chunk size.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Limits every chunk to `chunk_size` bytes (at least one).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl<F> ReadHandler for OutputCallback<F>
where
    F: FnMut(&[u8]) + Send,
{
    fn on_output(&mut self, chunk: &[u8]) {
        (self.callback)(chunk);
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<F> fmt::Debug for OutputCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputCallback")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// Forwards output chunks into a channel.
///
/// The receiving side works as a blocking iterator that ends once the stream is closed.
#[derive(Debug)]
pub struct ChannelOutput {
    sender: Option<Sender<Vec<u8>>>,
}

/// Creates a channel-backed output handler and the receiver for its chunks.
pub fn output_channel() -> (ChannelOutput, Receiver<Vec<u8>>) {
    let (sender, receiver) = mpsc::channel();
    (
        ChannelOutput {
            sender: Some(sender),
        },
        receiver,
    )
}

impl ReadHandler for ChannelOutput {
    fn on_output(&mut self, chunk: &[u8]) {
        if let Some(sender) = &self.sender {
            if sender.send(chunk.to_vec()).is_err() {
                log::trace!("Output receiver dropped; discarding further chunks.");
                self.sender = None;
            }
        }
    }

    fn on_eof(&mut self) {
        // Dropping the sender ends the receiver's iterator.
        self.sender = None;
    }
}

// --- Input handlers ---

/// One step of input produced by an [`InputCallback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputChunk {
    /// Bytes to write. May be empty.
    pub data: Vec<u8>,
    /// `true` when this is the last chunk.
    pub is_end_of_file: bool,
}

impl InputChunk {
    /// A chunk that is followed by more input.
    pub fn more(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            is_end_of_file: false,
        }
    }

    /// The final chunk.
    pub fn last(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            is_end_of_file: true,
        }
    }
}

/// Asks a closure for the next chunk of input whenever the child can accept it.
pub struct InputCallback<F> {
    callback: F,
}

impl<F> InputCallback<F>
where
    F: FnMut() -> InputChunk + Send,
{
    /// Wraps `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> WriteHandler for InputCallback<F>
where
    F: FnMut() -> InputChunk + Send,
{
    fn on_writable(&mut self, endpoint: &mut dyn Write) -> io::Result<WriteProgress> {
        let chunk = (self.callback)();
        if !chunk.data.is_empty() {
            endpoint.write_all(&chunk.data)?;
            endpoint.flush()?;
        }
        Ok(if chunk.is_end_of_file {
            WriteProgress::Finished
        } else {
            WriteProgress::Pending
        })
    }
}

impl<F> fmt::Debug for InputCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputCallback").finish_non_exhaustive()
    }
}

/// Writes a fixed string, then closes the stream.
#[derive(Debug, Clone)]
pub struct StringInput {
    content: Vec<u8>,
}

impl StringInput {
    /// Input consisting of exactly `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into().into_bytes(),
        }
    }
}

impl WriteHandler for StringInput {
    fn on_writable(&mut self, endpoint: &mut dyn Write) -> io::Result<WriteProgress> {
        endpoint.write_all(&self.content)?;
        endpoint.flush()?;
        self.content.clear();
        Ok(WriteProgress::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_output_shares_buffer_between_clones() {
        let capture = CaptureOutput::new();
        let mut handler = capture.clone();

        handler.on_output(b"Hello ");
        handler.on_output(b"World");
        handler.on_eof();

        assert_eq!(capture.string(), "Hello World");
        assert_eq!(capture.data(), b"Hello World".to_vec());
        assert!(!capture.is_empty());
    }

    #[test]
    fn test_output_callback_respects_chunk_size() {
        let mut seen = Vec::new();
        {
            let mut handler = OutputCallback::new(|chunk: &[u8]| seen.push(chunk.len()))
                .with_chunk_size(0);
            assert_eq!(handler.chunk_size(), 1);
            handler.on_output(b"x");
        }
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_channel_output_closes_on_eof() {
        let (mut handler, receiver) = output_channel();
        handler.on_output(b"one");
        handler.on_output(b"two");
        handler.on_eof();
        handler.on_output(b"ignored");

        let chunks: Vec<Vec<u8>> = receiver.iter().collect();
        assert_eq!(chunks, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_string_input_writes_everything_then_finishes() {
        let mut handler = StringInput::new("hello world");
        let mut sink: Vec<u8> = Vec::new();

        let progress = handler.on_writable(&mut sink).expect("write to vec");
        assert_eq!(progress, WriteProgress::Finished);
        assert_eq!(sink, b"hello world".to_vec());
    }

    #[test]
    fn test_input_callback_reports_pending_until_last_chunk() {
        let mut parts = vec![InputChunk::last("b"), InputChunk::more("a")];
        let mut handler =
            InputCallback::new(move || parts.pop().unwrap_or_else(|| InputChunk::last("")));
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(
            handler.on_writable(&mut sink).expect("first write"),
            WriteProgress::Pending
        );
        assert_eq!(
            handler.on_writable(&mut sink).expect("second write"),
            WriteProgress::Finished
        );
        assert_eq!(sink, b"ab".to_vec());
    }
}
