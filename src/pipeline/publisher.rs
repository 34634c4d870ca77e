use std::{
    io::{ErrorKind, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use rayon::prelude::*;

use crate::{error::TransportError, sim::StateSnapshot, types::Frame};

const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_millis(250);

/// Everything one tick hands to the transport thread.
#[derive(Clone, Debug)]
pub struct TickOutput {
    pub sequence: u64,
    pub state: StateSnapshot,
    pub frame: Frame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full and its oldest entry was discarded.
    Evicted,
}

/// Sending half of the simulation-to-transport handoff. `push` never blocks:
/// when the consumer falls behind the oldest pending output is dropped.
pub struct SnapshotQueue {
    tx: Sender<TickOutput>,
    evict: Receiver<TickOutput>,
}

pub fn snapshot_queue(capacity: usize) -> (SnapshotQueue, Receiver<TickOutput>) {
    let (tx, rx) = bounded(capacity.max(1));
    let queue = SnapshotQueue {
        tx,
        evict: rx.clone(),
    };
    (queue, rx)
}

impl SnapshotQueue {
    pub fn push(&self, output: TickOutput) -> PushOutcome {
        let mut pending = output;
        let mut outcome = PushOutcome::Queued;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return outcome,
                Err(TrySendError::Full(back)) => {
                    // The consumer may drain concurrently, so an empty
                    // eviction is fine; just retry.
                    if self.evict.try_recv().is_ok() {
                        outcome = PushOutcome::Evicted;
                    }
                    pending = back;
                }
                // The queue holds a receiver itself, so this cannot happen
                // while `self` is alive.
                Err(TrySendError::Disconnected(_)) => return outcome,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    PuppetData = 1,
    GardenData = 2,
    Frame = 3,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

/// Destination for encoded per-tick messages.
pub trait SnapshotSink: Send + 'static {
    fn publish(&mut self, messages: &[Message]) -> Result<(), TransportError>;
}

pub fn encode_output(
    output: &TickOutput,
    jpeg_quality: u8,
) -> Result<Vec<Message>, TransportError> {
    let state = match &output.state {
        StateSnapshot::Puppets { entities } => Message {
            kind: MessageKind::PuppetData,
            payload: serde_json::to_vec(entities)?,
        },
        StateSnapshot::Garden { garden, .. } => Message {
            kind: MessageKind::GardenData,
            payload: serde_json::to_vec(garden)?,
        },
    };
    let frame = Message {
        kind: MessageKind::Frame,
        payload: encode_jpeg(&output.frame, jpeg_quality)?,
    };
    Ok(vec![state, frame])
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, TransportError> {
    let pixels = (frame.width as usize) * (frame.height as usize);
    let mut rgb = vec![0u8; pixels * 3];
    rgb.par_chunks_exact_mut(3)
        .zip(frame.rgba.par_chunks_exact(4))
        .for_each(|(dst, src)| dst.copy_from_slice(&src[..3]));

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        &rgb,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

/// Writes `[tag: u8][len: u32 BE][payload]`.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), TransportError> {
    let len = u32::try_from(message.payload.len())
        .map_err(|_| TransportError::Oversized(message.payload.len()))?;
    let mut header = [0u8; 5];
    header[0] = message.kind as u8;
    header[1..].copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(&message.payload)?;
    Ok(())
}

/// Spawns the transport thread. It runs until every sender is gone.
pub fn start_publisher<S: SnapshotSink>(
    rx: Receiver<TickOutput>,
    mut sink: S,
    jpeg_quality: u8,
) -> Result<thread::JoinHandle<()>, TransportError> {
    let handle = thread::Builder::new()
        .name("publisher".into())
        .spawn(move || {
            let mut published = 0u64;
            for output in rx.iter() {
                let messages = match encode_output(&output, jpeg_quality) {
                    Ok(messages) => messages,
                    Err(err) => {
                        log::warn!("dropping tick {}: {err}", output.sequence);
                        continue;
                    }
                };
                if let Err(err) = sink.publish(&messages) {
                    log::warn!("failed to publish tick {}: {err}", output.sequence);
                    continue;
                }
                published += 1;
                log::trace!(
                    "tick {} published {:?} after render",
                    output.sequence,
                    output.frame.timestamp.elapsed()
                );
            }
            log::info!("publisher stopped after {published} ticks");
        })?;
    Ok(handle)
}

/// Pushes every message to all connected TCP clients. Slow or vanished
/// clients are dropped; new ones are picked up between messages.
pub struct TcpBroadcastSink {
    listener: TcpListener,
    clients: Vec<(SocketAddr, TcpStream)>,
}

impl TcpBroadcastSink {
    pub fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let sink = Self {
            listener,
            clients: Vec::new(),
        };
        log::info!("streaming to clients on {}", sink.local_addr()?);
        Ok(sink)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => match configure_client(&stream) {
                    Ok(()) => {
                        log::info!("client connected: {peer}");
                        self.clients.push((peer, stream));
                    }
                    Err(err) => log::warn!("rejecting client {peer}: {err}"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    log::warn!("accept failed: {err}");
                    break;
                }
            }
        }
    }
}

fn configure_client(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(CLIENT_WRITE_TIMEOUT))?;
    stream.set_nodelay(true)
}

impl SnapshotSink for TcpBroadcastSink {
    fn publish(&mut self, messages: &[Message]) -> Result<(), TransportError> {
        self.accept_pending();
        self.clients.retain_mut(|(peer, stream)| {
            for message in messages {
                if let Err(err) = write_message(stream, message) {
                    log::info!("client {peer} dropped: {err}");
                    return false;
                }
            }
            true
        });
        log::trace!("broadcast to {} clients", self.client_count());
        Ok(())
    }
}
