// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Framed request/response transport over a pair of byte streams.
//!
//! Each frame is a 4-byte big-endian length followed by a CBOR-encoded
//! [`Request`] or [`Response`].  Requests carry a caller-chosen id so that
//! replies can be matched when several calls are in flight on the same
//! connection.

use super::errors::Error;
use crate::bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest frame either side will read or write
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Request {
    pub id: u64,
    /// the interface the call is addressed to
    pub kind: String,
    pub method: String,
    pub body: Bytes,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Response {
    pub id: u64,
    pub body: Bytes,
    #[serde(default)]
    pub error: Option<String>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_frame<W: Write + ?Sized, T: Serialize>(
    w: &mut W,
    msg: &T,
) -> Result<(), Error> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(msg, &mut buf).map_err(|e| Error::Codec(e.to_string()))?;

    if buf.len() > MAX_FRAME_SIZE {
        return Err(Error::Codec(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_SIZE} bytes limit",
            buf.len()
        )));
    }

    let len = buf.len() as u32;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(&buf)?;
    w.flush()?;

    Ok(())
}

/// Read one frame.  A clean end of stream yields `Ok(None)`.
pub(crate) fn read_frame<R: Read + ?Sized, T: DeserializeOwned>(
    r: &mut R,
) -> Result<Option<T>, Error> {
    let mut hdr = [0u8; 4];
    match r.read_exact(&mut hdr) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(hdr) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::Codec(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_SIZE} bytes limit"
        )));
    }

    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;

    ciborium::de::from_reader(buf.as_slice())
        .map(Some)
        .map_err(|e| Error::Codec(e.to_string()))
}

type Reply = Result<Vec<u8>, Error>;

struct Shared {
    origin: String,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    pending: Mutex<HashMap<u64, Sender<Reply>>>,
    closed: AtomicBool,
    next_id: AtomicU64,
    timeout: Option<Duration>,
}

impl Shared {
    /// Stop accepting calls and fail every call still waiting for a reply
    fn fail_pending(&self, reason: &str) {
        let mut pending = lock(&self.pending);
        self.closed.store(true, Ordering::SeqCst);
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(Error::Transport(format!(
                "connection to {}: {reason}",
                self.origin
            ))));
        }
    }
}

/// Client side of a plugin connection.  Cloning yields another handle to the
/// same connection; calls from any number of threads are multiplexed.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

impl Transport {
    /// Wrap a connected stream pair.  A background thread reads replies from
    /// `reader` until end of stream.
    pub fn new<R, W>(
        origin: impl Into<String>,
        reader: R,
        writer: W,
        timeout: Option<Duration>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shared = Arc::new(Shared {
            origin: origin.into(),
            writer: Mutex::new(Some(Box::new(writer))),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            timeout,
        });

        let weak = Arc::downgrade(&shared);
        thread::spawn(move || read_replies(weak, reader));

        Self { shared }
    }

    pub fn origin(&self) -> &str {
        &self.shared.origin
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Send one request to `kind` and wait for its reply body
    pub fn call(&self, kind: &str, method: &str, body: Vec<u8>) -> Result<Vec<u8>, Error> {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();

        {
            let mut pending = lock(&shared.pending);
            if shared.closed.load(Ordering::SeqCst) {
                return Err(Error::Transport(format!(
                    "{method}: connection to {} is closed",
                    shared.origin
                )));
            }
            pending.insert(id, tx);
        }

        let req = Request {
            id,
            kind: kind.to_string(),
            method: method.to_string(),
            body: Bytes::from(body),
        };

        let sent = match lock(&shared.writer).as_mut() {
            Some(w) => write_frame(w, &req),
            None => Err(Error::Transport(format!(
                "{method}: connection to {} is closed",
                shared.origin
            ))),
        };

        if let Err(e) = sent {
            lock(&shared.pending).remove(&id);
            return Err(e);
        }

        let reply = match shared.timeout {
            Some(t) => rx.recv_timeout(t).map_err(|e| {
                lock(&shared.pending).remove(&id);
                match e {
                    RecvTimeoutError::Timeout => Error::Timeout {
                        method: method.to_string(),
                        millis: t.as_millis(),
                    },
                    RecvTimeoutError::Disconnected => {
                        Error::Transport(format!("{method}: reply channel dropped"))
                    }
                }
            })?,
            None => rx
                .recv()
                .map_err(|_| Error::Transport(format!("{method}: reply channel dropped")))?,
        };

        reply.map_err(|e| match e {
            Error::Transport(m) => Error::Transport(format!("{method}: {m}")),
            Error::Remote { message, .. } => Error::Remote {
                method: method.to_string(),
                message,
            },
            other => other,
        })
    }

    /// Close the sending half.  The peer sees end of stream; calls made
    /// afterwards fail immediately.
    pub fn shutdown(&self) {
        lock(&self.shared.writer).take();
        self.shared.fail_pending("shut down");
    }
}

fn read_replies<R: Read>(shared: Weak<Shared>, reader: R) {
    let mut reader = std::io::BufReader::new(reader);

    let reason = loop {
        let frame = read_frame::<_, Response>(&mut reader);

        let Some(shared) = shared.upgrade() else {
            return;
        };

        match frame {
            Ok(Some(resp)) => {
                let tx = lock(&shared.pending).remove(&resp.id);
                let Some(tx) = tx else {
                    debug!(
                        origin = %shared.origin,
                        id = resp.id,
                        "dropping reply to abandoned call"
                    );
                    continue;
                };
                let reply = match resp.error {
                    Some(msg) => Err(Error::Remote {
                        method: String::new(),
                        message: msg,
                    }),
                    None => Ok(resp.body.into_vec()),
                };
                let _ = tx.send(reply);
            }
            Ok(None) => break "end of stream".to_string(),
            Err(e) => {
                warn!(origin = %shared.origin, error = %e, "plugin connection failed");
                break e.to_string();
            }
        }
    };

    if let Some(shared) = shared.upgrade() {
        shared.fail_pending(&reason);
    }
}
