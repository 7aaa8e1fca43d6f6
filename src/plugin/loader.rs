// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::channel::{Client, Pluggable, RpcChannel};
use super::errors::Error;
use super::handshake::{Announcement, HANDSHAKE, MAX_ANNOUNCEMENT_LEN};
use super::transport::{lock, Transport};
use crate::config::{HandshakeFailurePolicy, LoaderConfig};
use multimap::MultiMap;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// File extension that marks an executable as a plugin
pub const PLUGIN_EXTENSION: &str = "plugin";

struct PluginProcess {
    origin: String,
    child: Option<Child>,
    transport: Transport,
}

/// Launches plugin executables, performs the handshake and keeps track of the
/// live connections, indexed by the interface kinds each plugin announced.
pub struct Loader {
    location: PathBuf,
    handshake_timeout: Duration,
    call_timeout: Option<Duration>,
    close_timeout: Duration,
    on_handshake_failure: HandshakeFailurePolicy,

    // kind -> RpcChannel<T>, with T recovered through `kinds`
    channels: HashMap<String, Box<dyn Any + Send + Sync>>,
    kinds: HashMap<TypeId, String>,

    connections: MultiMap<String, Transport>,
    processes: Mutex<Vec<PluginProcess>>,
    scanned: bool,
}

impl Loader {
    pub fn new(cfg: &LoaderConfig) -> Result<Self, Error> {
        let location = cfg
            .dir
            .clone()
            .ok_or_else(|| Error::Config("plugin directory not set".to_string()))?;

        Ok(Self {
            location,
            handshake_timeout: cfg.handshake_timeout,
            call_timeout: (!cfg.call_timeout.is_zero()).then_some(cfg.call_timeout),
            close_timeout: cfg.close_timeout,
            on_handshake_failure: cfg.on_handshake_failure,
            channels: HashMap::new(),
            kinds: HashMap::new(),
            connections: MultiMap::new(),
            processes: Mutex::new(Vec::new()),
            scanned: false,
        })
    }

    /// Launch every plugin found in the plugin directory.  Only the first
    /// call scans; later calls are no-ops.
    pub fn load(&mut self) -> Result<(), Error> {
        if self.scanned {
            return Ok(());
        }

        for path in find_plugins(&self.location)? {
            match self.launch(&path) {
                Ok(kinds) => info!(path = %path.display(), ?kinds, "loaded plugin"),
                Err(e) => match self.on_handshake_failure {
                    HandshakeFailurePolicy::Exclude => {
                        warn!(path = %path.display(), error = %e, "excluding plugin")
                    }
                    HandshakeFailurePolicy::Abort => {
                        // what was launched stays tracked until close
                        self.scanned = true;
                        return Err(e);
                    }
                },
            }
        }

        self.scanned = true;

        Ok(())
    }

    fn launch(&mut self, path: &Path) -> Result<Vec<String>, Error> {
        let origin = path.display().to_string();

        let mut child = Command::new(path)
            .env(HANDSHAKE.magic_cookie_key, HANDSHAKE.magic_cookie_value)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Launch(format!("{origin}: {e}")))?;

        let pipes = child.stdout.take().zip(child.stdin.take());
        let Some((stdout, stdin)) = pipes else {
            let _ = reap(&mut child);
            return Err(Error::Launch(format!("{origin}: stdio not captured")));
        };

        match self.handshake(&origin, stdout, stdin) {
            Ok((kinds, transport)) => {
                self.track(origin, Some(child), &kinds, transport);
                Ok(kinds)
            }
            Err(e) => {
                let _ = reap(&mut child);
                Err(e)
            }
        }
    }

    /// Adopt a plugin that is already running on the other end of
    /// `reader`/`writer`, such as one served in-process.  The handshake is the
    /// same as for launched plugins.
    pub fn attach<R, W>(
        &mut self,
        origin: &str,
        reader: R,
        writer: W,
    ) -> Result<Vec<String>, Error>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (kinds, transport) = self.handshake(origin, reader, writer)?;
        self.track(origin.to_string(), None, &kinds, transport);
        Ok(kinds)
    }

    fn handshake<R, W>(
        &self,
        origin: &str,
        reader: R,
        writer: W,
    ) -> Result<(Vec<String>, Transport), Error>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();
            let res = (&mut reader)
                .take(MAX_ANNOUNCEMENT_LEN as u64)
                .read_until(b'\n', &mut line);
            let _ = tx.send(res.map(|_| (line, reader)));
        });

        let (line, reader) = match rx.recv_timeout(self.handshake_timeout) {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(Error::Handshake(format!("{origin}: {e}"))),
            Err(_) => {
                return Err(Error::Handshake(format!(
                    "{origin}: no announcement within {}ms",
                    self.handshake_timeout.as_millis()
                )))
            }
        };

        let line = String::from_utf8_lossy(&line);
        let announcement =
            Announcement::parse(&line).map_err(|e| Error::Handshake(format!("{origin}: {e}")))?;

        let transport = Transport::new(origin, reader, writer, self.call_timeout);

        Ok((announcement.kinds, transport))
    }

    fn track(
        &mut self,
        origin: String,
        child: Option<Child>,
        kinds: &[String],
        transport: Transport,
    ) {
        for kind in kinds {
            self.connections.insert(kind.clone(), transport.clone());
        }
        lock(&self.processes).push(PluginProcess {
            origin,
            child,
            transport,
        });
    }

    /// Shut down every tracked plugin: close its input, give it
    /// `close-timeout-ms` to exit, then kill it.  Safe to call repeatedly.
    pub fn close(&self) -> Result<(), Error> {
        let processes: Vec<PluginProcess> = lock(&self.processes).drain(..).collect();
        let mut failures = Vec::new();

        for mut p in processes {
            p.transport.shutdown();

            let Some(child) = p.child.as_mut() else {
                continue;
            };

            match child.wait_timeout(self.close_timeout) {
                Ok(Some(status)) => debug!(origin = %p.origin, %status, "plugin exited"),
                Ok(None) => {
                    warn!(origin = %p.origin, "plugin did not exit in time, killing it");
                    if let Err(e) = reap(child) {
                        failures.push(format!("{}: {e}", p.origin));
                    }
                }
                Err(e) => {
                    failures.push(format!("{}: {e}", p.origin));
                    if let Err(e) = reap(child) {
                        failures.push(format!("{}: {e}", p.origin));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(failures.join("; ")))
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "closing plugins");
        }
    }
}

/// Kill `child` and collect its exit status
fn reap(child: &mut Child) -> io::Result<()> {
    let killed = child.kill();
    let waited = child.wait();
    killed.and(waited.map(drop))
}

/// Regular files with the plugin extension, in name order
fn find_plugins(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Discovery(format!("reading {}: {e}", dir.display())))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Discovery(format!("reading {}: {e}", dir.display())))?
            .path();
        if path.is_file() && path.extension().is_some_and(|x| x == PLUGIN_EXTENSION) {
            found.push(path);
        }
    }
    found.sort();

    debug!(dir = %dir.display(), count = found.len(), "plugin discovery");

    Ok(found)
}

/// Associate interface kind `kind` with `T` on this loader, so that plugins
/// announcing `kind` can be discovered as `T`.
pub fn register_plugin_using<T>(
    loader: &mut Loader,
    kind: &str,
    channel: RpcChannel<T>,
) -> Result<(), Error>
where
    T: Pluggable + ?Sized + 'static,
{
    if loader.channels.contains_key(kind) {
        return Err(Error::Registration(format!(
            "plugin kind {kind:?} is already registered"
        )));
    }

    let id = TypeId::of::<T>();
    if let Some(other) = loader.kinds.get(&id) {
        return Err(Error::Registration(format!(
            "{} is already registered as {other:?}",
            type_name::<T>()
        )));
    }

    loader.channels.insert(kind.to_string(), Box::new(channel));
    loader.kinds.insert(id, kind.to_string());

    Ok(())
}

/// Load plugins if needed and return a handle for each one that announced the
/// kind registered for `T`, paired with the plugin's origin.
pub fn discover_plugin_using<T>(loader: &mut Loader) -> Result<Vec<(String, Arc<T>)>, Error>
where
    T: Pluggable + ?Sized + 'static,
{
    let kind = loader
        .kinds
        .get(&TypeId::of::<T>())
        .cloned()
        .ok_or_else(|| Error::Registration(format!("{} is not registered", type_name::<T>())))?;

    loader.load()?;

    let channel = loader
        .channels
        .get(&kind)
        .and_then(|c| c.downcast_ref::<RpcChannel<T>>())
        .copied()
        .ok_or_else(|| Error::Registration(format!("no channel for kind {kind:?}")))?;

    let handles = loader
        .connections
        .get_vec(&kind)
        .map(|transports| {
            transports
                .iter()
                .map(|t| {
                    let client = Client::new(t.clone(), kind.as_str());
                    (t.origin().to_string(), (channel.to_client)(client))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(handles)
}
