// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::channel::{Dispatch, Pluggable, RpcChannel};
use super::errors::Error;
use super::handshake::{Announcement, HANDSHAKE};
use super::transport::{lock, read_frame, write_frame, Request, Response};
use crate::bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Plugin-process side of the runtime: collects the implementations the
/// process provides, then serves them to the loader.
///
/// ```no_run
/// use std::sync::Arc;
/// use veraison_plugin::plugin::PluginHost;
/// use veraison_plugin::scheme::{self, DigestScheme};
///
/// let mut host = PluginHost::new();
/// scheme::register_scheme_implementation(&mut host, Arc::new(DigestScheme::new())).unwrap();
/// host.serve().unwrap();
/// ```
#[derive(Default)]
pub struct PluginHost {
    servers: BTreeMap<String, Box<dyn Dispatch>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `imp` as the implementation of interface `kind`.  A process
    /// provides at most one implementation per kind.
    pub fn register_implementation<T>(
        &mut self,
        kind: &str,
        imp: Arc<T>,
        channel: &RpcChannel<T>,
    ) -> Result<(), Error>
    where
        T: Pluggable + ?Sized,
    {
        if kind.is_empty() {
            return Err(Error::Registration("empty plugin kind".to_string()));
        }

        // separators of the announcement line
        if kind.contains([',', '|', '\r', '\n']) {
            return Err(Error::Registration(format!(
                "plugin kind {kind:?} contains a reserved character"
            )));
        }

        if self.servers.contains_key(kind) {
            return Err(Error::Registration(format!(
                "an implementation of {kind:?} is already registered"
            )));
        }

        debug!(kind, name = %imp.get_name(), "registered implementation");
        self.servers.insert(kind.to_string(), (channel.to_server)(imp));

        Ok(())
    }

    pub fn kinds(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    /// Serve over stdin/stdout.  Refuses to run unless launched by a loader,
    /// which is detected through the handshake cookie.
    pub fn serve(self) -> Result<(), Error> {
        match std::env::var(HANDSHAKE.magic_cookie_key) {
            Ok(v) if v == HANDSHAKE.magic_cookie_value => {}
            _ => {
                return Err(Error::Handshake(
                    "this binary is a plugin and is not meant to be executed directly; \
                     it is loaded by the attestation verifier"
                        .to_string(),
                ))
            }
        }

        self.serve_on(std::io::stdin(), std::io::stdout())
    }

    /// Announce the registered kinds on `writer`, then answer framed requests
    /// read from `reader` until it reaches end of stream.  Each request is
    /// handled on its own thread.
    pub fn serve_on<R, W>(self, reader: R, mut writer: W) -> Result<(), Error>
    where
        R: Read,
        W: Write + Send + 'static,
    {
        if self.servers.is_empty() {
            return Err(Error::Registration(
                "no implementations registered".to_string(),
            ));
        }

        let announcement = Announcement::new(self.kinds());
        writer.write_all(announcement.to_line().as_bytes())?;
        writer.flush()?;

        info!(kinds = ?announcement.kinds, "serving plugin");

        let servers = Arc::new(self.servers);
        let writer = Arc::new(Mutex::new(writer));
        let mut reader = BufReader::new(reader);

        while let Some(req) = read_frame::<_, Request>(&mut reader)? {
            let servers = Arc::clone(&servers);
            let writer = Arc::clone(&writer);

            thread::spawn(move || {
                let resp = handle(&servers, req);
                send_reply(&mut *lock(&writer), resp);
            });
        }

        debug!("loader closed the connection");

        Ok(())
    }
}

/// Write `resp`.  A reply that cannot be framed is replaced by an error
/// reply so that the caller is not left waiting.
fn send_reply<W: Write + ?Sized>(w: &mut W, resp: Response) {
    let reason = match write_frame(w, &resp) {
        Ok(()) => return,
        Err(Error::Codec(reason)) => reason,
        Err(e) => {
            warn!(error = %e, id = resp.id, "failed to send reply");
            return;
        }
    };

    warn!(error = %reason, id = resp.id, "reply not sendable, reporting failure");

    let fallback = Response {
        id: resp.id,
        body: Bytes::new(),
        error: Some(format!("reply not sent: {reason}")),
    };
    if let Err(e) = write_frame(w, &fallback) {
        warn!(error = %e, id = resp.id, "failed to send reply");
    }
}

fn handle(servers: &BTreeMap<String, Box<dyn Dispatch>>, req: Request) -> Response {
    let outcome = match servers.get(&req.kind) {
        Some(server) => server
            .dispatch(&req.method, req.body.as_slice())
            .map_err(|e| e.to_string()),
        None => Err(format!("no implementation of {:?} in this plugin", req.kind)),
    };

    match outcome {
        Ok(body) => Response {
            id: req.id,
            body: Bytes::from(body),
            error: None,
        },
        Err(message) => {
            debug!(method = %req.method, error = %message, "call failed");
            Response {
                id: req.id,
                body: Bytes::new(),
                error: Some(message),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::plugin::channel::{dispatch_pluggable, encode_reply, unknown_method};
    use crate::plugin::transport::{Transport, MAX_FRAME_SIZE};
    use crate::plugin::DispatchError;
    use std::io::BufRead;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    struct Blob;

    impl Pluggable for Blob {
        fn get_name(&self) -> String {
            "blob".into()
        }
        fn get_attestation_scheme(&self) -> String {
            String::new()
        }
        fn get_supported_media_types(&self) -> Vec<String> {
            Vec::new()
        }
        fn get_version(&self) -> String {
            "0.1".into()
        }
    }

    struct BlobServer(Arc<Blob>);

    impl Dispatch for BlobServer {
        fn dispatch(&self, method: &str, _args: &[u8]) -> Result<Vec<u8>, DispatchError> {
            if let Some(reply) = dispatch_pluggable(&*self.0, method) {
                return reply;
            }
            match method {
                "Plugin.Blob" => encode_reply(&"x".repeat(MAX_FRAME_SIZE + 1)),
                _ => Err(unknown_method(method)),
            }
        }
    }

    fn blob_client(_: crate::plugin::Client) -> Arc<Blob> {
        Arc::new(Blob)
    }

    fn blob_server(imp: Arc<Blob>) -> Box<dyn Dispatch> {
        Box::new(BlobServer(imp))
    }

    const BLOB_RPC: RpcChannel<Blob> = RpcChannel {
        to_client: blob_client,
        to_server: blob_server,
    };

    #[test]
    fn oversized_reply_becomes_error() {
        let (to_plugin, plugin_in) = UnixStream::pair().unwrap();
        let (plugin_out, from_plugin) = UnixStream::pair().unwrap();

        let mut host = PluginHost::new();
        host.register_implementation("blob", Arc::new(Blob), &BLOB_RPC).unwrap();
        let served = thread::spawn(move || host.serve_on(plugin_in, plugin_out));

        let mut reader = BufReader::new(from_plugin);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(Announcement::parse(&line).unwrap().kinds, vec!["blob"]);

        let t = Transport::new("blob", reader, to_plugin, Some(Duration::from_secs(30)));

        let err = t.call("blob", "Plugin.Blob", b"null".to_vec()).unwrap_err();
        let Error::Remote { method, message } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(method, "Plugin.Blob");
        assert!(message.starts_with("reply not sent: frame of"), "{message}");

        // the connection survives
        let name = t.call("blob", "Plugin.GetName", b"null".to_vec()).unwrap();
        assert_eq!(name, b"\"blob\"".to_vec());

        t.shutdown();
        served.join().unwrap().unwrap();
    }
}
