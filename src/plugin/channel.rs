// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::transport::Transport;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Self-description every plugin interface must provide
pub trait Pluggable: Send + Sync {
    /// Unique name of the implementation
    fn get_name(&self) -> String;
    /// Name of the attestation scheme the implementation belongs to
    fn get_attestation_scheme(&self) -> String;
    /// Media types the implementation handles
    fn get_supported_media_types(&self) -> Vec<String>;
    fn get_version(&self) -> String;
}

/// Error type produced by server-side dispatch.  Its `Display` text is what
/// the caller receives.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Server side of an interface: decodes a named method call, runs it against
/// the real implementation and encodes the reply.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, DispatchError>;
}

/// Pair of constructors turning a connection into a proxy for `T` on the
/// host side, and an implementation of `T` into a dispatcher on the plugin
/// side.
pub struct RpcChannel<T: ?Sized> {
    pub to_client: fn(Client) -> Arc<T>,
    pub to_server: fn(Arc<T>) -> Box<dyn Dispatch>,
}

impl<T: ?Sized> Clone for RpcChannel<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for RpcChannel<T> {}

/// Caller half of a channel, bound to one interface kind on one connection
#[derive(Clone)]
pub struct Client {
    transport: Transport,
    kind: String,
}

impl Client {
    pub fn new(transport: Transport, kind: impl Into<String>) -> Self {
        Self {
            transport,
            kind: kind.into(),
        }
    }

    pub fn origin(&self) -> &str {
        self.transport.origin()
    }

    /// Invoke `Plugin.<method>` with JSON-encoded arguments and decode the
    /// JSON reply
    pub fn call<A, R>(&self, method: &str, args: &A) -> Result<R, Error>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let method = format!("Plugin.{method}");

        let body = serde_json::to_vec(args)
            .map_err(|e| Error::Codec(format!("{method}: encoding arguments: {e}")))?;

        let reply = self.transport.call(&self.kind, &method, body)?;

        serde_json::from_slice(&reply)
            .map_err(|e| Error::Codec(format!("{method}: decoding reply: {e}")))
    }

    /// Like [`Client::call`] with no arguments, but any failure is logged and
    /// turned into the zero value of `R`
    pub fn call_or_default<R>(&self, method: &str) -> R
    where
        R: DeserializeOwned + Default,
    {
        self.call(method, &()).unwrap_or_else(|e| {
            warn!(
                origin = %self.origin(),
                kind = %self.kind,
                error = %e,
                "Plugin.{method} RPC call failed"
            );
            R::default()
        })
    }
}

impl Pluggable for Client {
    fn get_name(&self) -> String {
        self.call_or_default("GetName")
    }

    fn get_attestation_scheme(&self) -> String {
        self.call_or_default("GetAttestationScheme")
    }

    fn get_supported_media_types(&self) -> Vec<String> {
        self.call_or_default("GetSupportedMediaTypes")
    }

    fn get_version(&self) -> String {
        self.call_or_default("GetVersion")
    }
}

/// Decode the JSON arguments of a call
pub fn decode_args<A: DeserializeOwned>(method: &str, args: &[u8]) -> Result<A, Error> {
    serde_json::from_slice(args)
        .map_err(|e| Error::Codec(format!("{method}: decoding arguments: {e}")))
}

pub fn encode_reply<R: Serialize + ?Sized>(reply: &R) -> Result<Vec<u8>, DispatchError> {
    serde_json::to_vec(reply).map_err(|e| Error::Codec(format!("encoding reply: {e}")).into())
}

/// Serve the [`Pluggable`] methods.  Returns `None` for any other method so
/// that interface dispatchers can fall through to their own methods.
pub fn dispatch_pluggable<T: Pluggable + ?Sized>(
    imp: &T,
    method: &str,
) -> Option<Result<Vec<u8>, DispatchError>> {
    let reply = match method {
        "Plugin.GetName" => encode_reply(&imp.get_name()),
        "Plugin.GetAttestationScheme" => encode_reply(&imp.get_attestation_scheme()),
        "Plugin.GetSupportedMediaTypes" => encode_reply(&imp.get_supported_media_types()),
        "Plugin.GetVersion" => encode_reply(&imp.get_version()),
        _ => return None,
    };
    Some(reply)
}

pub fn unknown_method(method: &str) -> DispatchError {
    Error::UnknownMethod(method.to_string()).into()
}
