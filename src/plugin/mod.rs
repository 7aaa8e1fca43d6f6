// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Plugin runtime.
//!
//! An interface becomes pluggable by extending [`Pluggable`] and providing an
//! [`RpcChannel`]: a constructor for a host-side proxy that forwards calls
//! through a [`Client`], and a constructor for a plugin-side [`Dispatch`] that
//! decodes them.  Plugin executables register their implementations on a
//! [`PluginHost`] and serve; the verifier side registers the channel on a
//! [`Loader`] and obtains a [`Manager`] routing by name, media type and
//! attestation scheme.
//!
//! Self-description methods ([`Pluggable`]) never fail across the process
//! boundary: a broken connection degrades them to empty values.  Operational
//! methods report every failure to the caller.

pub use self::channel::{
    decode_args, dispatch_pluggable, encode_reply, unknown_method, Client, Dispatch,
    DispatchError, Pluggable, RpcChannel,
};
pub use self::errors::Error;
pub use self::handshake::{Announcement, HandshakeConfig, HANDSHAKE};
pub use self::host::PluginHost;
pub use self::loader::{discover_plugin_using, register_plugin_using, Loader, PLUGIN_EXTENSION};
pub use self::manager::{create_manager, BuiltinManager, Manager, PluginManager, RoutingTable};
pub use self::transport::{Transport, MAX_FRAME_SIZE};

mod channel;
mod errors;
mod handshake;
mod host;
mod loader;
mod manager;
mod transport;
