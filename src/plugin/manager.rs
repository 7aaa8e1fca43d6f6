// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::channel::{Pluggable, RpcChannel};
use super::errors::Error;
use super::loader::{discover_plugin_using, register_plugin_using, Loader};
use crate::config::{Backend, Config};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

struct Route<T: ?Sized> {
    origin: String,
    handle: Arc<T>,
}

impl<T: ?Sized> Clone for Route<T> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            handle: Arc::clone(&self.handle),
        }
    }
}

/// Indexes of implementations by name, media type and attestation scheme.
/// Every key maps to exactly one implementation.
pub struct RoutingTable<T: ?Sized> {
    by_name: BTreeMap<String, Route<T>>,
    by_media_type: BTreeMap<String, Route<T>>,
    by_scheme: BTreeMap<String, Route<T>>,
}

impl<T: ?Sized> Default for RoutingTable<T> {
    fn default() -> Self {
        Self {
            by_name: BTreeMap::new(),
            by_media_type: BTreeMap::new(),
            by_scheme: BTreeMap::new(),
        }
    }
}

fn insert_unique<T: ?Sized>(
    index: &mut BTreeMap<String, Route<T>>,
    what: &str,
    key: &str,
    route: &Route<T>,
) -> Result<(), Error> {
    if let Some(existing) = index.get(key) {
        if existing.origin == route.origin {
            return Ok(());
        }
        return Err(Error::Discovery(format!(
            "{what} {key:?} provided by both {} and {}",
            existing.origin, route.origin
        )));
    }
    index.insert(key.to_string(), route.clone());
    Ok(())
}

impl<T: Pluggable + ?Sized> RoutingTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `handle` under its self-reported name, media types and scheme.
    /// Any key already held by a different origin is rejected and leaves the
    /// table unchanged.
    pub fn add(&mut self, origin: &str, handle: Arc<T>) -> Result<(), Error> {
        let name = handle.get_name();
        if name.is_empty() {
            warn!(origin, "plugin reported no name, skipping it");
            return Ok(());
        }

        let scheme = handle.get_attestation_scheme();
        let media_types = handle.get_supported_media_types();

        let route = Route {
            origin: origin.to_string(),
            handle,
        };

        let mut staged = Self {
            by_name: self.by_name.clone(),
            by_media_type: self.by_media_type.clone(),
            by_scheme: self.by_scheme.clone(),
        };

        insert_unique(&mut staged.by_name, "plugin name", &name, &route)?;
        for mt in &media_types {
            insert_unique(&mut staged.by_media_type, "media type", mt, &route)?;
        }
        if !scheme.is_empty() {
            insert_unique(&mut staged.by_scheme, "attestation scheme", &scheme, &route)?;
        }

        debug!(origin, name, scheme, ?media_types, "registered plugin");
        *self = staged;

        Ok(())
    }

    pub fn from_handles(handles: Vec<(String, Arc<T>)>) -> Result<Self, Error> {
        let mut table = Self::new();
        for (origin, handle) in handles {
            table.add(&origin, handle)?;
        }
        Ok(table)
    }

    pub fn media_types(&self) -> Vec<String> {
        self.by_media_type.keys().cloned().collect()
    }

    pub fn schemes(&self) -> Vec<String> {
        self.by_scheme.keys().cloned().collect()
    }

    pub fn by_media_type(&self, media_type: &str) -> Result<Arc<T>, Error> {
        lookup(&self.by_media_type, "media type", media_type)
    }

    pub fn by_name(&self, name: &str) -> Result<Arc<T>, Error> {
        lookup(&self.by_name, "plugin name", name)
    }

    pub fn by_scheme(&self, scheme: &str) -> Result<Arc<T>, Error> {
        lookup(&self.by_scheme, "attestation scheme", scheme)
    }
}

fn lookup<T: ?Sized>(
    index: &BTreeMap<String, Route<T>>,
    what: &str,
    key: &str,
) -> Result<Arc<T>, Error> {
    index
        .get(key)
        .map(|r| Arc::clone(&r.handle))
        .ok_or_else(|| Error::NotFound(format!("no plugin found for {what} {key:?}")))
}

/// Uniform view over plugin implementations of interface `T`, regardless of
/// whether they run out of process or are compiled in.
pub trait Manager<T: Pluggable + ?Sized>: Send + Sync {
    fn routing_table(&self) -> &RoutingTable<T>;

    /// Release every resource held for the implementations
    fn close(&self) -> Result<(), Error>;

    fn is_registered_media_type(&self, media_type: &str) -> bool {
        self.routing_table().by_media_type(media_type).is_ok()
    }

    fn get_registered_media_types(&self) -> Vec<String> {
        self.routing_table().media_types()
    }

    fn get_registered_attestation_schemes(&self) -> Vec<String> {
        self.routing_table().schemes()
    }

    fn lookup_by_media_type(&self, media_type: &str) -> Result<Arc<T>, Error> {
        self.routing_table().by_media_type(media_type)
    }

    fn lookup_by_name(&self, name: &str) -> Result<Arc<T>, Error> {
        self.routing_table().by_name(name)
    }

    fn lookup_by_attestation_scheme(&self, scheme: &str) -> Result<Arc<T>, Error> {
        self.routing_table().by_scheme(scheme)
    }
}

/// Manager for implementations running in plugin processes
pub struct PluginManager<T: ?Sized> {
    loader: Loader,
    table: RoutingTable<T>,
}

impl<T: Pluggable + ?Sized + 'static> PluginManager<T> {
    /// Register `T` under `kind` on `loader`, discover the plugins that
    /// provide it and index them
    pub fn with_loader(
        mut loader: Loader,
        kind: &str,
        channel: RpcChannel<T>,
    ) -> Result<Self, Error> {
        register_plugin_using(&mut loader, kind, channel)?;
        let handles = discover_plugin_using::<T>(&mut loader)?;
        let table = RoutingTable::from_handles(handles)?;
        Ok(Self { loader, table })
    }
}

impl<T: Pluggable + ?Sized> Manager<T> for PluginManager<T> {
    fn routing_table(&self) -> &RoutingTable<T> {
        &self.table
    }

    fn close(&self) -> Result<(), Error> {
        self.loader.close()
    }
}

/// Manager for implementations compiled into the host
pub struct BuiltinManager<T: ?Sized> {
    table: RoutingTable<T>,
}

impl<T: Pluggable + ?Sized> BuiltinManager<T> {
    pub fn new(impls: Vec<Arc<T>>) -> Result<Self, Error> {
        let handles = impls
            .into_iter()
            .enumerate()
            .map(|(i, h)| (format!("builtin[{i}]"), h))
            .collect();
        Ok(Self {
            table: RoutingTable::from_handles(handles)?,
        })
    }
}

impl<T: Pluggable + ?Sized> Manager<T> for BuiltinManager<T> {
    fn routing_table(&self) -> &RoutingTable<T> {
        &self.table
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Build the manager selected by `cfg`.  `builtins` is only consulted by the
/// builtin backend.
pub fn create_manager<T>(
    cfg: &Config,
    kind: &str,
    channel: RpcChannel<T>,
    builtins: Vec<Arc<T>>,
) -> Result<Box<dyn Manager<T>>, Error>
where
    T: Pluggable + ?Sized + 'static,
{
    match cfg.plugin.backend {
        Backend::GoPlugin => {
            let loader = Loader::new(&cfg.go_plugin)?;
            Ok(Box::new(PluginManager::with_loader(loader, kind, channel)?))
        }
        Backend::Builtin => Ok(Box::new(BuiltinManager::new(builtins)?)),
    }
}
