//! Async helpers for connection-settings session objects on D-Bus.
//!
//! A session object exposes the editable key/value state of one connection:
//! JSON-scalar values addressed by (section, key), the advertised
//! section/key sets, and a per-key error table.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use zbus::{Connection, Proxy};
use zvariant::Type;

use crate::error::ServiceError;
use crate::mirror::ConfigStore;

/// D-Bus service name of the network daemon owning the sessions.
pub const SERVICE: &str = "com.deepin.daemon.Network";

/// Session interface name.
pub const IFACE_SESSION: &str = "com.deepin.daemon.ConnectionSession";

/// Async client bound to one session object.
#[derive(Clone)]
pub struct Session {
    conn: Connection,
    destination: String,
    object_path: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("destination", &self.destination)
            .field("object_path", &self.object_path)
            .finish()
    }
}

impl Session {
    /// Connect to the session bus and bind one session object.
    pub async fn connect(destination: &str, object_path: &str) -> zbus::Result<Self> {
        let conn = Connection::session().await?;
        Ok(Self {
            conn,
            destination: destination.to_string(),
            object_path: object_path.to_string(),
        })
    }

    /// Get session object path.
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    async fn proxy(&self) -> zbus::Result<Proxy<'_>> {
        Proxy::new(
            &self.conn,
            self.destination.as_str(),
            self.object_path.as_str(),
            IFACE_SESSION,
        )
        .await
    }

    /// Generic method call.
    async fn call<R>(
        &self,
        method: &str,
        args: &(impl Serialize + Type + fmt::Debug),
    ) -> zbus::Result<R>
    where
        R: DeserializeOwned + Type,
    {
        let proxy = self.proxy().await?;

        proxy.call(method, args).await
    }

    /// Fetch the JSON-scalar payload of one key.
    pub async fn get_key(&self, section: &str, key: &str) -> zbus::Result<String> {
        let (raw,): (String,) = self.call("GetKey", &(section, key)).await?;
        Ok(raw)
    }

    /// Write the JSON payload of one key.
    pub async fn set_key(&self, section: &str, key: &str, json: &str) -> zbus::Result<()> {
        let _: () = self.call("SetKey", &(section, key, json)).await?;
        Ok(())
    }

    /// Fetch the JSON array of `{Value, Text}` choices for an enumerated key.
    pub async fn get_available_values(&self, section: &str, key: &str) -> zbus::Result<String> {
        let (raw,): (String,) = self.call("GetAvailableValues", &(section, key)).await?;
        Ok(raw)
    }

    /// Currently advertised sections.
    pub async fn available_sections(&self) -> zbus::Result<Vec<String>> {
        let proxy = self.proxy().await?;
        proxy
            .get_property::<Vec<String>>("AvailableSections")
            .await
    }

    /// Currently advertised keys, grouped by section.
    pub async fn available_keys(&self) -> zbus::Result<HashMap<String, Vec<String>>> {
        let proxy = self.proxy().await?;
        proxy
            .get_property::<HashMap<String, Vec<String>>>("AvailableKeys")
            .await
    }

    /// Per-(section, key) validation error table.
    pub async fn errors(&self) -> zbus::Result<HashMap<String, HashMap<String, String>>> {
        let proxy = self.proxy().await?;
        proxy
            .get_property::<HashMap<String, HashMap<String, String>>>("Errors")
            .await
    }

    /// Listen for AvailableSectionsChanged signal.
    pub async fn listen_available_sections_changed<F>(&self, mut handler: F) -> zbus::Result<()>
    where
        F: FnMut() + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("AvailableSectionsChanged").await?;

        while stream.next().await.is_some() {
            handler();
        }

        Ok(())
    }

    /// Listen for AvailableKeysChanged signal.
    pub async fn listen_available_keys_changed<F>(&self, mut handler: F) -> zbus::Result<()>
    where
        F: FnMut() + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("AvailableKeysChanged").await?;

        while stream.next().await.is_some() {
            handler();
        }

        Ok(())
    }

    /// Listen for ConnectionDataChanged signal.
    pub async fn listen_data_changed<F>(&self, mut handler: F) -> zbus::Result<()>
    where
        F: FnMut() + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("ConnectionDataChanged").await?;

        while stream.next().await.is_some() {
            handler();
        }

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for Session {
    async fn get_key(&self, section: &str, key: &str) -> Result<String, ServiceError> {
        Ok(Session::get_key(self, section, key).await?)
    }

    async fn set_key(&self, section: &str, key: &str, json: &str) -> Result<(), ServiceError> {
        Ok(Session::set_key(self, section, key, json).await?)
    }

    async fn get_available_values(
        &self,
        section: &str,
        key: &str,
    ) -> Result<String, ServiceError> {
        Ok(Session::get_available_values(self, section, key).await?)
    }

    async fn available_sections(&self) -> Result<Vec<String>, ServiceError> {
        Ok(Session::available_sections(self).await?)
    }

    async fn available_keys(&self, section: &str) -> Result<Vec<String>, ServiceError> {
        let keys = Session::available_keys(self).await?;
        Ok(keys.get(section).cloned().unwrap_or_default())
    }

    async fn has_value_error(&self, section: &str, key: &str) -> Result<bool, ServiceError> {
        let errors = Session::errors(self).await?;
        Ok(errors
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(|message| !message.is_empty())
            .unwrap_or(false))
    }
}
