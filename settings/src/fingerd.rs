//! Async helpers for the fingerprint authentication daemon D-Bus interface.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use zbus::{Connection, Proxy};
use zvariant::Type;

use crate::error::ServiceError;

/// D-Bus service name for the fingerprint daemon.
pub const SERVICE: &str = "com.deepin.daemon.Authenticate.FingerPrint";

/// Fingerprint object path.
pub const OBJECT_PATH: &str = "/com/deepin/daemon/Authenticate/FingerPrint";

/// Fingerprint interface name.
pub const IFACE: &str = "com.deepin.daemon.Authenticate.FingerPrint";

/// Supported finger slot names.
pub const FINGERS: &[&str] = &[
    "left-thumb",
    "left-index-finger",
    "left-middle-finger",
    "left-ring-finger",
    "left-little-finger",
    "right-thumb",
    "right-index-finger",
    "right-middle-finger",
    "right-ring-finger",
    "right-little-finger",
];

/// Remote biometric operations the enrollment controller depends on.
///
/// Implemented by [`Client`] against the live daemon and by mocks in tests.
#[async_trait]
pub trait FingerService: Send + Sync {
    /// Device identifiers currently known to the daemon.
    async fn devices(&self) -> Result<Vec<String>, ServiceError>;

    /// Identifier of the default device, empty when none exists.
    async fn default_device(&self) -> Result<String, ServiceError>;

    /// Claim (`claimed == true`) or release the device for `user`.
    async fn claim(&self, user: &str, claimed: bool) -> Result<(), ServiceError>;

    /// Start capturing scans into the `thumb` slot of `user`.
    async fn enroll(&self, user: &str, thumb: &str) -> Result<(), ServiceError>;

    /// Stop the in-progress enrollment.
    async fn stop_enroll(&self) -> Result<(), ServiceError>;

    /// Enrolled thumb identifiers for `user`, in daemon order.
    async fn list_fingers(&self, user: &str) -> Result<Vec<String>, ServiceError>;

    /// Delete one enrolled thumb of `user`.
    async fn delete_finger(&self, user: &str, thumb: &str) -> Result<(), ServiceError>;

    /// Delete every enrolled thumb of `user`.
    async fn delete_all_fingers(&self, user: &str) -> Result<(), ServiceError>;
}

/// Async client with system bus connection.
#[derive(Clone)]
pub struct Client {
    conn: Connection,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Connect to system bus.
    pub async fn system() -> zbus::Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self { conn })
    }

    /// Get underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn proxy(&self) -> zbus::Result<Proxy<'_>> {
        Proxy::new(&self.conn, SERVICE, OBJECT_PATH, IFACE).await
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

    /// Get known device identifiers.
    pub async fn devices(&self) -> zbus::Result<Vec<String>> {
        let proxy = self.proxy().await?;
        proxy.get_property::<Vec<String>>("Devices").await
    }

    /// Get default device identifier ("" when none).
    pub async fn default_device(&self) -> zbus::Result<String> {
        let proxy = self.proxy().await?;
        proxy.get_property::<String>("DefaultDevice").await
    }

    /// Claim or release the device for a user identity.
    pub async fn claim(&self, user: &str, claimed: bool) -> zbus::Result<()> {
        let _: () = self.call("Claim", &(user, claimed)).await?;
        Ok(())
    }

    /// Start enrollment into a thumb slot (requires a prior claim).
    pub async fn enroll(&self, user: &str, thumb: &str) -> zbus::Result<()> {
        let _: () = self.call("Enroll", &(user, thumb)).await?;
        Ok(())
    }

    /// Stop the in-progress enrollment.
    pub async fn stop_enroll(&self) -> zbus::Result<()> {
        let _: () = self.call("StopEnroll", &()).await?;
        Ok(())
    }

    /// List enrolled thumbs for a user.
    pub async fn list_fingers(&self, user: &str) -> zbus::Result<Vec<String>> {
        let (thumbs,): (Vec<String>,) = self.call("ListFingers", &(user,)).await?;
        Ok(thumbs)
    }

    /// Delete one enrolled thumb.
    pub async fn delete_finger(&self, user: &str, thumb: &str) -> zbus::Result<()> {
        let _: () = self.call("DeleteFinger", &(user, thumb)).await?;
        Ok(())
    }

    /// Delete all enrolled thumbs for a user.
    pub async fn delete_all_fingers(&self, user: &str) -> zbus::Result<()> {
        let _: () = self.call("DeleteAllFingers", &(user,)).await?;
        Ok(())
    }

    /// Listen for EnrollStatus signal.
    pub async fn listen_enroll_status<F>(&self, mut handler: F) -> zbus::Result<()>
    where
        F: FnMut(EnrollStatusEvent) + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("EnrollStatus").await?;

        while let Some(msg) = stream.next().await {
            let (id, code, message): (String, i32, String) = msg.body().deserialize()?;
            handler(EnrollStatusEvent { id, code, message });
        }

        Ok(())
    }

    /// Listen for Touch signal.
    pub async fn listen_touch<F>(&self, mut handler: F) -> zbus::Result<()>
    where
        F: FnMut(TouchEvent) + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("Touch").await?;

        while let Some(msg) = stream.next().await {
            let (id, pressed): (String, bool) = msg.body().deserialize()?;
            handler(TouchEvent { id, pressed });
        }

        Ok(())
    }
}

/// One EnrollStatus push from the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollStatusEvent {
    pub id: String,
    pub code: i32,
    pub message: String,
}

/// One Touch (finger pressure) push from the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchEvent {
    pub id: String,
    pub pressed: bool,
}

#[async_trait]
impl FingerService for Client {
    async fn devices(&self) -> Result<Vec<String>, ServiceError> {
        Ok(Client::devices(self).await?)
    }

    async fn default_device(&self) -> Result<String, ServiceError> {
        Ok(Client::default_device(self).await?)
    }

    async fn claim(&self, user: &str, claimed: bool) -> Result<(), ServiceError> {
        Ok(Client::claim(self, user, claimed).await?)
    }

    async fn enroll(&self, user: &str, thumb: &str) -> Result<(), ServiceError> {
        Ok(Client::enroll(self, user, thumb).await?)
    }

    async fn stop_enroll(&self) -> Result<(), ServiceError> {
        Ok(Client::stop_enroll(self).await?)
    }

    async fn list_fingers(&self, user: &str) -> Result<Vec<String>, ServiceError> {
        Ok(Client::list_fingers(self, user).await?)
    }

    async fn delete_finger(&self, user: &str, thumb: &str) -> Result<(), ServiceError> {
        Ok(Client::delete_finger(self, user, thumb).await?)
    }

    async fn delete_all_fingers(&self, user: &str) -> Result<(), ServiceError> {
        Ok(Client::delete_all_fingers(self, user).await?)
    }
}
