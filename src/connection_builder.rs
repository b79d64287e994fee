use std::time::Duration;

use crate::transport::{HttpTransport, Transport};
use crate::{Codec, Connection, Result};

/// Device id sent when none is configured.
pub const DEFAULT_DEVICE_ID: &str = "v140Device";
/// Device type sent when none is configured.
pub const DEFAULT_DEVICE_TYPE: &str = "SmartPhone";
/// How many `451` relocations a single command follows before giving up.
pub const DEFAULT_MAX_RELOCATIONS: usize = 5;

/// A convenience builder for [`Connection`]s.
///
/// Creating a [`Connection`] that finds its server through autodiscovery is straightforward:
/// ```no_run
/// # use activesync::{Codec, CodepageRegistry, ConnectionBuilder};
/// # struct MyCodec;
/// # impl Codec for MyCodec {
/// #     type Document = Vec<u8>;
/// #     fn root_tag(&self, doc: &[u8]) -> activesync::Result<u16> { Ok(0) }
/// #     fn decode(&self, data: &[u8], _: &CodepageRegistry) -> activesync::Result<Vec<u8>> {
/// #         Ok(data.to_vec())
/// #     }
/// # }
/// # fn main() -> Result<(), activesync::Error> {
/// let conn = ConnectionBuilder::new("jane@example.com", "hunter2").build(MyCodec)?;
/// # Ok(())
/// # }
/// ```
///
/// To skip autodiscovery, name the server up front:
/// ```no_run
/// # use activesync::{Codec, CodepageRegistry, ConnectionBuilder};
/// # use std::time::Duration;
/// # struct MyCodec;
/// # impl Codec for MyCodec {
/// #     type Document = Vec<u8>;
/// #     fn root_tag(&self, doc: &[u8]) -> activesync::Result<u16> { Ok(0) }
/// #     fn decode(&self, data: &[u8], _: &CodepageRegistry) -> activesync::Result<Vec<u8>> {
/// #         Ok(data.to_vec())
/// #     }
/// # }
/// # fn main() -> Result<(), activesync::Error> {
/// let conn = ConnectionBuilder::new("jane@example.com", "hunter2")
///     .server("https://mail.example.com")
///     .device_id("3B9C8A1E")
///     .timeout(Duration::from_secs(30))
///     .build(MyCodec)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ConnectionBuilder {
    email: String,
    password: String,
    device_id: String,
    device_type: String,
    server: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    max_relocations: usize,
}

impl ConnectionBuilder {
    /// Make a new `ConnectionBuilder` that authenticates as `email:password`.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        ConnectionBuilder {
            email: email.into(),
            password: password.into(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
            server: None,
            timeout: None,
            user_agent: None,
            max_relocations: DEFAULT_MAX_RELOCATIONS,
        }
    }

    /// The `DeviceId` sent with every command.
    pub fn device_id(&mut self, device_id: impl Into<String>) -> &mut Self {
        self.device_id = device_id.into();
        self
    }

    /// The `DeviceType` sent with every command.
    pub fn device_type(&mut self, device_type: impl Into<String>) -> &mut Self {
        self.device_type = device_type.into();
        self
    }

    /// Use this server instead of autodiscovering one.
    pub fn server(&mut self, server: impl Into<String>) -> &mut Self {
        self.server = Some(server.into());
        self
    }

    /// Per-request timeout for the built-in HTTP transport.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// `User-Agent` for the built-in HTTP transport.
    pub fn user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// How many consecutive `451` relocations a command may follow.
    pub fn max_relocations(&mut self, max: usize) -> &mut Self {
        self.max_relocations = max;
        self
    }

    /// Return a new [`Connection`] over HTTPS.
    pub fn build<C: Codec>(&self, codec: C) -> Result<Connection<HttpTransport, C>> {
        let transport = HttpTransport::with_options(self.timeout, self.user_agent.as_deref())?;
        Ok(self.build_with_transport(transport, codec))
    }

    /// Return a new [`Connection`] that sends its requests through `transport`.
    ///
    /// `timeout` and `user_agent` only apply to the built-in transport and are ignored here.
    pub fn build_with_transport<T: Transport, C: Codec>(
        &self,
        transport: T,
        codec: C,
    ) -> Connection<T, C> {
        let conn = Connection::new(
            transport,
            codec,
            self.email.clone(),
            self.password.clone(),
            self.device_id.clone(),
            self.device_type.clone(),
            self.max_relocations,
        );
        if let Some(ref server) = self.server {
            conn.set_server(server);
        }
        conn
    }
}
