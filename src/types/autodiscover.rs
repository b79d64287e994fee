/// The server `Type` that speaks ActiveSync.
pub const MOBILE_SYNC: &str = "MobileSync";

/// A server listed under `Action/Settings` in an autodiscover response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Server {
    /// The service this server offers, e.g. `MobileSync` or `CertEnroll`.
    pub kind: String,
    /// Base URL of the server.
    pub url: String,
    /// Display name of the server, often the same as `url`.
    pub name: String,
    /// Opaque extra data; only meaningful for `CertEnroll` servers.
    pub server_data: String,
}

impl Server {
    /// True if this server speaks ActiveSync.
    pub fn is_mobile_sync(&self) -> bool {
        self.kind == MOBILE_SYNC
    }
}

/// The user as the autodiscover service knows them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    /// The user's display name.
    pub name: String,
    /// The user's primary SMTP address.
    pub email: String,
}

/// The answer to an autodiscover request.
///
/// Fields the server left out are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutodiscoverConfig {
    /// The email address that was finally resolved. This differs from the address passed in
    /// when the service redirected us to another account.
    pub email_address: String,
    /// The user's culture, e.g. `en:us`.
    pub culture: String,
    /// The user as the service knows them.
    pub user: User,
    /// Every server in the response, in document order.
    pub servers: Vec<Server>,
}

impl AutodiscoverConfig {
    /// The first `MobileSync` server in the response, if any.
    pub fn mobile_sync_server(&self) -> Option<&Server> {
        self.servers.iter().find(|s| s.is_mobile_sync())
    }
}
