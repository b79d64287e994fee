//! This module contains the values produced while bringing up an ActiveSync connection.

mod autodiscover;
pub use self::autodiscover::{AutodiscoverConfig, Server, User, MOBILE_SYNC};

mod server_options;
pub use self::server_options::ServerOptions;

/// The lifecycle state of a [`Connection`](crate::Connection).
///
/// The states are ordered: a connection only ever moves up one step at a time during `connect`,
/// and `disconnect` drops it straight back to `Disconnected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// No server has been chosen yet.
    Disconnected,
    /// A server URL is pinned (forced by the caller or found through autodiscovery), but the
    /// protocol options have not been fetched.
    ServerSet,
    /// Protocol versions and commands are known; commands may be posted.
    Connected,
}

/// Where the connection's server came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectConfig {
    /// The server was set explicitly, or pinned by an earlier attempt; autodiscovery was skipped.
    Forced {
        /// The server URL, without the `/Microsoft-Server-ActiveSync` suffix.
        url: String,
    },
    /// The server was found through autodiscovery.
    ///
    /// This includes addresses at the built-in domains (`gmail.com`, `outlook.com` and the
    /// like), which are answered without any request. Their `config` holds a single
    /// `MobileSync` server and [`is_forced`](ConnectConfig::is_forced) is false.
    Autodiscovered {
        /// The full autodiscovery answer.
        config: AutodiscoverConfig,
        /// The `MobileSync` entry that was chosen from `config`.
        server: Server,
    },
}

impl ConnectConfig {
    /// True if autodiscovery was skipped because a server was pinned.
    ///
    /// The built-in domain table does not count: it yields
    /// [`Autodiscovered`](ConnectConfig::Autodiscovered).
    pub fn is_forced(&self) -> bool {
        matches!(self, ConnectConfig::Forced { .. })
    }

    /// The URL of the server the connection was pinned to.
    pub fn server_url(&self) -> &str {
        match *self {
            ConnectConfig::Forced { ref url } => url,
            ConnectConfig::Autodiscovered { ref server, .. } => &server.url,
        }
    }
}

/// The result of a successful [`Connection::connect`](crate::Connection::connect).
///
/// Every caller that was waiting on the same attempt receives the same `Connected`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connected {
    /// How the server was chosen.
    pub config: ConnectConfig,
    /// What the server advertised in response to `OPTIONS`.
    pub options: ServerOptions,
}
