use std::collections::hash_set::Iter;
use std::collections::HashSet;
use std::fmt;

use crate::version::Version;

/// What a server advertised in response to `OPTIONS`.
///
/// `MS-ASProtocolVersions` lists the protocol versions the server speaks, lowest first; the
/// client always speaks the last one. `MS-ASProtocolCommands` lists the commands it accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerOptions {
    pub(crate) versions: Vec<String>,
    pub(crate) commands: HashSet<String>,
}

impl ServerOptions {
    pub(crate) fn new<V, C>(versions: V, commands: C) -> ServerOptions
    where
        V: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        ServerOptions {
            versions: versions.into_iter().collect(),
            commands: commands.into_iter().collect(),
        }
    }

    /// Check if the server accepts the given command.
    pub fn has(&self, command: &str) -> bool {
        self.commands.contains(command)
    }

    /// Iterate over all the commands the server accepts.
    pub fn commands(&self) -> Iter<'_, String> {
        self.commands.iter()
    }

    /// The advertised protocol versions, in the order the server listed them.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// The version string sent in `MS-ASProtocolVersion`.
    pub fn protocol_version(&self) -> Option<&str> {
        self.versions.last().map(String::as_str)
    }

    /// [`protocol_version`](Self::protocol_version), parsed.
    pub fn current_version(&self) -> Option<Version> {
        self.protocol_version().map(Version::parse)
    }
}

impl fmt::Display for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<&str> = self.commands.iter().map(String::as_str).collect();
        commands.sort_unstable();
        write!(
            f,
            "versions [{}], commands [{}]",
            self.versions.join(","),
            commands.join(",")
        )
    }
}
