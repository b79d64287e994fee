//! Posting ActiveSync commands over an established [`Connection`].

use reqwest::Method;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::codepages::{CodepageRegistry, CODEPAGES};
use crate::connection::Connection;
use crate::error::{Error, HttpError, ParseError, Result, ValidateError};
use crate::transport::{basic_auth, Request, Transport};
use crate::types::Connected;

/// Content type of a WBXML command body.
pub const WBXML_CONTENT_TYPE: &str = "application/vnd.ms-sync.wbxml";

/// Query parameters the connection always sets itself.
const RESERVED_PARAMS: [&str; 4] = ["Cmd", "User", "DeviceId", "DeviceType"];

const RELOCATION_HEADER: &str = "X-MS-Location";

/// Encodes and decodes the WBXML documents carried by commands.
///
/// The connection layer never looks inside a document except to learn which command it
/// holds, so any WBXML implementation can be plugged in here.
pub trait Codec: Send + Sync {
    /// A decoded response document.
    type Document: Send;

    /// The tag of the root element of an encoded document.
    fn root_tag(&self, document: &[u8]) -> Result<u16>;

    /// Decode a response body.
    fn decode(&self, data: &[u8], codepages: &CodepageRegistry) -> Result<Self::Document>;
}

/// An ActiveSync command to post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// An encoded request document. The command is named after its root element.
    Wbxml(&'a [u8]),
    /// A bare command name such as `"FolderSync"`. The request has no body.
    Name(&'a str),
    /// A bare command given as a codepage tag. The request has no body.
    Tag(u16),
}

impl<'a> Command<'a> {
    /// The request body this command sends.
    pub fn body(&self) -> &'a [u8] {
        match *self {
            Command::Wbxml(document) => document,
            Command::Name(_) | Command::Tag(_) => &[],
        }
    }
}

impl<'a> From<&'a str> for Command<'a> {
    fn from(name: &'a str) -> Command<'a> {
        Command::Name(name)
    }
}

impl From<u16> for Command<'_> {
    fn from(tag: u16) -> Self {
        Command::Tag(tag)
    }
}

impl<T: Transport, C: Codec> Connection<T, C> {
    /// Check whether the server accepts `command`.
    ///
    /// Fails with [`Error::NotConnected`] until [`connect`](Self::connect) has succeeded.
    pub fn supports_command<'a>(&self, command: impl Into<Command<'a>>) -> Result<bool> {
        let connected = self.connected().ok_or(Error::NotConnected)?;
        let name = self.command_name(command.into())?;
        Ok(connected.options.has(&name))
    }

    /// Post a command and decode the server's answer.
    ///
    /// Connects first if needed. Commands the server did not advertise fail with
    /// [`Error::UnsupportedCommand`] before anything is sent. `Ok(None)` means the server
    /// answered with an empty body.
    pub async fn post_command<'a>(
        &self,
        command: impl Into<Command<'a>>,
        extra_params: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
    ) -> Result<Option<C::Document>> {
        let command = command.into();
        let name = self.command_name(command)?;
        let body = self
            .post_data(&name, WBXML_CONTENT_TYPE, command.body(), extra_params, extra_headers)
            .await?;
        if body.is_empty() {
            return Ok(None);
        }
        self.codec.decode(&body, &CODEPAGES).map(Some)
    }

    /// Post a raw body for the command `command` and return the raw response body.
    ///
    /// This is the escape hatch for commands that don't carry WBXML, e.g. `SendMail` with a
    /// `message/rfc822` body on older protocol versions.
    pub async fn post_data(
        &self,
        command: &str,
        content_type: &str,
        body: &[u8],
        extra_params: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        let connected = self.connect().await?;
        self.send_command(&connected, command, content_type, body, extra_params, extra_headers)
            .await
    }

    /// Send `command` on an already connected session, following `451` relocations.
    pub(crate) async fn send_command(
        &self,
        connected: &Connected,
        command: &str,
        content_type: &str,
        body: &[u8],
        extra_params: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        if !connected.options.has(command) {
            return Err(Error::UnsupportedCommand(command.to_string()));
        }
        if let Some(&(key, _)) = extra_params
            .iter()
            .find(|(key, _)| RESERVED_PARAMS.iter().any(|r| r.eq_ignore_ascii_case(key)))
        {
            return Err(ValidateError::ReservedParameter(key.to_string()).into());
        }

        let mut relocations = 0;
        loop {
            let request = self.command_request(
                connected,
                command,
                content_type,
                body,
                extra_params,
                extra_headers,
            )?;
            debug!(command, url = %request.url, "posting command");
            let response = self.transport.send(request).await?;
            debug!(command, status = %response.status, "command answered");

            if response.status.as_u16() == 451 {
                let location = response
                    .header(RELOCATION_HEADER)
                    .ok_or(ParseError::MissingHeader(RELOCATION_HEADER))?;
                if relocations == self.max_relocations {
                    warn!(command, relocations, "giving up after repeated relocations");
                    return Err(Error::TooManyRelocations(relocations));
                }
                relocations += 1;
                debug!(command, %location, "server relocated the endpoint");
                self.relocate(location);
                continue;
            }

            if !response.status.is_success() {
                warn!(command, status = %response.status, "command failed");
                return Err(HttpError::new(response.status).into());
            }
            return Ok(response.body);
        }
    }

    fn command_request(
        &self,
        connected: &Connected,
        command: &str,
        content_type: &str,
        body: &[u8],
        extra_params: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
    ) -> Result<Request> {
        let (base_url, email, password, policy_key) = {
            let state = self.lock();
            (
                state.base_url.clone().ok_or(Error::NotConnected)?,
                state.email.clone(),
                state.password.clone(),
                state.policy_key.clone(),
            )
        };

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("Cmd", command)
            .append_pair("User", &email)
            .append_pair("DeviceId", &self.device_id)
            .append_pair("DeviceType", &self.device_type)
            .extend_pairs(extra_params)
            .finish();

        let mut request = Request::new(Method::POST, format!("{}?{}", base_url, query))
            .with_header("Content-Type", content_type)
            .with_header("Authorization", basic_auth(&email, &password));
        if let Some(version) = connected.options.protocol_version() {
            request = request.with_header("MS-ASProtocolVersion", version);
        }
        if let Some(key) = policy_key {
            request = request.with_header("X-MS-PolicyKey", key);
        }
        for &(name, value) in extra_headers {
            request = request.with_header(name, value);
        }
        Ok(request.with_body(body.to_vec()))
    }

    fn command_name(&self, command: Command<'_>) -> Result<String> {
        let tag = match command {
            Command::Name(name) => return Ok(name.to_string()),
            Command::Tag(tag) => tag,
            Command::Wbxml(document) => self.codec.root_tag(document)?,
        };
        CODEPAGES
            .tag_name(tag)
            .map(String::from)
            .ok_or_else(|| ValidateError::UnknownTag(tag).into())
    }
}
