use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::autodiscover;
use super::error::{AutodiscoverError, Error, HttpError, Result};
use super::parse;
use super::transport::{basic_auth, Request, Transport};
use super::types::*;
use super::version::Version;
use super::Codec;

/// Path of the ActiveSync endpoint below a server URL.
pub(crate) const ENDPOINT_PATH: &str = "/Microsoft-Server-ActiveSync";

type Waiter = oneshot::Sender<Result<Arc<Connected>>>;

/// A connection to an ActiveSync server.
///
/// Build one with a [`ConnectionBuilder`](crate::ConnectionBuilder). All operations take
/// `&self`, so a connection can be shared between tasks; concurrent calls to
/// [`connect`](Connection::connect) are coalesced into a single handshake.
pub struct Connection<T, C> {
    pub(crate) transport: T,
    pub(crate) codec: C,
    pub(crate) device_id: String,
    pub(crate) device_type: String,
    pub(crate) max_relocations: usize,
    state: Mutex<State>,
}

pub(crate) struct State {
    phase: ConnectionState,
    pub(crate) email: String,
    pub(crate) password: String,
    /// The server URL the connection is pinned to, without the endpoint path.
    server: Option<String>,
    pub(crate) base_url: Option<String>,
    pub(crate) policy_key: Option<String>,
    connected: Option<Arc<Connected>>,
    waiting_for_connection: bool,
    waiters: Vec<Waiter>,
}

impl State {
    fn pin(&mut self, server: &str) {
        self.phase = ConnectionState::ServerSet;
        self.server = Some(server.to_string());
        self.base_url = Some(format!("{}{}", server, ENDPOINT_PATH));
        self.connected = None;
    }

    fn reset(&mut self) {
        self.phase = ConnectionState::Disconnected;
        self.server = None;
        self.base_url = None;
        self.connected = None;
    }
}

/// Hands the outcome of a handshake to everyone queued on it, in arrival order.
///
/// If the handshake future is dropped before finishing, the queue is dropped instead and the
/// waiters see [`Error::ConnectionLost`].
struct Handshake<'a, T, C> {
    conn: &'a Connection<T, C>,
    done: bool,
}

impl<T, C> Handshake<'_, T, C> {
    fn finish(mut self, result: Result<Arc<Connected>>) {
        self.done = true;
        let waiters = {
            let mut state = self.conn.lock();
            state.waiting_for_connection = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl<T, C> Drop for Handshake<'_, T, C> {
    fn drop(&mut self) {
        if !self.done {
            let mut state = self.conn.lock();
            state.waiting_for_connection = false;
            state.waiters.clear();
        }
    }
}

impl<T, C> Connection<T, C> {
    pub(crate) fn new(
        transport: T,
        codec: C,
        email: String,
        password: String,
        device_id: String,
        device_type: String,
        max_relocations: usize,
    ) -> Connection<T, C> {
        Connection {
            transport,
            codec,
            device_id,
            device_type,
            max_relocations,
            state: Mutex::new(State {
                phase: ConnectionState::Disconnected,
                email,
                password,
                server: None,
                base_url: None,
                policy_key: None,
                connected: None,
                waiting_for_connection: false,
                waiters: Vec::new(),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pin the connection to `server`, skipping autodiscovery on the next `connect`.
    ///
    /// `server` is the server's base URL; the ActiveSync endpoint path is appended to it.
    pub fn set_server(&self, server: &str) {
        debug!(%server, "server set");
        self.lock().pin(server);
    }

    /// Replace the credentials and pin the connection to `server`.
    pub fn open(&self, server: &str, email: &str, password: &str) {
        let mut state = self.lock();
        state.email = email.to_string();
        state.password = password.to_string();
        state.pin(server);
        debug!(%server, %email, "opened");
    }

    /// Drop back to [`ConnectionState::Disconnected`].
    ///
    /// Fails with [`Error::ConnectionInProgress`] while a `connect` is in flight.
    pub fn disconnect(&self) -> Result<()> {
        let mut state = self.lock();
        if state.waiting_for_connection {
            return Err(Error::ConnectionInProgress);
        }
        state.reset();
        debug!("disconnected");
        Ok(())
    }

    /// Send `key` as `X-MS-PolicyKey` on every subsequent command.
    pub fn set_policy_key(&self, key: &str) {
        self.lock().policy_key = Some(key.to_string());
    }

    /// The policy key set with [`set_policy_key`](Self::set_policy_key), if any.
    pub fn policy_key(&self) -> Option<String> {
        self.lock().policy_key.clone()
    }

    /// Where the connection is in its lifecycle.
    pub fn state(&self) -> ConnectionState {
        self.lock().phase
    }

    /// True once `connect` has succeeded and until `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True while a `connect` handshake is in flight.
    pub fn is_connecting(&self) -> bool {
        self.lock().waiting_for_connection
    }

    /// The email address used to authenticate.
    ///
    /// An autodiscovery redirect rewrites it as soon as the redirect is seen, so it keeps the
    /// new address even if the redirected lookup then fails.
    pub fn email(&self) -> String {
        self.lock().email.clone()
    }

    /// The URL commands are posted to, if a server has been chosen.
    pub fn base_url(&self) -> Option<String> {
        self.lock().base_url.clone()
    }

    /// The outcome of the last successful `connect`.
    pub fn connected(&self) -> Option<Arc<Connected>> {
        self.lock().connected.clone()
    }

    /// The protocol versions the server advertised.
    pub fn versions(&self) -> Vec<String> {
        self.connected()
            .map(|c| c.options.versions().to_vec())
            .unwrap_or_default()
    }

    /// The protocol version in use: the last one the server advertised.
    pub fn current_version(&self) -> Option<Version> {
        self.connected().and_then(|c| c.options.current_version())
    }

    pub(crate) fn relocate(&self, base_url: &str) {
        self.lock().base_url = Some(base_url.to_string());
    }
}

impl<T: Transport, C: Codec> Connection<T, C> {
    /// Bring the connection up: find the server, learn its protocol options and provision if
    /// the server asks for it.
    ///
    /// Returns at once if already connected. If another `connect` is in flight, this waits for
    /// it and returns its outcome. A failing provisioning step is reported, but the connection
    /// stays connected.
    pub async fn connect(&self) -> Result<Arc<Connected>> {
        let (done, leader) = {
            let mut state = self.lock();
            if state.phase == ConnectionState::Connected {
                if let Some(connected) = state.connected.clone() {
                    return Ok(connected);
                }
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            let leader = !state.waiting_for_connection;
            state.waiting_for_connection = true;
            (rx, leader)
        };

        if leader {
            let guard = Handshake {
                conn: self,
                done: false,
            };
            let result = self.handshake().await;
            guard.finish(result);
        } else {
            debug!("connect already in progress, waiting");
        }

        done.await.unwrap_or(Err(Error::ConnectionLost))
    }

    async fn handshake(&self) -> Result<Arc<Connected>> {
        let (email, password, pinned) = {
            let state = self.lock();
            let pinned = match state.phase {
                ConnectionState::Disconnected => None,
                _ => state.server.clone(),
            };
            (state.email.clone(), state.password.clone(), pinned)
        };

        let config = match pinned {
            Some(url) => ConnectConfig::Forced { url },
            None => self.discover(&email, &password).await?,
        };

        let base_url = self.base_url().ok_or(Error::NotConnected)?;
        let options = self.options(&base_url).await?;
        info!(server = config.server_url(), %options, "connected");

        let connected = Arc::new(Connected { config, options });
        {
            let mut state = self.lock();
            state.phase = ConnectionState::Connected;
            state.connected = Some(connected.clone());
        }

        if connected.options.has("Provision") {
            if let Err(e) = self
                .send_command(&connected, "Provision", super::WBXML_CONTENT_TYPE, &[], &[], &[])
                .await
            {
                warn!(error = %e, "provisioning failed");
                return Err(e);
            }
        }
        Ok(connected)
    }

    async fn discover(&self, email: &str, password: &str) -> Result<ConnectConfig> {
        let discovered =
            autodiscover::autodiscover_with(&self.transport, email, password, |redirected| {
                self.lock().email = redirected.to_string();
            })
            .await;

        let mut state = self.lock();
        let config = match discovered {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "autodiscovery failed");
                state.reset();
                return Err(e);
            }
        };
        let server = match config.mobile_sync_server() {
            Some(server) => server.clone(),
            None => {
                state.reset();
                return Err(
                    AutodiscoverError::Protocol("No MobileSync server found".to_string()).into(),
                );
            }
        };
        state.pin(&server.url);
        debug!(server = %server.url, "autodiscovered");
        Ok(ConnectConfig::Autodiscovered { config, server })
    }

    async fn options(&self, base_url: &str) -> Result<ServerOptions> {
        let email = self.email();
        let password = self.lock().password.clone();
        let request = Request::new(Method::OPTIONS, base_url)
            .with_header("Authorization", basic_auth(&email, &password));

        debug!(url = %base_url, "OPTIONS");
        let response = self.transport.send(request).await?;
        debug!(status = %response.status, "OPTIONS answered");
        if !response.status.is_success() {
            warn!(status = %response.status, "OPTIONS failed");
            return Err(HttpError::new(response.status).into());
        }
        parse::parse_options(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codepages::CodepageRegistry;
    use crate::error::ParseError;
    use crate::mock_transport::MockTransport;
    use crate::parse::{AD_NS, MS_NS};
    use crate::transport::Response;
    use crate::ConnectionBuilder;
    use reqwest::StatusCode;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::Poll;

    struct NoCodec;

    impl Codec for NoCodec {
        type Document = ();

        fn root_tag(&self, _: &[u8]) -> Result<u16> {
            Err(Error::NotConnected)
        }

        fn decode(&self, _: &[u8], _: &CodepageRegistry) -> Result<()> {
            Ok(())
        }
    }

    fn options(commands: &str) -> Response {
        Response::new(StatusCode::OK)
            .with_header("MS-ASProtocolVersions", "2.5,12.0,12.1")
            .unwrap()
            .with_header("MS-ASProtocolCommands", commands)
            .unwrap()
    }

    fn settings(servers: &[(&str, &str)]) -> Response {
        let servers: String = servers
            .iter()
            .map(|(kind, url)| format!("<Server><Type>{}</Type><Url>{}</Url></Server>", kind, url))
            .collect();
        Response::new(StatusCode::OK).with_body(format!(
            "<Autodiscover xmlns=\"{}\"><Response xmlns=\"{}\"><Action><Settings>{}</Settings>\
             </Action></Response></Autodiscover>",
            AD_NS, MS_NS, servers
        ))
    }

    fn connection(
        email: &str,
        transport: &Arc<MockTransport>,
    ) -> Connection<Arc<MockTransport>, NoCodec> {
        ConnectionBuilder::new(email, "pw").build_with_transport(transport.clone(), NoCodec)
    }

    #[tokio::test]
    async fn connect_with_forced_server() {
        let transport = Arc::new(MockTransport::new().with_response(options("Sync,FolderSync")));
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");
        assert_eq!(conn.state(), ConnectionState::ServerSet);

        let connected = conn.connect().await.unwrap();
        assert!(connected.config.is_forced());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(
            conn.base_url().as_deref(),
            Some("https://eas.example.com/Microsoft-Server-ActiveSync")
        );
        assert_eq!(conn.versions(), ["2.5", "12.0", "12.1"]);
        assert!(conn.current_version().unwrap().eq("12.1"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::OPTIONS);
        assert_eq!(
            requests[0].url,
            "https://eas.example.com/Microsoft-Server-ActiveSync"
        );

        // already connected: no network
        let again = conn.connect().await.unwrap();
        assert!(Arc::ptr_eq(&connected, &again));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn connect_through_autodiscovery() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(settings(&[
                    ("CertEnroll", "https://certs.example.com"),
                    ("MobileSync", "https://eas.example.com"),
                ]))
                .with_response(options("Sync")),
        );
        let conn = connection("me@example.com", &transport);
        let connected = conn.connect().await.unwrap();
        match connected.config {
            ConnectConfig::Autodiscovered { ref server, ref config } => {
                assert_eq!(server.url, "https://eas.example.com");
                assert_eq!(config.servers.len(), 2);
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            transport.requests()[1].url,
            "https://eas.example.com/Microsoft-Server-ActiveSync"
        );
    }

    #[tokio::test]
    async fn no_mobile_sync_server() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(settings(&[("CertEnroll", "https://certs.example.com")])),
        );
        let conn = connection("me@example.com", &transport);
        match conn.connect().await {
            Err(Error::Autodiscover(AutodiscoverError::Protocol(msg))) => {
                assert_eq!(msg, "No MobileSync server found")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.base_url(), None);
        assert!(!conn.is_connecting());
    }

    #[tokio::test]
    async fn autodiscovery_failure_resets() {
        let transport =
            Arc::new(MockTransport::new().with_response(Response::new(StatusCode::UNAUTHORIZED)));
        let conn = connection("me@example.com", &transport);
        assert!(conn.connect().await.unwrap_err().is_auth_failure());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn options_failure_keeps_server() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(settings(&[("MobileSync", "https://eas.example.com")]))
                .with_response(Response::new(StatusCode::OK))
                .with_response(options("Sync")),
        );
        let conn = connection("me@example.com", &transport);
        assert!(matches!(
            conn.connect().await,
            Err(Error::Parse(ParseError::MissingHeader(_)))
        ));
        assert_eq!(conn.state(), ConnectionState::ServerSet);

        // retry goes straight to OPTIONS
        let connected = conn.connect().await.unwrap();
        assert!(connected.config.is_forced());
        assert_eq!(connected.config.server_url(), "https://eas.example.com");
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn empty_versions_do_not_connect() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(
                    Response::new(StatusCode::OK)
                        .with_header("MS-ASProtocolVersions", " , ")
                        .unwrap()
                        .with_header("MS-ASProtocolCommands", "Sync")
                        .unwrap(),
                )
                .with_response(options("Sync")),
        );
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");
        assert!(matches!(
            conn.connect().await,
            Err(Error::Parse(ParseError::MissingHeader("MS-ASProtocolVersions")))
        ));
        assert_eq!(conn.state(), ConnectionState::ServerSet);
        assert!(conn.current_version().is_none());

        conn.connect().await.unwrap();
        assert!(conn.current_version().unwrap().eq("12.1"));
    }

    #[tokio::test]
    async fn options_transport_failure_keeps_pinned_server() {
        let transport = Arc::new(MockTransport::new().with_error(Error::ConnectionLost));
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");
        assert!(matches!(conn.connect().await, Err(Error::ConnectionLost)));
        assert_eq!(conn.state(), ConnectionState::ServerSet);
        assert!(!conn.is_connecting());
        assert_eq!(
            conn.base_url().as_deref(),
            Some("https://eas.example.com/Microsoft-Server-ActiveSync")
        );

        transport.push(Ok(options("Sync")));
        let connected = conn.connect().await.unwrap();
        assert!(connected.config.is_forced());
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::OPTIONS);
        assert_eq!(requests[1].url, requests[0].url);
    }

    #[tokio::test]
    async fn redirect_rewrites_email_even_on_failure() {
        let redirect = Response::new(StatusCode::OK).with_body(format!(
            "<Autodiscover xmlns=\"{}\"><Response xmlns=\"{}\"><Action><Redirect>\
             me@corp.example.org</Redirect></Action></Response></Autodiscover>",
            AD_NS, MS_NS
        ));
        let transport = Arc::new(
            MockTransport::new()
                .with_response(redirect.clone())
                .with_response(Response::new(StatusCode::UNAUTHORIZED)),
        );
        let conn = connection("me@example.com", &transport);
        assert!(conn.connect().await.unwrap_err().is_auth_failure());
        assert_eq!(conn.email(), "me@corp.example.org");
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let transport = Arc::new(
            MockTransport::new()
                .with_response(redirect)
                .with_response(settings(&[("MobileSync", "https://eas.corp.example.org")]))
                .with_response(options("Sync")),
        );
        let conn = connection("me@example.com", &transport);
        conn.connect().await.unwrap();
        assert_eq!(conn.email(), "me@corp.example.org");
        assert_eq!(
            transport.requests()[2].header("Authorization"),
            Some(basic_auth("me@corp.example.org", "pw").as_str())
        );
    }

    #[tokio::test]
    async fn provisions_when_advertised() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(options("Sync,Provision"))
                .with_response(Response::new(StatusCode::OK)),
        );
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");
        conn.connect().await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].url.contains("?Cmd=Provision&"));
        assert_eq!(requests[1].method, Method::POST);
    }

    #[tokio::test]
    async fn provision_failure_stays_connected() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(options("Sync,Provision"))
                .with_response(Response::new(StatusCode::INTERNAL_SERVER_ERROR)),
        );
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");
        assert!(matches!(conn.connect().await, Err(Error::Http(_))));
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(conn.supports_command("Sync").unwrap());
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_handshake() {
        let transport = Arc::new(MockTransport::new().with_response(options("Sync")));
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");

        let (a, b, c) = tokio::join!(conn.connect(), conn.connect(), conn.connect());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_failure() {
        let transport =
            Arc::new(MockTransport::new().with_response(Response::new(StatusCode::FORBIDDEN)));
        let conn = connection("me@example.com", &transport);

        let (a, b, c) = tokio::join!(conn.connect(), conn.connect(), conn.connect());
        for result in [a, b, c] {
            match result {
                Err(Error::Http(e)) => assert_eq!(e.status, StatusCode::FORBIDDEN),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(transport.request_count(), 1);
    }

    /// Poll a future exactly once.
    async fn poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        std::future::poll_fn(|cx| match Pin::new(&mut fut).poll(cx) {
            Poll::Ready(v) => Poll::Ready(Some(v)),
            Poll::Pending => Poll::Ready(None),
        })
        .await
    }

    #[tokio::test]
    async fn disconnect_refused_while_connecting() {
        let transport = Arc::new(MockTransport::new().with_response(options("Sync")));
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");

        let pending = conn.connect();
        tokio::pin!(pending);
        assert!(poll_once(pending.as_mut()).await.is_none());
        assert!(conn.is_connecting());
        assert!(matches!(conn.disconnect(), Err(Error::ConnectionInProgress)));
        assert!(pending.await.is_ok());

        conn.disconnect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.base_url(), None);
        assert!(conn.versions().is_empty());
        assert!(conn.current_version().is_none());
        assert!(matches!(
            conn.supports_command("Sync"),
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn abandoned_handshake_releases_waiters() {
        let transport = Arc::new(MockTransport::new().with_response(options("Sync")));
        let conn = connection("me@example.com", &transport);
        conn.set_server("https://eas.example.com");

        {
            let pending = conn.connect();
            tokio::pin!(pending);
            assert!(poll_once(pending.as_mut()).await.is_none());
            assert!(conn.is_connecting());
        }
        assert!(!conn.is_connecting());
        conn.disconnect().unwrap();
    }

    #[tokio::test]
    async fn open_replaces_credentials() {
        let transport = Arc::new(MockTransport::new().with_response(options("Sync")));
        let conn = connection("me@example.com", &transport);
        conn.open("https://other.example.com", "you@example.com", "hunter2");
        assert_eq!(conn.email(), "you@example.com");
        conn.connect().await.unwrap();
        let request = &transport.requests()[0];
        assert_eq!(
            request.header("Authorization"),
            Some(basic_auth("you@example.com", "hunter2").as_str())
        );
        assert!(request.url.starts_with("https://other.example.com/"));
    }
}
