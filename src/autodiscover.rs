//! Autodiscovery: find the ActiveSync server that serves an email address.
//!
//! A handful of big providers are answered from a built-in table. Everyone else is asked over
//! HTTPS at `https://<domain>/autodiscover/autodiscover.xml`, then at
//! `https://autodiscover.<domain>/...` if the first host clearly doesn't speak autodiscover.

use quick_xml::escape::escape;
use reqwest::Method;
use tracing::{debug, warn};

use crate::error::{AutodiscoverError, Error, HttpError, Result, ValidateError};
use crate::parse::{self, Autodiscovered, MS_NS};
use crate::transport::{basic_auth, Request, Transport};
use crate::types::{AutodiscoverConfig, Server, User, MOBILE_SYNC};

const REQUEST_NS: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/mobilesync/requestschema/2006";

/// Domains whose ActiveSync server is known up front.
const KNOWN_SERVERS: &[(&str, &str)] = &[
    ("gmail.com", "https://m.google.com"),
    ("googlemail.com", "https://m.google.com"),
    ("hotmail.com", "https://m.hotmail.com"),
    ("live.com", "https://m.hotmail.com"),
    ("outlook.com", "https://m.hotmail.com"),
];

/// Find the servers for `email`, authenticating as `email:password`.
///
/// At most one redirect to another address is followed. The returned config's
/// `email_address` is the address that was finally resolved.
pub async fn autodiscover<T: Transport>(
    transport: &T,
    email: &str,
    password: &str,
) -> Result<AutodiscoverConfig> {
    autodiscover_with(transport, email, password, |_| {}).await
}

/// Like [`autodiscover`], but calls `on_redirect` with the new address as soon as a redirect
/// is seen, before the redirected lookup is sent.
pub(crate) async fn autodiscover_with<T, F>(
    transport: &T,
    email: &str,
    password: &str,
    on_redirect: F,
) -> Result<AutodiscoverConfig>
where
    T: Transport,
    F: FnMut(&str),
{
    let domain = domain_of(email)?;
    if let Some(url) = known_server(domain) {
        debug!(%domain, %url, "using built-in server");
        return Ok(known_config(email, url));
    }
    resolve(transport, email, password, false, on_redirect).await
}

/// Run the network part of autodiscovery. With `no_redirect` set, a redirect is an error.
pub(crate) async fn resolve<T, F>(
    transport: &T,
    email: &str,
    password: &str,
    mut no_redirect: bool,
    mut on_redirect: F,
) -> Result<AutodiscoverConfig>
where
    T: Transport,
    F: FnMut(&str),
{
    let mut email = email.to_string();
    loop {
        let domain = domain_of(&email)?;
        let answer = match discover(transport, domain, &email, password, no_redirect).await {
            Err(e) if e.is_domain_error() => {
                debug!(%domain, error = %e, "falling back to autodiscover subdomain");
                let host = format!("autodiscover.{}", domain);
                discover(transport, &host, &email, password, true).await
            }
            answer => answer,
        };

        match answer? {
            Autodiscovered::Config(config) => return Ok(config),
            Autodiscovered::Redirect(target) => {
                debug!(from = %email, to = %target, "autodiscover redirected");
                on_redirect(&target);
                email = target;
                no_redirect = true;
            }
        }
    }
}

/// One autodiscover round trip against `host`.
async fn discover<T: Transport>(
    transport: &T,
    host: &str,
    email: &str,
    password: &str,
    no_redirect: bool,
) -> Result<Autodiscovered> {
    let url = format!("https://{}/autodiscover/autodiscover.xml", host);
    debug!(%url, "autodiscover");
    let request = Request::new(Method::POST, url)
        .with_header("Content-Type", "text/xml")
        .with_header("Authorization", basic_auth(email, password))
        .with_body(request_body(email).into_bytes());

    let response = transport.send(request).await?;
    debug!(%host, status = %response.status, "autodiscover answered");
    if !response.status.is_success() {
        warn!(%host, status = %response.status, "autodiscover failed");
        return Err(Error::Http(HttpError::new(response.status)));
    }

    match parse::parse_autodiscover(&response.body, email)? {
        Autodiscovered::Redirect(_) if no_redirect => Err(AutodiscoverError::Protocol(
            "Multiple redirects occurred during autodiscovery".to_string(),
        )
        .into()),
        answer => Ok(answer),
    }
}

fn request_body(email: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="{}">
  <Request>
    <EMailAddress>{}</EMailAddress>
    <AcceptableResponseSchema>{}</AcceptableResponseSchema>
  </Request>
</Autodiscover>"#,
        REQUEST_NS,
        escape(email),
        MS_NS
    )
}

fn domain_of(email: &str) -> Result<&str> {
    match email.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => Ok(domain),
        _ => Err(ValidateError::InvalidEmail(email.to_string()).into()),
    }
}

fn known_server(domain: &str) -> Option<&'static str> {
    KNOWN_SERVERS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(domain))
        .map(|&(_, url)| url)
}

fn known_config(email: &str, url: &str) -> AutodiscoverConfig {
    AutodiscoverConfig {
        email_address: email.to_string(),
        culture: String::new(),
        user: User {
            name: String::new(),
            email: email.to_string(),
        },
        servers: vec![Server {
            kind: MOBILE_SYNC.to_string(),
            url: url.to_string(),
            name: url.to_string(),
            server_data: String::new(),
        }],
    }
}
