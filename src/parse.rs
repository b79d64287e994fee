use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use super::error::{AutodiscoverError, ParseError, Result};
use super::transport::Response;
use super::types::*;

/// Namespace of the autodiscover response envelope.
pub(crate) const AD_NS: &str = "http://schemas.microsoft.com/exchange/autodiscover/responseschema/2006";
/// Namespace of the mobilesync part of an autodiscover response.
pub(crate) const MS_NS: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/mobilesync/responseschema/2006";

pub(crate) const VERSIONS_HEADER: &str = "MS-ASProtocolVersions";
pub(crate) const COMMANDS_HEADER: &str = "MS-ASProtocolCommands";

/// What an autodiscover server told us.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Autodiscovered {
    Config(AutodiscoverConfig),
    /// Ask again on behalf of this address.
    Redirect(String),
}

pub(crate) fn parse_autodiscover(body: &[u8], email: &str) -> Result<Autodiscovered> {
    let doc = std::str::from_utf8(body)
        .map_err(|e| e.to_string())
        .and_then(parse_document)
        .map_err(|e| AutodiscoverError::Domain(format!("Error parsing autodiscover response: {}", e)))?;

    let response = Some(&doc)
        .filter(|root| root.is(AD_NS, "Autodiscover"))
        .and_then(|root| root.child(MS_NS, "Response"))
        .ok_or_else(|| AutodiscoverError::Domain("Missing Autodiscover Response node".to_string()))?;

    let error = response
        .child(MS_NS, "Error")
        .or_else(|| response.path(MS_NS, &["Action", "Error"]));
    if let Some(error) = error {
        return Err(AutodiscoverError::Protocol(error.text_of(MS_NS, "Message")).into());
    }

    if let Some(redirect) = response.path(MS_NS, &["Action", "Redirect"]) {
        return Ok(Autodiscovered::Redirect(redirect.text.clone()));
    }

    let user = response.child(MS_NS, "User");
    let servers = response
        .path(MS_NS, &["Action", "Settings"])
        .map(|settings| {
            settings
                .children(MS_NS, "Server")
                .map(|server| Server {
                    kind: server.text_of(MS_NS, "Type"),
                    url: server.text_of(MS_NS, "Url"),
                    name: server.text_of(MS_NS, "Name"),
                    server_data: server.text_of(MS_NS, "ServerData"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Autodiscovered::Config(AutodiscoverConfig {
        email_address: email.to_string(),
        culture: response.text_of(MS_NS, "Culture"),
        user: User {
            name: user.map(|u| u.text_of(MS_NS, "DisplayName")).unwrap_or_default(),
            email: user.map(|u| u.text_of(MS_NS, "EMailAddress")).unwrap_or_default(),
        },
        servers,
    }))
}

/// Pull the advertised versions and commands out of an `OPTIONS` response.
pub(crate) fn parse_options(response: &Response) -> Result<ServerOptions> {
    let versions = response
        .header(VERSIONS_HEADER)
        .ok_or(ParseError::MissingHeader(VERSIONS_HEADER))?;
    let commands = response
        .header(COMMANDS_HEADER)
        .ok_or(ParseError::MissingHeader(COMMANDS_HEADER))?;
    let versions: Vec<String> = split_list(versions).collect();
    if versions.is_empty() {
        return Err(ParseError::MissingHeader(VERSIONS_HEADER).into());
    }
    Ok(ServerOptions::new(versions, split_list(commands)))
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Just enough of a DOM to answer the handful of path queries autodiscover needs.
#[derive(Debug, Default)]
struct Element {
    namespace: Option<String>,
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(ns: &ResolveResult<'_>, local_name: &[u8]) -> Element {
        let namespace = match *ns {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            _ => None,
        };
        Element {
            namespace,
            name: String::from_utf8_lossy(local_name).into_owned(),
            ..Element::default()
        }
    }

    fn is(&self, ns: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(ns) && self.name == name
    }

    fn children<'a>(&'a self, ns: &'a str, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.is(ns, name))
    }

    fn child(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(ns, name))
    }

    fn path(&self, ns: &str, names: &[&str]) -> Option<&Element> {
        names
            .iter()
            .try_fold(self, |element, name| element.child(ns, name))
    }

    /// Text of the first matching child, or empty.
    fn text_of(&self, ns: &str, name: &str) -> String {
        self.child(ns, name)
            .map(|c| c.text.clone())
            .unwrap_or_default()
    }
}

fn parse_document(xml: &str) -> std::result::Result<Element, String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut open: Vec<Element> = Vec::new();
    loop {
        let (ns, event) = reader.read_resolved_event().map_err(|e| e.to_string())?;
        let closed = match event {
            Event::Start(e) => {
                open.push(Element::new(&ns, e.local_name().as_ref()));
                None
            }
            Event::Empty(e) => Some(Element::new(&ns, e.local_name().as_ref())),
            Event::End(_) => Some(open.pop().ok_or("unbalanced end tag")?),
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&text);
                }
                None
            }
            Event::CData(c) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&c));
                }
                None
            }
            Event::Eof => return Err("no root element".to_string()),
            _ => None,
        };

        if let Some(element) = closed {
            match open.last_mut() {
                Some(parent) => parent.children.push(element),
                None => return Ok(element),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use reqwest::StatusCode;

    fn envelope(response: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="{}">
  <Response xmlns="{}">{}</Response>
</Autodiscover>"#,
            AD_NS, MS_NS, response
        )
    }

    #[test]
    fn parse_settings() {
        let xml = envelope(
            r#"
    <Culture>en:us</Culture>
    <User>
      <DisplayName>Jane Doe</DisplayName>
      <EMailAddress>jane@example.com</EMailAddress>
    </User>
    <Action>
      <Settings>
        <Server>
          <Type>CertEnroll</Type>
          <Url>https://certs.example.com</Url>
          <ServerData>CertEnrollTemplate</ServerData>
        </Server>
        <Server>
          <Type>MobileSync</Type>
          <Url>https://mail.example.com</Url>
          <Name>https://mail.example.com</Name>
        </Server>
      </Settings>
    </Action>"#,
        );
        let config = match parse_autodiscover(xml.as_bytes(), "jane@example.com").unwrap() {
            Autodiscovered::Config(config) => config,
            other => panic!("expected settings, got {:?}", other),
        };
        assert_eq!(config.email_address, "jane@example.com");
        assert_eq!(config.culture, "en:us");
        assert_eq!(config.user.name, "Jane Doe");
        assert_eq!(config.user.email, "jane@example.com");
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].kind, "CertEnroll");
        assert_eq!(config.servers[0].server_data, "CertEnrollTemplate");
        assert_eq!(config.servers[0].name, "");
        let server = config.mobile_sync_server().unwrap();
        assert_eq!(server.url, "https://mail.example.com");
    }

    #[test]
    fn parse_prefixed_namespaces() {
        let xml = format!(
            r#"<a:Autodiscover xmlns:a="{}"><m:Response xmlns:m="{}"><m:Action><m:Redirect>other@example.org</m:Redirect></m:Action></m:Response></a:Autodiscover>"#,
            AD_NS, MS_NS
        );
        assert_eq!(
            parse_autodiscover(xml.as_bytes(), "me@example.com").unwrap(),
            Autodiscovered::Redirect("other@example.org".to_string())
        );
    }

    #[test]
    fn parse_errors() {
        let xml = envelope("<Error><Status>1</Status><Message>No such user</Message></Error>");
        match parse_autodiscover(xml.as_bytes(), "me@example.com") {
            Err(Error::Autodiscover(AutodiscoverError::Protocol(msg))) => {
                assert_eq!(msg, "No such user")
            }
            other => panic!("unexpected {:?}", other),
        }

        let xml = envelope("<Action><Error><Message>Try later</Message></Error></Action>");
        match parse_autodiscover(xml.as_bytes(), "me@example.com") {
            Err(Error::Autodiscover(AutodiscoverError::Protocol(msg))) => {
                assert_eq!(msg, "Try later")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn domain_errors() {
        let not_xml = parse_autodiscover(b"<html><body>It works!", "me@example.com");
        assert!(not_xml.unwrap_err().is_domain_error());

        let html = parse_autodiscover(b"<html><body>It works!</body></html>", "me@example.com");
        assert!(html.unwrap_err().is_domain_error());

        // right element names, wrong namespace
        let xml = format!(
            "<Autodiscover xmlns=\"{}\"><Response/></Autodiscover>",
            AD_NS
        );
        assert!(parse_autodiscover(xml.as_bytes(), "me@example.com")
            .unwrap_err()
            .is_domain_error());

        assert!(parse_autodiscover(&[0xff, 0xfe, 0x00], "me@example.com")
            .unwrap_err()
            .is_domain_error());
    }

    #[test]
    fn parse_options_headers() {
        let response = Response::new(StatusCode::OK)
            .with_header(VERSIONS_HEADER, "2.5,12.0, 12.1")
            .unwrap()
            .with_header(COMMANDS_HEADER, "Sync,FolderSync, Provision,")
            .unwrap();
        let options = parse_options(&response).unwrap();
        assert_eq!(options.versions(), ["2.5", "12.0", "12.1"]);
        assert!(options.has("FolderSync"));
        assert!(options.has("Provision"));
        assert_eq!(options.commands().count(), 3);
    }

    #[test]
    fn parse_options_empty_versions() {
        for versions in ["", " , ,"] {
            let response = Response::new(StatusCode::OK)
                .with_header(VERSIONS_HEADER, versions)
                .unwrap()
                .with_header(COMMANDS_HEADER, "Sync")
                .unwrap();
            assert!(matches!(
                parse_options(&response),
                Err(Error::Parse(ParseError::MissingHeader(VERSIONS_HEADER)))
            ));
        }
    }

    #[test]
    fn parse_options_missing_header() {
        let response = Response::new(StatusCode::OK)
            .with_header(VERSIONS_HEADER, "14.1")
            .unwrap();
        assert!(matches!(
            parse_options(&response),
            Err(Error::Parse(ParseError::MissingHeader(COMMANDS_HEADER)))
        ));
    }
}
