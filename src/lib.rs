//! Exchange ActiveSync client connection layer for Rust.
//!
//! This crate finds a user's ActiveSync server (through Autodiscover or a built-in table for the
//! big providers), negotiates the protocol version, provisions when the server asks for it, and
//! posts commands, following the server when it moves the endpoint with a `451` answer.
//!
//! Command bodies are WBXML. Encoding and decoding them is left to a caller-supplied [`Codec`];
//! the tag tables it needs live in [`codepages`].
//!
//! # Usage
//!
//! Here is a basic example of using the client.
//!
//! ```no_run
//! use activesync::{Codec, CodepageRegistry, ConnectionBuilder};
//!
//! # struct MyCodec;
//! # impl Codec for MyCodec {
//! #     type Document = Vec<u8>;
//! #     fn root_tag(&self, doc: &[u8]) -> activesync::Result<u16> { Ok(0) }
//! #     fn decode(&self, data: &[u8], _: &CodepageRegistry) -> activesync::Result<Vec<u8>> {
//! #         Ok(data.to_vec())
//! #     }
//! # }
//! #[tokio::main]
//! async fn main() -> activesync::Result<()> {
//!     let conn = ConnectionBuilder::new("jane@example.com", "hunter2")
//!         .device_id("3B9C8A1E")
//!         .build(MyCodec)?;
//!
//!     let connected = conn.connect().await?;
//!     println!("connected to {}", connected.config.server_url());
//!     println!("speaking {:?}", conn.current_version());
//!
//!     if conn.supports_command("FolderSync")? {
//!         let folders = conn.post_command("FolderSync", &[], &[]).await?;
//!         println!("{:?}", folders);
//!     }
//!
//!     conn.disconnect()
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod parse;

pub mod autodiscover;
pub mod codepages;
mod command;
mod connection;
mod connection_builder;
pub mod error;
pub mod transport;
mod types;
mod version;

pub use crate::autodiscover::autodiscover;
pub use crate::codepages::{Codepage, CodepageRegistry, CODEPAGES};
pub use crate::command::{Codec, Command, WBXML_CONTENT_TYPE};
pub use crate::connection::Connection;
pub use crate::connection_builder::{
    ConnectionBuilder, DEFAULT_DEVICE_ID, DEFAULT_DEVICE_TYPE, DEFAULT_MAX_RELOCATIONS,
};
pub use crate::error::{Error, Result};
pub use crate::transport::{HttpTransport, Request, Response, Transport};
pub use crate::types::*;
pub use crate::version::Version;

#[cfg(test)]
mod mock_transport;
