//! # zapi Session Proxy
//!
//! A long-lived process holding one authenticated Zabbix API session on
//! behalf of short-lived clients. Clients reach it through a Unix domain
//! socket and speak the session protocol from `zapi_core::protocol::session`.
//!
//! ## Key Components
//!
//! - **Server**: socket listener answering session requests
//! - **Upstream**: lazily built direct client configured by session options

pub mod server;
pub mod upstream;

pub use server::{MAX_REQUEST_LINE, SessionServer, default_socket_path};
pub use upstream::UpstreamSession;
