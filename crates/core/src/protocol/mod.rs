//! # Protocol Layer
//!
//! Two wire formats live here:
//!
//! - **JSON-RPC**: the Zabbix API envelope spoken over HTTP by the direct client
//! - **Session protocol**: newline-delimited JSON spoken over the proxy's Unix
//!   socket by the proxied session client
//!
//! ## Message Flow
//!
//! ```text
//! Direct:   client --HTTP POST api_jsonrpc.php--> Zabbix
//! Proxied:  client --SessionRequest\n--> zapi-proxy --HTTP--> Zabbix
//!           client <--SessionResponse\n-- zapi-proxy
//! ```

pub mod jsonrpc;
pub mod session;

pub use jsonrpc::{RpcErrorObject, RpcRequest, RpcResponse};
pub use session::{SessionOption, SessionRequest, SessionResponse};
