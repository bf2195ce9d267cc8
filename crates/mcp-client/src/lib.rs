//! MCP client for Switchyard.
//!
//! Talks to remote tool backends over MCP streamable HTTP: JSON-RPC
//! protocol types, the transport, initialized connections, scoped
//! connection-set lifecycle, and the per-tenant catalog builder.

pub mod catalog;
pub mod connection;
pub mod lifecycle;
pub mod protocol;
pub mod result;
pub mod transport;

pub use catalog::{build_catalog, Catalog, CatalogFailure, DISCOVERY_OPERATION};
pub use connection::{Connection, Connector, HttpConnector, McpError};
pub use lifecycle::{close_all, open_all};
pub use result::format_tool_result;
pub use transport::{HttpTransport, McpTransport, TransportError};
