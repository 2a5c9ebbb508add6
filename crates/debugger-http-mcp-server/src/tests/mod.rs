//! Test modules for debugger-http-mcp-server
//!
//! Transport tests drive `McpTransportHandler` in-process with in-memory
//! request bodies; server tests exercise a real listener.
