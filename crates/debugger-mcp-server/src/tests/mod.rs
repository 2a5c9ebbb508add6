//! Test modules for debugger-mcp-server
