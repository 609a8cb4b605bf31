pub mod embedding;
pub mod error;
pub mod llm;
pub mod mcp_api;
pub mod redis;
