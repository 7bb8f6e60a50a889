pub mod jsonrpc;

pub use jsonrpc::{redact_jsonrpc_stream, JsonRpcTransformStats};
