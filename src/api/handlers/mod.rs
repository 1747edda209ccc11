pub mod jsonrpc;

pub use jsonrpc::wallet_rpc;
