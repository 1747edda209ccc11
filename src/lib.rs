//! BTC wallet signing backend: key generation, legacy P2PKH and P2SH-multisig
//! signing, and the JSON-RPC service around them.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod services;
