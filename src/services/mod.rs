pub mod signing_service;
pub mod wallet_service;

pub use signing_service::SigningService;
pub use wallet_service::WalletService;
