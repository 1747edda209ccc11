pub mod address_repo;
pub mod utxo_repo;

pub use address_repo::AddressRepository;
pub use utxo_repo::UtxoRepository;
