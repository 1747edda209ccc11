pub mod bitcoin;
pub mod combiner;
pub mod traits;

pub use combiner::RpcSignatureCombiner;
pub use traits::SignatureCombiner;
