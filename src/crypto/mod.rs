pub mod encryption;

pub use encryption::KeyCipher;
