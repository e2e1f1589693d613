pub mod extractors;
pub mod jwt;
pub mod password;
pub mod tokens;

pub use extractors::AuthAccount;
