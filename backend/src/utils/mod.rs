pub mod cookies;
pub mod fingerprint;
pub mod jwt;
pub mod request;
