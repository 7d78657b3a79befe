//! Credential handling: encryption of sensitive device descriptors.

pub mod vault;

pub use vault::CredentialVault;
