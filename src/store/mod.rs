pub mod memory;

#[cfg(target_os = "macos")]
pub mod keychain;

use std::fmt;

use anyhow::Result;
use thiserror::Error;

/// Scopes in which the keychain records trust-setting overrides for a
/// certificate, listed in the order they are cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDomain {
    System,
    Admin,
    User,
}

impl TrustDomain {
    pub const ALL: [TrustDomain; 3] =
        [TrustDomain::System, TrustDomain::Admin, TrustDomain::User];
}

impl fmt::Display for TrustDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustDomain::System => f.write_str("Domain System"),
            TrustDomain::Admin => f.write_str("Domain Admin"),
            TrustDomain::User => f.write_str("Domain User"),
        }
    }
}

/// Failure reported by a single store call.
///
/// The store speaks in status codes; only absence and missing write
/// permission are meaningful to callers, everything else is carried
/// verbatim for the operator to look up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,

    #[error("write permission denied")]
    PermissionDenied,

    #[error("OSStatus {0}")]
    Status(i32),
}

/// Capability interface over the credential store.
///
/// Handle types are store-defined so the real backend can hand out
/// framework references while the in-memory store hands out
/// instrumented ones. Dropping a handle releases it; every operation
/// here is a single blocking call with no retries.
pub trait TrustStore {
    type Certificate;
    type Identity;
    type Key;

    /// Looks up the first certificate whose label matches.
    fn find_certificate(&self, label: &str) -> Result<Self::Certificate, StoreError>;

    /// Whether override trust settings are recorded for the certificate
    /// in the given domain. Errors on the existence query count as
    /// "maybe present": removal is attempted anyway.
    fn trust_settings_exist(&self, cert: &Self::Certificate, domain: TrustDomain) -> bool;

    fn remove_trust_settings(
        &self,
        cert: &Self::Certificate,
        domain: TrustDomain,
    ) -> Result<(), StoreError>;

    /// Pairs the certificate with its private key. `NotFound` means the
    /// certificate has no private key in the store.
    fn identity_for_certificate(
        &self,
        cert: &Self::Certificate,
    ) -> Result<Self::Identity, StoreError>;

    fn identity_private_key(&self, identity: &Self::Identity) -> Result<Self::Key, StoreError>;

    fn delete_key(&self, key: Self::Key) -> Result<(), StoreError>;

    fn delete_certificate(&self, cert: &Self::Certificate) -> Result<(), StoreError>;
}

/// Opens the platform credential store.
#[cfg(target_os = "macos")]
pub fn open_default() -> Result<keychain::KeychainStore> {
    Ok(keychain::KeychainStore::new())
}

#[cfg(not(target_os = "macos"))]
pub fn open_default() -> Result<memory::MemoryStore> {
    anyhow::bail!("the platform credential store is only available on macOS")
}
