//! macOS Security.framework backend.
//!
//! The high-level `security-framework` API covers lookup, identities
//! and keys; trust-settings removal and keychain-item deletion have no
//! wrapper yet and go through `security-framework-sys` directly. Every
//! framework reference is wrapped in an owned type so releasing it is
//! the drop, never a manual call.

use std::os::raw::c_void;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{OSStatus, TCFType};
use security_framework::certificate::SecCertificate;
use security_framework::identity::SecIdentity;
use security_framework::item::{ItemClass, ItemSearchOptions, Reference, SearchResult};
use security_framework::key::SecKey;
use security_framework_sys::base::{
    errSecItemNotFound, errSecSuccess, SecCertificateRef, SecKeychainItemRef,
};
use security_framework_sys::identity::SecIdentityCreateWithCertificate;
use security_framework_sys::keychain_item::SecKeychainItemDelete;
use security_framework_sys::trust_settings::{
    kSecTrustSettingsDomainAdmin, kSecTrustSettingsDomainSystem, kSecTrustSettingsDomainUser,
    SecTrustSettingsCopyTrustSettings, SecTrustSettingsDomain,
};

use super::{StoreError, TrustDomain, TrustStore};

extern "C" {
    // not wrapped by security-framework-sys; the sys crate already
    // links Security.framework
    fn SecTrustSettingsRemoveTrustSettings(
        cert_ref: SecCertificateRef,
        domain: SecTrustSettingsDomain,
    ) -> OSStatus;
}

// Not exposed by security-framework-sys; "write permissions error" in
// SecBase.h.
const ERR_SEC_WR_PERM: i32 = -61;

// errSecInvalidItemRef, for search results that are not certificate
// references.
const ERR_SEC_INVALID_ITEM_REF: i32 = -25304;

/// The keychains of the running user, reached through the default
/// search list.
#[derive(Debug, Default)]
pub struct KeychainStore;

impl KeychainStore {
    pub fn new() -> Self {
        KeychainStore
    }
}

fn status_error(status: i32) -> StoreError {
    match status {
        errSecItemNotFound => StoreError::NotFound,
        ERR_SEC_WR_PERM => StoreError::PermissionDenied,
        code => StoreError::Status(code),
    }
}

fn domain_key(domain: TrustDomain) -> SecTrustSettingsDomain {
    match domain {
        TrustDomain::System => kSecTrustSettingsDomainSystem,
        TrustDomain::Admin => kSecTrustSettingsDomainAdmin,
        TrustDomain::User => kSecTrustSettingsDomainUser,
    }
}

fn delete_item(item: SecKeychainItemRef) -> Result<(), StoreError> {
    let status = unsafe { SecKeychainItemDelete(item) };
    if status == errSecSuccess {
        Ok(())
    } else {
        Err(status_error(status))
    }
}

impl TrustStore for KeychainStore {
    type Certificate = SecCertificate;
    type Identity = SecIdentity;
    type Key = SecKey;

    fn find_certificate(&self, label: &str) -> Result<SecCertificate, StoreError> {
        let results = ItemSearchOptions::new()
            .class(ItemClass::certificate())
            .label(label)
            .load_refs(true)
            .limit(1)
            .search()
            .map_err(|err| status_error(err.code()))?;

        for result in results {
            if let SearchResult::Ref(Reference::Certificate(cert)) = result {
                return Ok(cert);
            }
        }

        // the search matched something that is not a certificate ref;
        // report a diagnostic code rather than absence
        Err(StoreError::Status(ERR_SEC_INVALID_ITEM_REF))
    }

    fn trust_settings_exist(&self, cert: &SecCertificate, domain: TrustDomain) -> bool {
        let mut settings: CFArrayRef = std::ptr::null();
        let status = unsafe {
            SecTrustSettingsCopyTrustSettings(
                cert.as_concrete_TypeRef(),
                domain_key(domain),
                &mut settings,
            )
        };

        if !settings.is_null() {
            // take ownership so the array is released right here
            let _settings: CFArray<*const c_void> =
                unsafe { CFArray::wrap_under_create_rule(settings) };
        }

        status != errSecItemNotFound
    }

    fn remove_trust_settings(
        &self,
        cert: &SecCertificate,
        domain: TrustDomain,
    ) -> Result<(), StoreError> {
        let status = unsafe {
            SecTrustSettingsRemoveTrustSettings(cert.as_concrete_TypeRef(), domain_key(domain))
        };
        if status == errSecSuccess {
            Ok(())
        } else {
            Err(status_error(status))
        }
    }

    fn identity_for_certificate(&self, cert: &SecCertificate) -> Result<SecIdentity, StoreError> {
        let mut identity = std::ptr::null_mut();
        // null keychain argument searches the default keychain list
        let status = unsafe {
            SecIdentityCreateWithCertificate(
                std::ptr::null(),
                cert.as_concrete_TypeRef(),
                &mut identity,
            )
        };
        if status != errSecSuccess {
            return Err(status_error(status));
        }
        Ok(unsafe { SecIdentity::wrap_under_create_rule(identity) })
    }

    fn identity_private_key(&self, identity: &SecIdentity) -> Result<SecKey, StoreError> {
        identity
            .private_key()
            .map_err(|err| status_error(err.code()))
    }

    fn delete_key(&self, key: SecKey) -> Result<(), StoreError> {
        delete_item(key.as_concrete_TypeRef() as SecKeychainItemRef)
    }

    fn delete_certificate(&self, cert: &SecCertificate) -> Result<(), StoreError> {
        delete_item(cert.as_concrete_TypeRef() as SecKeychainItemRef)
    }
}
