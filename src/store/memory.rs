//! In-memory credential store.
//!
//! Stands in for the keychain where mutating the real one is off the
//! table. Handles count their drops and every mutating call is logged,
//! so callers can assert on ordering and release discipline.

use std::cell::RefCell;
use std::rc::Rc;

use super::{StoreError, TrustDomain, TrustStore};

#[derive(Debug)]
struct CertRecord {
    label: String,
    has_private_key: bool,
    trust_settings: Vec<TrustDomain>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Faults {
    find: Option<i32>,
    remove_settings: Vec<(TrustDomain, i32)>,
    identity: Option<i32>,
    copy_key: Option<i32>,
    delete_key: Option<i32>,
    delete_certificate: Option<StoreError>,
}

#[derive(Debug, Default)]
struct State {
    certificates: Vec<CertRecord>,
    faults: Faults,
    operations: Vec<String>,
    probes: Vec<String>,
    certificate_releases: u32,
}

impl State {
    fn record(&mut self, label: &str) -> Option<&mut CertRecord> {
        self.certificates
            .iter_mut()
            .find(|record| record.label == label && !record.deleted)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a certificate under `label`, optionally with a private key
    /// and trust-setting overrides in the given domains.
    pub fn insert(&self, label: &str, with_key: bool, domains: &[TrustDomain]) {
        self.state.borrow_mut().certificates.push(CertRecord {
            label: label.to_string(),
            has_private_key: with_key,
            trust_settings: domains.to_vec(),
            deleted: false,
        });
    }

    pub fn fail_find(&self, status: i32) {
        self.state.borrow_mut().faults.find = Some(status);
    }

    pub fn fail_remove_settings(&self, domain: TrustDomain, status: i32) {
        self.state
            .borrow_mut()
            .faults
            .remove_settings
            .push((domain, status));
    }

    pub fn fail_identity(&self, status: i32) {
        self.state.borrow_mut().faults.identity = Some(status);
    }

    pub fn fail_copy_key(&self, status: i32) {
        self.state.borrow_mut().faults.copy_key = Some(status);
    }

    pub fn fail_delete_key(&self, status: i32) {
        self.state.borrow_mut().faults.delete_key = Some(status);
    }

    pub fn fail_delete_certificate(&self, status: i32) {
        self.state.borrow_mut().faults.delete_certificate = Some(StoreError::Status(status));
    }

    /// Makes certificate deletion fail the way an unprivileged run
    /// against a system keychain does.
    pub fn deny_delete_certificate(&self) {
        self.state.borrow_mut().faults.delete_certificate = Some(StoreError::PermissionDenied);
    }

    pub fn contains(&self, label: &str) -> bool {
        self.state.borrow_mut().record(label).is_some()
    }

    pub fn has_private_key(&self, label: &str) -> bool {
        self.state
            .borrow_mut()
            .record(label)
            .map(|record| record.has_private_key)
            .unwrap_or(false)
    }

    pub fn trust_settings(&self, label: &str) -> Vec<TrustDomain> {
        self.state
            .borrow_mut()
            .record(label)
            .map(|record| record.trust_settings.clone())
            .unwrap_or_default()
    }

    /// Mutating calls in the order the store received them.
    pub fn operations(&self) -> Vec<String> {
        self.state.borrow().operations.clone()
    }

    /// Read-only existence queries, in order.
    pub fn probes(&self) -> Vec<String> {
        self.state.borrow().probes.clone()
    }

    /// How many certificate handles have been released so far.
    pub fn certificate_releases(&self) -> u32 {
        self.state.borrow().certificate_releases
    }
}

/// Certificate handle; notifies the store when it is released.
#[derive(Debug)]
pub struct MemCertificate {
    label: String,
    state: Rc<RefCell<State>>,
}

impl Drop for MemCertificate {
    fn drop(&mut self) {
        self.state.borrow_mut().certificate_releases += 1;
    }
}

#[derive(Debug)]
pub struct MemIdentity {
    label: String,
}

#[derive(Debug)]
pub struct MemKey {
    label: String,
}

impl TrustStore for MemoryStore {
    type Certificate = MemCertificate;
    type Identity = MemIdentity;
    type Key = MemKey;

    fn find_certificate(&self, label: &str) -> Result<MemCertificate, StoreError> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.faults.find {
            return Err(StoreError::Status(status));
        }
        if state.record(label).is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(MemCertificate {
            label: label.to_string(),
            state: Rc::clone(&self.state),
        })
    }

    fn trust_settings_exist(&self, cert: &MemCertificate, domain: TrustDomain) -> bool {
        let mut state = self.state.borrow_mut();
        state
            .probes
            .push(format!("trust_settings_exist {}", domain));
        state
            .record(&cert.label)
            .map(|record| record.trust_settings.contains(&domain))
            .unwrap_or(false)
    }

    fn remove_trust_settings(
        &self,
        cert: &MemCertificate,
        domain: TrustDomain,
    ) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state
            .operations
            .push(format!("remove_trust_settings {}", domain));
        if let Some(&(_, status)) = state
            .faults
            .remove_settings
            .iter()
            .find(|(failing, _)| *failing == domain)
        {
            return Err(StoreError::Status(status));
        }
        if let Some(record) = state.record(&cert.label) {
            record.trust_settings.retain(|d| *d != domain);
        }
        Ok(())
    }

    fn identity_for_certificate(&self, cert: &MemCertificate) -> Result<MemIdentity, StoreError> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.faults.identity {
            return Err(StoreError::Status(status));
        }
        match state.record(&cert.label) {
            Some(record) if record.has_private_key => Ok(MemIdentity {
                label: cert.label.clone(),
            }),
            _ => Err(StoreError::NotFound),
        }
    }

    fn identity_private_key(&self, identity: &MemIdentity) -> Result<MemKey, StoreError> {
        let state = self.state.borrow();
        if let Some(status) = state.faults.copy_key {
            return Err(StoreError::Status(status));
        }
        Ok(MemKey {
            label: identity.label.clone(),
        })
    }

    fn delete_key(&self, key: MemKey) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.operations.push("delete_key".to_string());
        if let Some(status) = state.faults.delete_key {
            return Err(StoreError::Status(status));
        }
        if let Some(record) = state.record(&key.label) {
            record.has_private_key = false;
        }
        Ok(())
    }

    fn delete_certificate(&self, cert: &MemCertificate) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.operations.push("delete_certificate".to_string());
        if let Some(err) = state.faults.delete_certificate {
            return Err(err);
        }
        match state.record(&cert.label) {
            Some(record) => {
                record.deleted = true;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find() {
        let store = MemoryStore::new();
        store.insert("TestCert", false, &[]);

        assert!(store.find_certificate("TestCert").is_ok());
        assert_eq!(
            store.find_certificate("Other").unwrap_err(),
            StoreError::NotFound
        );
    }

    #[test]
    fn handle_drop_counts_as_release() {
        let store = MemoryStore::new();
        store.insert("TestCert", false, &[]);

        let cert = store.find_certificate("TestCert").unwrap();
        assert_eq!(store.certificate_releases(), 0);
        drop(cert);
        assert_eq!(store.certificate_releases(), 1);
    }

    #[test]
    fn removing_settings_clears_only_that_domain() {
        let store = MemoryStore::new();
        store.insert("TestCert", false, &[TrustDomain::System, TrustDomain::User]);

        let cert = store.find_certificate("TestCert").unwrap();
        store
            .remove_trust_settings(&cert, TrustDomain::System)
            .unwrap();
        assert_eq!(store.trust_settings("TestCert"), vec![TrustDomain::User]);

        // an injected failure leaves the domain's settings in place
        store.fail_remove_settings(TrustDomain::User, -61);
        assert!(store.remove_trust_settings(&cert, TrustDomain::User).is_err());
        assert_eq!(store.trust_settings("TestCert"), vec![TrustDomain::User]);
    }

    #[test]
    fn deleted_certificate_is_gone() {
        let store = MemoryStore::new();
        store.insert("TestCert", false, &[TrustDomain::User]);

        let cert = store.find_certificate("TestCert").unwrap();
        store.delete_certificate(&cert).unwrap();

        assert!(!store.contains("TestCert"));
        assert_eq!(
            store.find_certificate("TestCert").unwrap_err(),
            StoreError::NotFound
        );
    }
}
