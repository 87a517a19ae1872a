//! The removal sequence: trust settings first, then the private key,
//! then the certificate record itself.

use console::style;

use crate::store::{StoreError, TrustDomain, TrustStore};

/// What a removal run amounted to. The caller maps this to the process
/// exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No certificate carries the label; there was nothing to delete.
    NotFound,
    /// Certificate, and key and trust settings where present, removed.
    Removed,
    /// Certificate found but a destructive step failed.
    Failed,
}

/// Removes the certificate filed under `label` along with its trust
/// settings and private key.
///
/// A label is not unique in the keychain; when several certificates
/// share one, this operates on whichever the store returns first. Going
/// further would mean querying all matches and adding logic to tell
/// them apart.
pub fn remove_certificate<S: TrustStore>(store: &S, label: &str) -> Outcome {
    let cert = match store.find_certificate(label) {
        Ok(cert) => cert,
        Err(err) => {
            println!("{}", lookup_failure_message(label, err));
            return Outcome::NotFound;
        }
    };

    delete_trust_settings(store, &cert);
    delete_key_and_certificate(store, &cert)
    // cert dropped here, the handle's one release on every path
}

/// Strips override trust settings in every domain that has them.
///
/// Best-effort by policy: a domain that cannot be cleaned is reported
/// and the loop moves on. The certificate and key removal that follow
/// matter more than this metadata.
fn delete_trust_settings<S: TrustStore>(store: &S, cert: &S::Certificate) {
    for domain in TrustDomain::ALL {
        if !store.trust_settings_exist(cert, domain) {
            continue;
        }

        match store.remove_trust_settings(cert, domain) {
            Ok(()) => println!("Deleted certificate's trust settings ({})...", domain),
            Err(err) => println!(
                "Certificate's trust settings found ({}) but could not be deleted ({}). Continuing.",
                domain, err
            ),
        }
    }
}

fn delete_key_and_certificate<S: TrustStore>(store: &S, cert: &S::Certificate) -> Outcome {
    match store.identity_for_certificate(cert) {
        // No identity means no private key was imported alongside the
        // certificate; skip straight to deleting the certificate.
        Err(StoreError::NotFound) => {}
        Err(err) => {
            println!(
                "{} Could not get identity for certificate ({}). Aborting.",
                style("FAILURE:").red(),
                err
            );
            return Outcome::Failed;
        }
        Ok(identity) => {
            // The key has to go before the certificate: the keychain
            // invalidates the key reference once its owning certificate
            // record is gone.
            let key = store.identity_private_key(&identity).ok();
            drop(identity);

            if let Some(key) = key {
                if let Err(err) = store.delete_key(key) {
                    println!(
                        "{} Failed deleting private key from certificate ({}). Aborting.",
                        style("FAILURE:").red(),
                        err
                    );
                    return Outcome::Failed;
                }
                println!("Deleted certificate's private key...");
            }
        }
    }

    match store.delete_certificate(cert) {
        Ok(()) => {
            println!("Deleted certificate from keychain successfully...");
            Outcome::Removed
        }
        Err(err) => {
            println!("{}", certificate_delete_failure_message(err));
            Outcome::Failed
        }
    }
}

fn lookup_failure_message(label: &str, err: StoreError) -> String {
    match err {
        StoreError::NotFound => {
            format!("Certificate '{}' not found in keychain. Aborting.", label)
        }
        err => format!(
            "Could not find certificate '{}' in the keychain ({}). Aborting.",
            label, err
        ),
    }
}

fn certificate_delete_failure_message(err: StoreError) -> String {
    match err {
        StoreError::PermissionDenied => format!(
            "{} Failed deleting certificate - no permissions, run this tool as root ('sudo'). Aborting.",
            style("FAILURE:").red()
        ),
        err => format!(
            "{} Failed deleting certificate ({}). Aborting.",
            style("FAILURE:").red(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const LABEL: &str = "TestCert";

    #[test]
    fn unknown_label_is_not_an_error() {
        let store = MemoryStore::new();

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::NotFound);
        assert!(store.operations().is_empty());
        // no handle was ever resolved, so there is nothing to release
        assert_eq!(store.certificate_releases(), 0);
    }

    #[test]
    fn lookup_error_treated_as_absent() {
        let store = MemoryStore::new();
        store.insert(LABEL, false, &[]);
        store.fail_find(-25293);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::NotFound);
        assert!(store.operations().is_empty());
        assert!(store.contains(LABEL));
    }

    #[test]
    fn bare_certificate_is_deleted() {
        let store = MemoryStore::new();
        store.insert(LABEL, false, &[]);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Removed);
        assert!(!store.contains(LABEL));
        // all three domains are probed even though none has settings
        assert_eq!(
            store.probes(),
            vec![
                "trust_settings_exist Domain System",
                "trust_settings_exist Domain Admin",
                "trust_settings_exist Domain User",
            ]
        );
        // no trust settings and no key, so the only mutation is the
        // certificate deletion itself
        assert_eq!(store.operations(), vec!["delete_certificate"]);
        assert_eq!(store.certificate_releases(), 1);
    }

    #[test]
    fn trust_settings_removed_in_every_domain() {
        let store = MemoryStore::new();
        store.insert(LABEL, false, &TrustDomain::ALL);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Removed);
        assert_eq!(
            store.operations(),
            vec![
                "remove_trust_settings Domain System",
                "remove_trust_settings Domain Admin",
                "remove_trust_settings Domain User",
                "delete_certificate",
            ]
        );
    }

    #[test]
    fn failing_domain_does_not_stop_the_others() {
        let store = MemoryStore::new();
        store.insert(LABEL, false, &TrustDomain::ALL);
        store.fail_remove_settings(TrustDomain::System, -61);

        let outcome = remove_certificate(&store, LABEL);

        // settings failures never fail the run
        assert_eq!(outcome, Outcome::Removed);
        assert_eq!(
            store.operations(),
            vec![
                "remove_trust_settings Domain System",
                "remove_trust_settings Domain Admin",
                "remove_trust_settings Domain User",
                "delete_certificate",
            ]
        );
    }

    #[test]
    fn private_key_deleted_before_certificate() {
        let store = MemoryStore::new();
        store.insert(LABEL, true, &[]);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Removed);
        assert_eq!(store.operations(), vec!["delete_key", "delete_certificate"]);
    }

    #[test]
    fn key_deletion_failure_leaves_certificate_intact() {
        let store = MemoryStore::new();
        store.insert(LABEL, true, &[]);
        store.fail_delete_key(-67671);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Failed);
        assert!(store.contains(LABEL));
        assert!(store.has_private_key(LABEL));
        assert_eq!(store.operations(), vec!["delete_key"]);
        assert_eq!(store.certificate_releases(), 1);
    }

    #[test]
    fn identity_error_aborts_before_any_deletion() {
        let store = MemoryStore::new();
        store.insert(LABEL, true, &[]);
        store.fail_identity(-67050);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Failed);
        assert!(store.contains(LABEL));
        assert!(store.operations().is_empty());
    }

    #[test]
    fn unreadable_key_is_skipped_not_fatal() {
        let store = MemoryStore::new();
        store.insert(LABEL, true, &[]);
        store.fail_copy_key(-25308);

        let outcome = remove_certificate(&store, LABEL);

        // the key reference could not be obtained, so only the
        // certificate is deleted
        assert_eq!(outcome, Outcome::Removed);
        assert_eq!(store.operations(), vec!["delete_certificate"]);
    }

    #[test]
    fn permission_denied_is_fatal() {
        let store = MemoryStore::new();
        store.insert(LABEL, false, &[]);
        store.deny_delete_certificate();

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Failed);
        assert!(store.contains(LABEL));
        assert_eq!(store.certificate_releases(), 1);
    }

    #[test]
    fn lookup_messages_name_the_label_and_code() {
        let msg = lookup_failure_message(LABEL, StoreError::NotFound);
        assert!(msg.contains("not found"));
        assert!(msg.contains(LABEL));

        let msg = lookup_failure_message(LABEL, StoreError::Status(-25293));
        assert!(msg.contains(LABEL));
        assert!(msg.contains("-25293"));
    }

    #[test]
    fn permission_denied_message_is_distinct() {
        let denied = certificate_delete_failure_message(StoreError::PermissionDenied);
        let generic = certificate_delete_failure_message(StoreError::Status(-67674));

        assert!(denied.contains("run this tool as root ('sudo')"));
        assert!(!generic.contains("sudo"));
        assert!(generic.contains("-67674"));
        assert_ne!(denied, generic);
    }

    #[test]
    fn generic_deletion_failure_is_fatal() {
        let store = MemoryStore::new();
        store.insert(LABEL, true, &TrustDomain::ALL);
        store.fail_delete_certificate(-67674);

        let outcome = remove_certificate(&store, LABEL);

        assert_eq!(outcome, Outcome::Failed);
        assert!(store.contains(LABEL));
        // key and settings were still removed first, in order
        assert_eq!(
            store.operations(),
            vec![
                "remove_trust_settings Domain System",
                "remove_trust_settings Domain Admin",
                "remove_trust_settings Domain User",
                "delete_key",
                "delete_certificate",
            ]
        );
        assert_eq!(store.certificate_releases(), 1);
    }
}
