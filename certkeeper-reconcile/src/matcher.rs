//! Locate the tracked request occupying a desired certificate slot.
//!
//! The slot is identified by storage location only. Subject, authority and
//! principal can legitimately differ between the desired and tracked request
//! (a resubmission may retarget the authority), so they never take part.

use certkeeper_core::{DesiredCertRequest, StorageLocation, TrackedRequest};

use crate::error::ReconcileError;

/// The tracked request for `desired`'s storage location, if any.
///
/// More than one hit means the daemon's state is inconsistent and yields
/// [`ReconcileError::AmbiguousMatch`].
pub fn find_match<'a>(
    desired: &DesiredCertRequest,
    existing: &'a [TrackedRequest],
) -> Result<Option<&'a TrackedRequest>, ReconcileError> {
    let hits: Vec<&TrackedRequest> = existing
        .iter()
        .filter(|tracked| same_slot(desired.storage(), &tracked.storage))
        .collect();

    match hits.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(ReconcileError::AmbiguousMatch {
            location: desired.storage().clone(),
            request_ids: many.iter().map(|t| t.id.clone()).collect(),
        }),
    }
}

/// `desired` is expected to be normalized already; `tracked` comes straight
/// from the daemon and is normalized here.
fn same_slot(desired: &StorageLocation, tracked: &StorageLocation) -> bool {
    match (desired, tracked.normalized()) {
        (
            StorageLocation::Files { key, cert },
            StorageLocation::Files {
                key: tracked_key,
                cert: tracked_cert,
            },
        ) => *key == tracked_key && *cert == tracked_cert,
        (
            StorageLocation::Nss {
                database,
                nickname,
                token,
            },
            StorageLocation::Nss {
                database: tracked_db,
                nickname: tracked_nickname,
                token: tracked_token,
            },
        ) => {
            *database == tracked_db
                && *nickname == tracked_nickname
                && (token.is_none() || *token == tracked_token)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certkeeper_core::{CertRequestSpec, RequestId, RequestStatus};

    fn desired(spec: CertRequestSpec) -> DesiredCertRequest {
        DesiredCertRequest::from_spec(spec, || Ok("host".to_string())).expect("valid spec")
    }

    fn files(key: &str, cert: &str, subject: &str) -> DesiredCertRequest {
        desired(CertRequestSpec {
            key: Some(key.into()),
            cert: Some(cert.into()),
            subject: Some(subject.into()),
            ..Default::default()
        })
    }

    fn tracked(id: &str, storage: StorageLocation) -> TrackedRequest {
        TrackedRequest {
            id: RequestId::from(id),
            storage,
            authority: "local".into(),
            subject: Some("CN=other".into()),
            principal: None,
            status: RequestStatus::Monitoring,
            last_error: None,
            auto_renew: true,
            expires_at: None,
        }
    }

    fn file_slot(key: &str, cert: &str) -> StorageLocation {
        StorageLocation::Files {
            key: key.into(),
            cert: cert.into(),
        }
    }

    fn nss_slot(db: &str, nickname: &str, token: Option<&str>) -> StorageLocation {
        StorageLocation::Nss {
            database: db.into(),
            nickname: nickname.into(),
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn subject_is_not_part_of_the_match_key() {
        let existing = vec![tracked("1", file_slot("/k.pem", "/c.pem"))];
        let a = files("/k.pem", "/c.pem", "CN=a");
        let b = files("/k.pem", "/c.pem", "CN=b");
        assert_eq!(find_match(&a, &existing).unwrap().unwrap().id.0, "1");
        assert_eq!(find_match(&b, &existing).unwrap().unwrap().id.0, "1");
    }

    #[test]
    fn tracked_paths_are_normalized_before_comparison() {
        let existing = vec![tracked("1", file_slot("/etc/pki/./k.pem", "/etc//pki/c.pem"))];
        let want = files("/etc/pki/k.pem", "/etc/pki/c.pem", "CN=x");
        assert!(find_match(&want, &existing).unwrap().is_some());
    }

    #[test]
    fn different_cert_path_does_not_match() {
        let existing = vec![tracked("1", file_slot("/k.pem", "/other.pem"))];
        let want = files("/k.pem", "/c.pem", "CN=x");
        assert!(find_match(&want, &existing).unwrap().is_none());
    }

    #[test]
    fn nss_token_only_matters_when_requested() {
        let existing = vec![tracked("1", nss_slot("/etc/pki/nssdb", "Server-Cert", Some("hsm")))];

        let any_token = desired(CertRequestSpec {
            nss_db: Some("/etc/pki/nssdb".into()),
            nss_nickname: Some("Server-Cert".into()),
            ..Default::default()
        });
        assert!(find_match(&any_token, &existing).unwrap().is_some());

        let other_token = desired(CertRequestSpec {
            nss_token: Some("internal".into()),
            ..any_token_spec()
        });
        assert!(find_match(&other_token, &existing).unwrap().is_none());
    }

    fn any_token_spec() -> CertRequestSpec {
        CertRequestSpec {
            nss_db: Some("/etc/pki/nssdb".into()),
            nss_nickname: Some("Server-Cert".into()),
            ..Default::default()
        }
    }

    #[test]
    fn file_request_never_matches_nss_slot() {
        let existing = vec![tracked("1", nss_slot("/k.pem", "c", None))];
        let want = files("/k.pem", "/c.pem", "CN=x");
        assert!(find_match(&want, &existing).unwrap().is_none());
    }

    #[test]
    fn shared_location_is_ambiguous() {
        let existing = vec![
            tracked("1", file_slot("/k.pem", "/c.pem")),
            tracked("2", file_slot("/k.pem", "/c.pem")),
            tracked("3", file_slot("/x.pem", "/y.pem")),
        ];
        let err = find_match(&files("/k.pem", "/c.pem", "CN=x"), &existing).unwrap_err();
        match err {
            ReconcileError::AmbiguousMatch { request_ids, .. } => {
                assert_eq!(request_ids, vec![RequestId::from("1"), RequestId::from("2")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
