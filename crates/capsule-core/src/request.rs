//! Tagged request/response boundary.
//!
//! Front ends send one [`Request`] per operation. Raw strings are parsed into
//! typed values here, before anything reaches the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capsule::{CapsuleId, CapsuleReceipt, CapsuleSummary, UnlockDelay};
use crate::error::{CapsuleError, Result};
use crate::guardians::Ack;
use crate::identity::{Attestation, BtcAddress, IdentityStatus, ProofPurpose, SessionToken};
use crate::service::CapsuleService;
use crate::storage::StorageEngine;
use crate::unlock::QuorumStatus;
use crate::VERSION;

/// Capsule a guardian challenge is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianTarget {
    pub owner: String,
    pub capsule: u32,
}

/// A guardian proof as it arrives over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationInput {
    pub guardian: String,
    pub challenge_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    IssueChallenge {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guardian_for: Option<GuardianTarget>,
    },
    VerifyOwnership {
        address: String,
        challenge_id: String,
        signature: String,
    },
    EndSession,
    IdentityStatus,
    CreateCapsule {
        message: String,
        unlock_delay: String,
    },
    ListCapsules,
    UnlockCapsule {
        capsule: u32,
    },
    AddGuardian {
        guardian: String,
    },
    RemoveGuardian {
        guardian: String,
    },
    ListGuardians,
    GuardianUnlock {
        owner: String,
        capsule: u32,
        attestations: Vec<AttestationInput>,
    },
    QuorumStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
    },
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Challenge {
        challenge_id: Uuid,
        message: String,
        expires_at: DateTime<Utc>,
    },
    Verified {
        session: SessionToken,
        address: BtcAddress,
        expires_at: DateTime<Utc>,
    },
    SessionEnded {
        ended: bool,
    },
    Identity {
        identity: IdentityStatus,
    },
    Created(CapsuleReceipt),
    Capsules {
        capsules: Vec<CapsuleSummary>,
    },
    Unlocked {
        capsule: CapsuleId,
        message: String,
    },
    Ack(Ack),
    Guardians {
        guardians: Vec<BtcAddress>,
    },
    Quorum(QuorumStatus),
    Version {
        version: String,
    },
    Error {
        kind: String,
        message: String,
        retryable: bool,
    },
}

impl Response {
    pub fn from_error(err: &CapsuleError) -> Self {
        Response::Error {
            kind: err.class().as_str().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| CapsuleError::InvalidInput(format!("Invalid {}: {}", field, raw)))
}

impl<S: StorageEngine> CapsuleService<S> {
    /// Dispatch one request on behalf of the holder of `session`.
    ///
    /// `verify_ownership` returns the new session token; the caller passes it
    /// back on later requests.
    pub fn handle(&self, session: Option<&SessionToken>, request: Request) -> Result<Response> {
        let require_session = || session.ok_or(CapsuleError::NotAuthenticated);

        match request {
            Request::IssueChallenge {
                address,
                guardian_for,
            } => {
                let purpose = match guardian_for {
                    None => ProofPurpose::Session,
                    Some(target) => ProofPurpose::EmergencyUnlock {
                        owner: self.parse_address(&target.owner)?,
                        capsule: CapsuleId::new(target.capsule),
                    },
                };
                let challenge = self.issue_challenge(&address, purpose)?;
                Ok(Response::Challenge {
                    challenge_id: challenge.id,
                    message: challenge.message(),
                    expires_at: challenge.expires_at,
                })
            }
            Request::VerifyOwnership {
                address,
                challenge_id,
                signature,
            } => {
                let challenge_id = parse_uuid(&challenge_id, "challenge id")?;
                let identity = self.verify_ownership(&address, &challenge_id, &signature)?;
                Ok(Response::Verified {
                    session: *identity.token(),
                    address: identity.address().clone(),
                    expires_at: identity.expires_at(),
                })
            }
            Request::EndSession => Ok(Response::SessionEnded {
                ended: self.end_session(require_session()?),
            }),
            Request::IdentityStatus => Ok(Response::Identity {
                identity: self.identity_status(require_session().ok()),
            }),
            Request::CreateCapsule {
                message,
                unlock_delay,
            } => {
                let token = require_session()?;
                let delay: UnlockDelay = unlock_delay.parse()?;
                let receipt = self.create_capsule(token, message.as_bytes(), delay)?;
                Ok(Response::Created(receipt))
            }
            Request::ListCapsules => Ok(Response::Capsules {
                capsules: self.list_capsules(require_session()?)?,
            }),
            Request::UnlockCapsule { capsule } => {
                let id = CapsuleId::new(capsule);
                let plaintext = self.unlock_capsule(require_session()?, id)?;
                Ok(Response::Unlocked {
                    capsule: id,
                    message: String::from_utf8_lossy(&plaintext).into_owned(),
                })
            }
            Request::AddGuardian { guardian } => {
                Ok(Response::Ack(self.add_guardian(require_session()?, &guardian)?))
            }
            Request::RemoveGuardian { guardian } => {
                Ok(Response::Ack(self.remove_guardian(require_session()?, &guardian)?))
            }
            Request::ListGuardians => Ok(Response::Guardians {
                guardians: self.list_guardians(require_session()?)?,
            }),
            Request::GuardianUnlock {
                owner,
                capsule,
                attestations,
            } => {
                let token = require_session()?;
                let attestations = attestations
                    .iter()
                    .map(|input| self.parse_attestation(input))
                    .collect::<Result<Vec<_>>>()?;
                let id = CapsuleId::new(capsule);
                let plaintext = self.guardian_unlock(token, &owner, id, &attestations)?;
                Ok(Response::Unlocked {
                    capsule: id,
                    message: String::from_utf8_lossy(&plaintext).into_owned(),
                })
            }
            Request::QuorumStatus { owner } => Ok(Response::Quorum(
                self.quorum_status(require_session()?, owner.as_deref())?,
            )),
            Request::Version => Ok(Response::Version {
                version: VERSION.to_string(),
            }),
        }
    }

    fn parse_attestation(&self, input: &AttestationInput) -> Result<Attestation> {
        let guardian = self.parse_address(&input.guardian).map_err(|_| {
            CapsuleError::InvalidInput(format!("Invalid guardian address: {}", input.guardian))
        })?;
        Ok(Attestation {
            guardian,
            challenge_id: parse_uuid(&input.challenge_id, "challenge id")?,
            signature: input.signature.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainNetwork, VaultConfig};
    use crate::crypto::MasterKey;
    use crate::storage::MemoryStorage;
    use crate::test_support::TestWallet;

    fn service() -> CapsuleService<MemoryStorage> {
        CapsuleService::new(
            MemoryStorage::new(),
            MasterKey::from_bytes([3u8; 32]),
            VaultConfig::default(),
        )
    }

    fn request(json: &str) -> Request {
        serde_json::from_str(json).unwrap()
    }

    fn login(service: &CapsuleService<MemoryStorage>, wallet: &TestWallet) -> SessionToken {
        let address = wallet.address(ChainNetwork::Bitcoin).to_string();
        let challenge = service
            .handle(
                None,
                Request::IssueChallenge {
                    address: address.clone(),
                    guardian_for: None,
                },
            )
            .unwrap();
        let (challenge_id, message) = match challenge {
            Response::Challenge {
                challenge_id,
                message,
                ..
            } => (challenge_id, message),
            other => panic!("unexpected response {:?}", other),
        };
        match service
            .handle(
                None,
                Request::VerifyOwnership {
                    address,
                    challenge_id: challenge_id.to_string(),
                    signature: wallet.sign(&message),
                },
            )
            .unwrap()
        {
            Response::Verified { session, .. } => session,
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_request_wire_format() {
        let parsed = request(r#"{"op":"create_capsule","message":"hi","unlock_delay":"7d"}"#);
        assert_eq!(
            parsed,
            Request::CreateCapsule {
                message: "hi".to_string(),
                unlock_delay: "7d".to_string(),
            }
        );
        assert_eq!(request(r#"{"op":"quorum_status"}"#), Request::QuorumStatus { owner: None });
        assert!(serde_json::from_str::<Request>(r#"{"op":"format_disk"}"#).is_err());
    }

    #[test]
    fn test_create_without_session_stores_nothing() {
        let service = service();
        let result = service.handle(
            None,
            request(r#"{"op":"create_capsule","message":"hi","unlock_delay":"1d"}"#),
        );
        assert!(matches!(result, Err(CapsuleError::NotAuthenticated)));
        assert_eq!(
            service.handle(None, Request::IdentityStatus).unwrap(),
            Response::Identity {
                identity: IdentityStatus::Unverified
            }
        );
    }

    #[test]
    fn test_session_threads_through_requests() {
        let service = service();
        let token = login(&service, &TestWallet::new(1));

        let created = service
            .handle(
                Some(&token),
                request(r#"{"op":"create_capsule","message":"hi","unlock_delay":"1d"}"#),
            )
            .unwrap();
        assert!(matches!(created, Response::Created(ref r) if r.index == CapsuleId::new(0)));

        match service.handle(Some(&token), Request::ListCapsules).unwrap() {
            Response::Capsules { capsules } => assert_eq!(capsules.len(), 1),
            other => panic!("unexpected response {:?}", other),
        }

        let early = service.handle(Some(&token), Request::UnlockCapsule { capsule: 0 });
        let err = early.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            Response::from_error(&err),
            Response::Error { ref kind, retryable: true, .. } if kind == "policy_pending"
        ));
    }

    #[test]
    fn test_bad_fields_are_input_errors() {
        let service = service();
        let token = login(&service, &TestWallet::new(1));

        let bad_delay = service.handle(
            Some(&token),
            request(r#"{"op":"create_capsule","message":"hi","unlock_delay":"soon"}"#),
        );
        assert!(matches!(bad_delay, Err(CapsuleError::InvalidInput(_))));

        let bad_challenge = service.handle(
            None,
            Request::VerifyOwnership {
                address: TestWallet::new(1).address(ChainNetwork::Bitcoin).to_string(),
                challenge_id: "nope".to_string(),
                signature: "sig".to_string(),
            },
        );
        assert!(matches!(bad_challenge, Err(CapsuleError::InvalidInput(_))));
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_value(Response::Version {
            version: VERSION.to_string(),
        })
        .unwrap();
        assert_eq!(json["result"], "version");
        assert_eq!(json["version"], VERSION);
    }
}
