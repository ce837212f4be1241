// trust/manager.rs - Identity Manager and Trust Store

//! The single owner of the local identity and every trust record.
//!
//! All mutations go through [`IdentityManager`]; shared use wraps it in a
//! [`SharedIdentityManager`] so that mutations are serialized. State changes
//! are applied in memory first and then saved best-effort: a failed save is
//! reported as [`PersistStatus::Failed`] and never rolls the change back.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::bundle::{self, PEERS_EXPORT_MARKER, PEERS_FIELD};
use super::error::TrustError;
use super::identity::{verify_with_key, Identity, PeerAnnouncement, Profile, ProfilePatch, PublicIdentity};
use super::keys;
use super::now_millis;
use super::record::TrustRecord;
use super::signature::{Endorsement, Introduction, TrustLevel, VerificationMethod};
use super::web::{ChainPolicy, ChainVerdict, TrustChain, TrustChainVerifier};
use crate::observability::{
    record_peer_added, record_peer_removed, record_persist_failure, record_signature_verified,
    record_trust_change, set_known_peers,
};
use crate::persistence::{BoundedStorage, Storage, StorageError, IDENTITY_KEY, PEERS_KEY};

/// Handle for sharing one manager across tasks
pub type SharedIdentityManager = Arc<tokio::sync::Mutex<IdentityManager>>;

/// Manager configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerConfig {
    /// Policy for introduction chains
    pub chain: ChainPolicy,

    /// Upper bound for a single storage call
    pub storage_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            chain: ChainPolicy::default(),
            storage_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a best-effort save
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistStatus {
    Saved,
    Failed(String),
}

impl PersistStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistStatus::Saved)
    }

    /// First failure of two saves
    fn and(self, other: PersistStatus) -> PersistStatus {
        match self {
            PersistStatus::Saved => other,
            failed => failed,
        }
    }
}

/// Outcome of a mutation addressed to one record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Changed in memory; carries the save result
    Applied(PersistStatus),

    /// Nothing to change
    Unchanged,

    /// No record with that peer id
    NotFound,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UpdateOutcome::NotFound)
    }
}

/// What `add_peer` did to the record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerChange {
    Created,
    /// Cached key, profile or capabilities updated
    Refreshed,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddPeerOutcome {
    pub peer_id: String,
    pub change: PeerChange,
    /// `None` when nothing needed saving
    pub persisted: Option<PersistStatus>,
}

/// Result of `initialize` / `reset`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// Identity and records restored from storage
    Loaded { peers: usize },

    /// Fresh identity generated
    Generated { persisted: PersistStatus },

    AlreadyInitialized,
}

/// Result of verifying a chain and applying its grant
#[derive(Clone, Debug, PartialEq)]
pub struct ChainApplication {
    pub verdict: ChainVerdict,
    /// Target moved from `unknown` to `marginal`
    pub upgraded: bool,
    pub persisted: Option<PersistStatus>,
}

/// Result of handling an incoming introduction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntroductionOutcome {
    Accepted {
        peer_id: String,
        change: PeerChange,
        endorsement_added: bool,
        persisted: Option<PersistStatus>,
    },

    /// The introducer is not a known peer, so nothing can be verified
    UnknownIntroducer,
}

/// Summary of a known-peers import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub updated: usize,
    /// Existing record was at least as recent
    pub kept: usize,
    /// Entries describing the local identity
    pub skipped: usize,
    pub persisted: Option<PersistStatus>,
}

/// Counts over the trust store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrustStats {
    pub total: usize,
    pub unknown: usize,
    pub untrusted: usize,
    pub marginal: usize,
    pub full: usize,
    pub verified: usize,
    pub endorsements: usize,
}

/// Local identity plus the trust store
pub struct IdentityManager {
    storage: BoundedStorage,
    config: ManagerConfig,
    identity: Option<Identity>,
    records: HashMap<String, TrustRecord>,
}

impl IdentityManager {
    /// Create a manager over a storage backend; call [`initialize`](Self::initialize) next
    pub fn new(storage: Arc<dyn Storage>, config: ManagerConfig) -> Self {
        Self {
            storage: BoundedStorage::new(storage, config.storage_timeout),
            config,
            identity: None,
            records: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedIdentityManager {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.identity.is_some()
    }

    /// Load the persisted identity and records, or generate a new identity.
    ///
    /// Calling this again in the same session is a no-op. Read errors are
    /// surfaced so that an unreachable store never leads to a stored identity
    /// being replaced.
    pub async fn initialize(&mut self, seed: Profile) -> Result<InitOutcome, TrustError> {
        if self.identity.is_some() {
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let stored = self.storage.get(IDENTITY_KEY).await?;
        let mut records = self.load_records().await?;

        match stored {
            Some(bytes) => {
                let identity = Identity::from_json(&bytes)?;
                if !identity.is_own() {
                    return Err(TrustError::InvalidFormat(
                        "stored identity has no private key".into(),
                    ));
                }
                records.remove(identity.id());

                info!(
                    id = %identity.id(),
                    fingerprint = %identity.short_fingerprint(),
                    peers = records.len(),
                    "Loaded identity"
                );

                let peers = records.len();
                self.identity = Some(identity);
                self.records = records;
                set_known_peers(peers);
                Ok(InitOutcome::Loaded { peers })
            }
            None => {
                let identity = Identity::generate(seed)?;
                records.remove(identity.id());

                info!(
                    id = %identity.id(),
                    fingerprint = %identity.short_fingerprint(),
                    name = %identity.profile().name,
                    "Generated new identity"
                );

                self.identity = Some(identity);
                self.records = records;
                set_known_peers(self.records.len());
                let persisted = self.save_identity().await;
                Ok(InitOutcome::Generated { persisted })
            }
        }
    }

    async fn load_records(&self) -> Result<HashMap<String, TrustRecord>, TrustError> {
        let Some(bytes) = self.storage.get(PEERS_KEY).await? else {
            return Ok(HashMap::new());
        };

        // Entries are decoded one by one so a single bad record only costs itself
        let stored: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
        let mut records = HashMap::with_capacity(stored.len());
        for (index, value) in stored.into_iter().enumerate() {
            let record = match serde_json::from_value::<TrustRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(index, error = %e, "Dropping stored record that cannot be decoded");
                    continue;
                }
            };
            if let Err(e) = record.validate() {
                warn!(peer_id = %record.peer_id, error = %e, "Dropping stored record that fails validation");
                continue;
            }
            records.insert(record.peer_id.clone(), record);
        }
        Ok(records)
    }

    // ========== Local identity ==========

    pub fn identity(&self) -> Result<&Identity, TrustError> {
        self.identity.as_ref().ok_or(TrustError::NotInitialized)
    }

    /// What the transport announces for us
    pub fn public_view(&self) -> Result<PublicIdentity, TrustError> {
        Ok(self.identity()?.public_view())
    }

    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, TrustError> {
        self.identity()?.sign(payload)
    }

    /// Apply a profile patch to the local identity and save it
    pub async fn update_profile(&mut self, patch: &ProfilePatch) -> Result<UpdateOutcome, TrustError> {
        let identity = self.identity.as_mut().ok_or(TrustError::NotInitialized)?;
        if !identity.update_profile(patch)? {
            return Ok(UpdateOutcome::Unchanged);
        }

        info!(id = %identity.id(), name = %identity.profile().name, "Profile updated");
        Ok(UpdateOutcome::Applied(self.save_identity().await))
    }

    /// Backup bundle of the local identity, private key included
    pub fn export_identity(&self) -> Result<String, TrustError> {
        let identity = self.identity()?;
        info!(id = %identity.id(), "Exporting identity with private key");
        identity.export_bundle()
    }

    /// Replace the local identity from a backup bundle.
    ///
    /// Trust records are kept. A record carrying the imported identity's own
    /// id is dropped.
    pub async fn import_identity(&mut self, text: &str) -> Result<PersistStatus, TrustError> {
        let identity = Identity::import_bundle(text)?;
        if !identity.is_own() {
            return Err(TrustError::NoPrivateKey(identity.id().to_string()));
        }

        let dropped = self.records.remove(identity.id()).is_some();
        if dropped {
            debug!(id = %identity.id(), "Dropped trust record for the imported identity");
        }

        info!(
            id = %identity.id(),
            fingerprint = %identity.short_fingerprint(),
            "Imported identity"
        );
        self.identity = Some(identity);

        let mut persisted = self.save_identity().await;
        if dropped {
            persisted = persisted.and(self.save_records().await);
        }
        Ok(persisted)
    }

    // ========== Peers ==========

    /// Record a peer announcement.
    ///
    /// An existing record only gets its cached key, profile and capabilities
    /// refreshed; trust fields are never touched here. A new record starts at
    /// `unknown`.
    pub async fn add_peer(
        &mut self,
        announcement: &PeerAnnouncement,
        introduced_by: Option<&str>,
    ) -> Result<AddPeerOutcome, TrustError> {
        let change = self.upsert_peer(announcement, introduced_by)?;
        let persisted = match change {
            PeerChange::Unchanged => None,
            PeerChange::Created | PeerChange::Refreshed => Some(self.save_records().await),
        };

        Ok(AddPeerOutcome {
            peer_id: announcement.id.clone(),
            change,
            persisted,
        })
    }

    fn upsert_peer(
        &mut self,
        announcement: &PeerAnnouncement,
        introduced_by: Option<&str>,
    ) -> Result<PeerChange, TrustError> {
        let local = self.identity()?;
        let local_id = local.id().to_string();
        let local_fingerprint = local.fingerprint().to_string();

        let (_, ids) = announcement.validate().inspect_err(|e| {
            warn!(peer_id = %announcement.id, error = %e, "Rejected peer announcement");
        })?;

        if ids.peer_id == local_id {
            if ids.fingerprint == local_fingerprint {
                return Err(TrustError::IdentityMismatch {
                    field: "id",
                    claimed: ids.peer_id,
                    derived: "local identity".into(),
                });
            }
            return Err(TrustError::PeerIdCollision {
                peer_id: ids.peer_id,
                known: local_fingerprint,
                announced: ids.fingerprint,
            });
        }

        let now = now_millis();
        if let Some(record) = self.records.get_mut(&ids.peer_id) {
            if record.fingerprint != ids.fingerprint {
                warn!(peer_id = %ids.peer_id, "Peer id collision");
                return Err(TrustError::PeerIdCollision {
                    peer_id: ids.peer_id,
                    known: record.fingerprint.clone(),
                    announced: ids.fingerprint,
                });
            }

            if record.refresh(announcement, now) {
                debug!(peer_id = %record.peer_id, name = %record.profile.name, "Refreshed peer");
                return Ok(PeerChange::Refreshed);
            }
            return Ok(PeerChange::Unchanged);
        }

        let record = TrustRecord::new(
            announcement,
            ids,
            &local_id,
            introduced_by.map(str::to_string),
            now,
        );

        info!(
            peer_id = %record.peer_id,
            name = %record.profile.name,
            introduced_by = ?record.introduced_by,
            "Added peer"
        );
        record_peer_added(introduced_by.is_some());

        self.records.insert(record.peer_id.clone(), record);
        set_known_peers(self.records.len());
        Ok(PeerChange::Created)
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<&TrustRecord> {
        self.records.get(peer_id)
    }

    /// All known peers, ordered by peer id
    pub fn peers(&self) -> Vec<&TrustRecord> {
        let mut peers: Vec<_> = self.records.values().collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    pub fn trust_level(&self, peer_id: &str) -> Option<TrustLevel> {
        self.records.get(peer_id).map(|r| r.trust_level)
    }

    /// Whether a peer is trusted at `minimum` or better.
    ///
    /// `unknown` and `untrusted` never count as trusted.
    pub fn is_trusted(&self, peer_id: &str, minimum: TrustLevel) -> bool {
        self.trust_level(peer_id)
            .is_some_and(|level| level >= TrustLevel::Marginal && level >= minimum)
    }

    /// Set a peer's trust level; the only path to `full`.
    ///
    /// Supplying a verification method marks the peer verified with it
    /// (`VerificationMethod::None` clears verification).
    pub async fn set_trust(
        &mut self,
        peer_id: &str,
        level: TrustLevel,
        method: Option<VerificationMethod>,
    ) -> Result<UpdateOutcome, TrustError> {
        let local_id = self.identity()?.id().to_string();
        let Some(record) = self.records.get_mut(peer_id) else {
            debug!(peer_id, "set_trust on unknown peer");
            return Ok(UpdateOutcome::NotFound);
        };

        let now = now_millis();
        let previous = record.trust_level;
        record.trust_level = level;
        record.trusted_by = local_id;
        record.trusted_at = now;

        if let Some(method) = method {
            record.verified = method != VerificationMethod::None;
            record.verified_method = method;
            record.verified_at = record.verified.then_some(now);
        }
        record.last_updated = now;

        info!(peer_id, from = %previous, to = %level, method = ?method, "Trust level set");
        record_trust_change(previous.as_str(), level.as_str());

        Ok(UpdateOutcome::Applied(self.save_records().await))
    }

    /// Attach an endorsement to a peer's record. Never changes trust.
    pub async fn add_signature(
        &mut self,
        peer_id: &str,
        endorsement: Endorsement,
    ) -> Result<UpdateOutcome, TrustError> {
        keys::parse_signature(&endorsement.signature)?;

        let Some(record) = self.records.get_mut(peer_id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let signed_by = endorsement.signed_by.clone();
        if !record.add_endorsement(endorsement, now_millis()) {
            return Ok(UpdateOutcome::Unchanged);
        }

        debug!(peer_id, signed_by = %signed_by, "Added endorsement");
        Ok(UpdateOutcome::Applied(self.save_records().await))
    }

    pub async fn set_notes(
        &mut self,
        peer_id: &str,
        notes: impl Into<String>,
    ) -> Result<UpdateOutcome, TrustError> {
        let Some(record) = self.records.get_mut(peer_id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let notes = notes.into();
        if record.notes == notes {
            return Ok(UpdateOutcome::Unchanged);
        }
        record.notes = notes;
        record.last_updated = now_millis();

        Ok(UpdateOutcome::Applied(self.save_records().await))
    }

    /// Forget a peer entirely
    pub async fn remove_peer(&mut self, peer_id: &str) -> Result<UpdateOutcome, TrustError> {
        if self.records.remove(peer_id).is_none() {
            return Ok(UpdateOutcome::NotFound);
        }

        info!(peer_id, "Removed peer");
        record_peer_removed();
        Ok(UpdateOutcome::Applied(self.save_records().await))
    }

    /// Verify a payload signature with a known peer's cached key.
    ///
    /// `None` when the peer is unknown.
    pub fn verify_from_peer<T: Serialize + ?Sized>(
        &self,
        peer_id: &str,
        payload: &T,
        signature: &str,
    ) -> Result<Option<bool>, TrustError> {
        let Some(record) = self.records.get(peer_id) else {
            return Ok(None);
        };

        let key = keys::import_public(&record.public_key)?;
        let valid = verify_with_key(&key, payload, signature)?;
        record_signature_verified("payload", valid);
        Ok(Some(valid))
    }

    // ========== Web of trust ==========

    /// Verify an explicit chain `[introducer, ..., target]` without changing state
    pub fn verify_chain(&self, chain: &[String]) -> Result<ChainVerdict, TrustError> {
        let local = self.identity()?;
        let verdict =
            TrustChainVerifier::new(&self.records, &self.config.chain, local.id()).verify(chain)?;

        record_signature_verified("chain", verdict.is_accepted());
        if let ChainVerdict::Rejected(reason) = &verdict {
            debug!(chain = ?chain, reason = ?reason, "Chain rejected");
        }
        Ok(verdict)
    }

    /// Verified chains to a target, best first
    pub fn find_chains(&self, target: &str) -> Result<Vec<TrustChain>, TrustError> {
        let local = self.identity()?;
        TrustChainVerifier::new(&self.records, &self.config.chain, local.id()).find_chains(target)
    }

    /// Verify a chain and, when it grants `marginal`, raise an `unknown`
    /// target to `marginal`. Explicit classifications are never overridden.
    pub async fn apply_chain(&mut self, chain: &[String]) -> Result<ChainApplication, TrustError> {
        let verdict = self.verify_chain(chain)?;
        let local_id = self.identity()?.id().to_string();

        let target = match (verdict.grant(), chain.last()) {
            (Some(TrustLevel::Marginal), Some(target)) => target,
            _ => {
                return Ok(ChainApplication {
                    verdict,
                    upgraded: false,
                    persisted: None,
                });
            }
        };

        let Some(record) = self.records.get_mut(target) else {
            return Ok(ChainApplication {
                verdict,
                upgraded: false,
                persisted: None,
            });
        };

        if record.trust_level != TrustLevel::Unknown {
            debug!(peer_id = %target, level = %record.trust_level, "Chain accepted; target already classified");
            return Ok(ChainApplication {
                verdict,
                upgraded: false,
                persisted: None,
            });
        }

        let now = now_millis();
        record.trust_level = TrustLevel::Marginal;
        record.trusted_by = local_id;
        record.trusted_at = now;
        record.verified = true;
        record.verified_method = VerificationMethod::Chain;
        record.verified_at = Some(now);
        record.last_updated = now;

        info!(peer_id = %target, chain = ?chain, "Trust raised to marginal via chain");
        record_trust_change(TrustLevel::Unknown.as_str(), TrustLevel::Marginal.as_str());

        let persisted = Some(self.save_records().await);
        Ok(ChainApplication {
            verdict,
            upgraded: true,
            persisted,
        })
    }

    /// Endorse a known peer's key and bundle it for a third party.
    ///
    /// `None` when the peer is unknown.
    pub fn create_introduction(&self, peer_id: &str) -> Result<Option<Introduction>, TrustError> {
        let local = self.identity()?;
        let Some(record) = self.records.get(peer_id) else {
            return Ok(None);
        };

        let introducee = record.public_view();
        let endorsement = Endorsement::create(local, &introducee)?;
        debug!(peer_id, "Created introduction");

        Ok(Some(Introduction {
            introducee,
            endorsement,
        }))
    }

    /// Handle an introduction delivered by a known peer.
    ///
    /// The endorsement must be signed by `from_peer_id` and verify against
    /// its cached key; the introducee is then added (if new) with
    /// `introduced_by` set and the endorsement attached. No trust is granted.
    pub async fn receive_introduction(
        &mut self,
        from_peer_id: &str,
        introduction: &Introduction,
    ) -> Result<IntroductionOutcome, TrustError> {
        self.identity()?;

        let Some(introducer) = self.records.get(from_peer_id) else {
            warn!(from = from_peer_id, "Introduction from unknown peer ignored");
            return Ok(IntroductionOutcome::UnknownIntroducer);
        };

        let endorsement = &introduction.endorsement;
        let introducee = &introduction.introducee;

        if endorsement.signed_by != from_peer_id {
            return Err(TrustError::InvalidEndorsement(format!(
                "endorsement signed by {} but delivered by {from_peer_id}",
                endorsement.signed_by
            )));
        }
        introducee.validate()?;

        let valid = endorsement.verify(&introducer.public_key, &introducee.id, &introducee.public_key)?;
        record_signature_verified("introduction", valid);
        if !valid {
            warn!(from = from_peer_id, introducee = %introducee.id, "Introduction signature does not verify");
            return Err(TrustError::InvalidEndorsement(format!(
                "signature by {from_peer_id} over {} does not verify",
                introducee.id
            )));
        }

        let change = self.upsert_peer(introducee, Some(from_peer_id))?;
        let endorsement_added = match self.records.get_mut(&introducee.id) {
            Some(record) => record.add_endorsement(endorsement.clone(), now_millis()),
            None => false,
        };

        info!(from = from_peer_id, introducee = %introducee.id, change = ?change, "Introduction accepted");

        let persisted = if change != PeerChange::Unchanged || endorsement_added {
            Some(self.save_records().await)
        } else {
            None
        };

        Ok(IntroductionOutcome::Accepted {
            peer_id: introducee.id.clone(),
            change,
            endorsement_added,
            persisted,
        })
    }

    // ========== Import / export ==========

    /// All records in the versioned known-peers envelope
    pub fn export_known_peers(&self) -> Result<String, TrustError> {
        bundle::wrap(PEERS_EXPORT_MARKER, PEERS_FIELD, &self.peers())
    }

    /// Merge a known-peers envelope into the store.
    ///
    /// Every entry is validated before anything is merged; any failure leaves
    /// the store untouched. For duplicates the record with the larger
    /// `last_updated` wins.
    pub async fn import_known_peers(&mut self, text: &str) -> Result<ImportReport, TrustError> {
        let local_id = self.identity()?.id().to_string();
        let incoming: Vec<TrustRecord> = bundle::unwrap(text, PEERS_EXPORT_MARKER, PEERS_FIELD)?;

        let mut batch: HashMap<String, TrustRecord> = HashMap::with_capacity(incoming.len());
        for record in incoming {
            record.validate().inspect_err(|e| {
                warn!(peer_id = %record.peer_id, error = %e, "Rejected known-peers import");
            })?;

            let known = self
                .records
                .get(&record.peer_id)
                .or_else(|| batch.get(&record.peer_id))
                .map(|r| r.fingerprint.clone());
            if let Some(known) = known {
                if known != record.fingerprint {
                    return Err(TrustError::PeerIdCollision {
                        peer_id: record.peer_id,
                        known,
                        announced: record.fingerprint,
                    });
                }
            }

            let newer = batch
                .get(&record.peer_id)
                .is_none_or(|existing| record.last_updated > existing.last_updated);
            if newer {
                batch.insert(record.peer_id.clone(), record);
            }
        }

        let mut report = ImportReport::default();
        for (peer_id, record) in batch {
            if peer_id == local_id {
                report.skipped += 1;
                continue;
            }

            match self.records.get(&peer_id).map(|e| e.last_updated < record.last_updated) {
                None => {
                    report.added += 1;
                    self.records.insert(peer_id, record);
                }
                Some(true) => {
                    report.updated += 1;
                    self.records.insert(peer_id, record);
                }
                Some(false) => report.kept += 1,
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            kept = report.kept,
            skipped = report.skipped,
            "Imported known peers"
        );

        if report.added + report.updated > 0 {
            set_known_peers(self.records.len());
            report.persisted = Some(self.save_records().await);
        }
        Ok(report)
    }

    // ========== Maintenance ==========

    /// Delete all persisted state and start over with a new identity
    pub async fn reset(&mut self, seed: Profile) -> Result<InitOutcome, TrustError> {
        for key in [IDENTITY_KEY, PEERS_KEY] {
            self.storage.delete(key).await?;
        }

        warn!(
            previous = ?self.identity.as_ref().map(|i| i.id().to_string()),
            peers = self.records.len(),
            "Trust state reset"
        );
        self.identity = None;
        self.records.clear();
        set_known_peers(0);

        self.initialize(seed).await
    }

    /// Save identity and records again, e.g. after an earlier failure
    pub async fn flush(&self) -> PersistStatus {
        self.save_identity().await.and(self.save_records().await)
    }

    pub fn stats(&self) -> TrustStats {
        let mut stats = TrustStats {
            total: self.records.len(),
            ..Default::default()
        };

        for record in self.records.values() {
            match record.trust_level {
                TrustLevel::Unknown => stats.unknown += 1,
                TrustLevel::Untrusted => stats.untrusted += 1,
                TrustLevel::Marginal => stats.marginal += 1,
                TrustLevel::Full => stats.full += 1,
            }
            if record.verified {
                stats.verified += 1;
            }
            stats.endorsements += record.signatures.len();
        }
        stats
    }

    // ========== Persistence ==========

    async fn save_identity(&self) -> PersistStatus {
        match &self.identity {
            Some(identity) => self.write(IDENTITY_KEY, identity).await,
            None => PersistStatus::Saved,
        }
    }

    async fn save_records(&self) -> PersistStatus {
        self.write(PEERS_KEY, &self.peers()).await
    }

    async fn write<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> PersistStatus {
        let result = match serde_json::to_vec(value) {
            Ok(bytes) => self.storage.set(key, &bytes).await,
            Err(e) => Err(StorageError::Serialization(e.to_string())),
        };

        match result {
            Ok(()) => {
                debug!(key, "Saved");
                PersistStatus::Saved
            }
            Err(e) => {
                warn!(key, error = %e, "Save failed; keeping in-memory state");
                record_persist_failure(key);
                PersistStatus::Failed(e.to_string())
            }
        }
    }
}
