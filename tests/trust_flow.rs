// tests/trust_flow.rs - End-to-end trust flows over real storage backends

use std::sync::Arc;

use peer_trust::persistence::{open_storage, FileStorage, StorageBackend, StorageConfig};
use peer_trust::trust::{
    IdentityManager, InitOutcome, IntroductionOutcome, ManagerConfig, PersistStatus, Profile,
    TrustLevel, VerificationMethod,
};

async fn participant(name: &str) -> IdentityManager {
    let config = StorageConfig::memory();
    let mut manager = IdentityManager::new(open_storage(&config).unwrap(), ManagerConfig::default());
    manager.initialize(Profile::named(name)).await.unwrap();
    manager
}

#[tokio::test]
async fn test_state_survives_restart_on_file_storage() {
    let temp_dir = tempfile::tempdir().unwrap();
    let bob = participant("bob").await;
    let bob_view = bob.public_view().unwrap();

    let alice_id = {
        let storage = Arc::new(FileStorage::new(temp_dir.path()));
        let mut alice = IdentityManager::new(storage, ManagerConfig::default());
        alice.initialize(Profile::named("alice")).await.unwrap();

        alice.add_peer(&bob_view, None).await.unwrap();
        let outcome = alice
            .set_trust(&bob_view.id, TrustLevel::Full, Some(VerificationMethod::Code))
            .await
            .unwrap();
        assert!(outcome.is_applied());
        alice.set_notes(&bob_view.id, "compared codes").await.unwrap();
        alice.identity().unwrap().id().to_string()
    };

    assert!(temp_dir.path().join("peer_trust.identity.json").exists());
    assert!(temp_dir.path().join("peer_trust.peers.json").exists());

    let storage = Arc::new(FileStorage::new(temp_dir.path()));
    let mut alice = IdentityManager::new(storage, ManagerConfig::default());
    let outcome = alice.initialize(Profile::named("someone else")).await.unwrap();
    assert_eq!(outcome, InitOutcome::Loaded { peers: 1 });
    assert_eq!(alice.identity().unwrap().id(), alice_id);
    assert_eq!(alice.identity().unwrap().profile().name, "alice");

    let record = alice.get_peer(&bob_view.id).unwrap();
    assert_eq!(record.trust_level, TrustLevel::Full);
    assert_eq!(record.verified_method, VerificationMethod::Code);
    assert_eq!(record.notes, "compared codes");

    // Signatures from before the restart still verify
    let payload = serde_json::json!({"ping": 1});
    let signature = bob.sign(&payload).unwrap();
    assert_eq!(alice.verify_from_peer(&bob_view.id, &payload, &signature).unwrap(), Some(true));
}

#[tokio::test]
async fn test_state_survives_restart_on_sled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sled,
        path: temp_dir.path().join("trust.db"),
        ..Default::default()
    };
    let bob = participant("bob").await.public_view().unwrap();

    let alice_id = {
        let mut alice = IdentityManager::new(open_storage(&config).unwrap(), ManagerConfig::default());
        alice.initialize(Profile::named("alice")).await.unwrap();
        alice.add_peer(&bob, None).await.unwrap();
        alice.identity().unwrap().id().to_string()
    };

    let mut alice = IdentityManager::new(open_storage(&config).unwrap(), ManagerConfig::default());
    alice.initialize(Profile::default()).await.unwrap();
    assert_eq!(alice.identity().unwrap().id(), alice_id);
    assert!(alice.get_peer(&bob.id).is_some());
}

#[tokio::test]
async fn test_introduction_between_participants() {
    let mut alice = participant("alice").await;
    let mut bob = participant("bob").await;
    let carol = participant("carol").await;

    let bob_view = bob.public_view().unwrap();
    let carol_view = carol.public_view().unwrap();

    // Alice met Bob in person; Bob knows Carol
    alice.add_peer(&bob_view, None).await.unwrap();
    alice
        .set_trust(&bob_view.id, TrustLevel::Full, Some(VerificationMethod::InPerson))
        .await
        .unwrap();
    bob.add_peer(&carol_view, None).await.unwrap();

    // Bob introduces Carol to Alice over the wire
    let introduction = bob.create_introduction(&carol_view.id).unwrap().unwrap();
    let wire = serde_json::to_string(&introduction).unwrap();
    let received = serde_json::from_str(&wire).unwrap();

    let outcome = alice.receive_introduction(&bob_view.id, &received).await.unwrap();
    assert!(matches!(
        outcome,
        IntroductionOutcome::Accepted {
            persisted: Some(PersistStatus::Saved),
            ..
        }
    ));
    assert_eq!(alice.trust_level(&carol_view.id), Some(TrustLevel::Unknown));

    let chains = alice.find_chains(&carol_view.id).unwrap();
    assert_eq!(chains.len(), 1);
    let applied = alice.apply_chain(&chains[0].path).await.unwrap();
    assert!(applied.upgraded);
    assert_eq!(alice.trust_level(&carol_view.id), Some(TrustLevel::Marginal));
    assert!(alice.is_trusted(&carol_view.id, TrustLevel::Marginal));
    assert!(!alice.is_trusted(&carol_view.id, TrustLevel::Full));

    // Only a local verification reaches full
    alice
        .set_trust(&carol_view.id, TrustLevel::Full, Some(VerificationMethod::Video))
        .await
        .unwrap();
    assert_eq!(alice.trust_level(&carol_view.id), Some(TrustLevel::Full));
    assert!(alice.get_peer(&carol_view.id).unwrap().is_directly_verified());

    let stats = alice.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.full, 2);
    assert_eq!(stats.endorsements, 1);
}

#[tokio::test]
async fn test_backup_and_restore_on_new_device() {
    let mut laptop = participant("alice").await;
    let bob = participant("bob").await.public_view().unwrap();
    laptop.add_peer(&bob, None).await.unwrap();
    laptop.set_trust(&bob.id, TrustLevel::Full, None).await.unwrap();

    let identity_backup = laptop.export_identity().unwrap();
    let peers_backup = laptop.export_known_peers().unwrap();

    let mut phone = participant("fresh install").await;
    phone.import_identity(&identity_backup).await.unwrap();
    let report = phone.import_known_peers(&peers_backup).await.unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(phone.identity().unwrap().id(), laptop.identity().unwrap().id());
    assert_eq!(phone.trust_level(&bob.id), Some(TrustLevel::Full));

    // Both devices produce signatures the other accepts
    let payload = serde_json::json!({"hello": "from phone"});
    let signature = phone.sign(&payload).unwrap();
    assert!(laptop.identity().unwrap().verify(&payload, &signature).unwrap());
}
