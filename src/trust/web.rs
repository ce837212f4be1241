// trust/web.rs - Trust Chain Verification

//! Transitive trust through introduction chains.
//!
//! A chain `[B, ..., C]` is read from the local identity's point of view:
//! we trust `B` at `full`, `B` endorsed the next link, and so on up to `C`.
//! Every endorsement is checked against the cached key of the endorser. A
//! valid chain grants at most `marginal`; `full` always needs a local
//! verification.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use super::error::TrustError;
use super::record::TrustRecord;
use super::signature::{Endorsement, TrustLevel};

/// Policy for chain-derived trust
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainPolicy {
    /// Maximum number of peers in a chain, introducer included
    pub max_path_length: usize,

    /// Score multiplier per endorsement hop after the first (1.0 = no decay)
    pub trust_decay: f64,

    /// Minimum score for a chain to grant `marginal`
    pub marginal_threshold: f64,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            max_path_length: 4,
            trust_decay: 0.8,
            marginal_threshold: 0.6,
        }
    }
}

impl ChainPolicy {
    /// Score of a chain with the given number of endorsement hops
    pub fn score(&self, hops: usize) -> f64 {
        if hops == 0 {
            return 0.0;
        }
        self.trust_decay.powi(hops as i32 - 1)
    }

    /// Trust a chain of this many hops may grant
    pub fn grant_for(&self, hops: usize) -> Option<TrustLevel> {
        (hops > 0 && self.score(hops) >= self.marginal_threshold).then_some(TrustLevel::Marginal)
    }
}

/// Why a chain was refused
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainRejection {
    /// Fewer than two peers in the chain
    TooShort,

    TooLong { length: usize, max: usize },

    UnknownPeer(String),

    /// The first link is not trusted at `full`
    IntroducerNotTrusted(String),

    /// A later link was explicitly marked untrusted
    UntrustedLink(String),

    /// Peer appears twice, or the chain passes through the local identity
    Cycle(String),

    MissingEndorsement { from: String, to: String },

    BadSignature { from: String, to: String },
}

/// Outcome of verifying one chain
#[derive(Clone, Debug, PartialEq)]
pub enum ChainVerdict {
    Accepted {
        path: Vec<String>,
        score: f64,
        grant: Option<TrustLevel>,
    },
    Rejected(ChainRejection),
}

impl ChainVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChainVerdict::Accepted { .. })
    }

    /// Trust level the chain may grant, if any
    pub fn grant(&self) -> Option<TrustLevel> {
        match self {
            ChainVerdict::Accepted { grant, .. } => *grant,
            ChainVerdict::Rejected(_) => None,
        }
    }
}

/// A discovered chain to a target
#[derive(Clone, Debug, PartialEq)]
pub struct TrustChain {
    pub path: Vec<String>,
    pub score: f64,
}

/// Read-only verifier over a snapshot of trust records
pub struct TrustChainVerifier<'a> {
    records: &'a HashMap<String, TrustRecord>,
    policy: &'a ChainPolicy,
    self_id: &'a str,
}

impl<'a> TrustChainVerifier<'a> {
    pub fn new(
        records: &'a HashMap<String, TrustRecord>,
        policy: &'a ChainPolicy,
        self_id: &'a str,
    ) -> Self {
        Self {
            records,
            policy,
            self_id,
        }
    }

    /// Verify an explicit chain `[introducer, ..., target]`
    pub fn verify(&self, chain: &[String]) -> Result<ChainVerdict, TrustError> {
        use ChainRejection::*;

        if chain.len() < 2 {
            return Ok(ChainVerdict::Rejected(TooShort));
        }
        if chain.len() > self.policy.max_path_length {
            return Ok(ChainVerdict::Rejected(TooLong {
                length: chain.len(),
                max: self.policy.max_path_length,
            }));
        }

        let mut seen = Vec::with_capacity(chain.len());
        for peer_id in chain {
            if peer_id == self.self_id || seen.contains(&peer_id) {
                return Ok(ChainVerdict::Rejected(Cycle(peer_id.clone())));
            }
            seen.push(peer_id);
        }

        let mut links = Vec::with_capacity(chain.len());
        for peer_id in chain {
            match self.records.get(peer_id) {
                Some(record) => links.push(record),
                None => return Ok(ChainVerdict::Rejected(UnknownPeer(peer_id.clone()))),
            }
        }

        if !links[0].trust_level.can_introduce() {
            return Ok(ChainVerdict::Rejected(IntroducerNotTrusted(links[0].peer_id.clone())));
        }

        // Intermediate introducers; the target's own level is the caller's concern
        for record in &links[1..links.len() - 1] {
            if record.trust_level == TrustLevel::Untrusted {
                return Ok(ChainVerdict::Rejected(UntrustedLink(record.peer_id.clone())));
            }
        }

        for pair in links.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let mut endorsements = to.endorsements_by(&from.peer_id).peekable();
            if endorsements.peek().is_none() {
                return Ok(ChainVerdict::Rejected(MissingEndorsement {
                    from: from.peer_id.clone(),
                    to: to.peer_id.clone(),
                }));
            }

            if !endorsements.any(|e| endorses(e, from, to)) {
                return Ok(ChainVerdict::Rejected(BadSignature {
                    from: from.peer_id.clone(),
                    to: to.peer_id.clone(),
                }));
            }
        }

        let hops = chain.len() - 1;
        Ok(ChainVerdict::Accepted {
            path: chain.to_vec(),
            score: self.policy.score(hops),
            grant: self.policy.grant_for(hops),
        })
    }

    /// Find verified chains to a target, best (shortest) first
    pub fn find_chains(&self, target: &str) -> Result<Vec<TrustChain>, TrustError> {
        if !self.records.contains_key(target) || target == self.self_id {
            return Ok(vec![]);
        }

        let mut chains = Vec::new();
        let mut queue: VecDeque<Vec<&str>> = self
            .records
            .values()
            .filter(|r| r.trust_level.can_introduce() && r.peer_id != target)
            .map(|r| vec![r.peer_id.as_str()])
            .collect();

        while let Some(path) = queue.pop_front() {
            if path.len() >= self.policy.max_path_length {
                continue;
            }

            let current = match path.last().and_then(|id| self.records.get(*id)) {
                Some(record) => record,
                None => continue,
            };
            if current.trust_level == TrustLevel::Untrusted {
                continue;
            }

            for (peer_id, record) in self.records {
                if path.contains(&peer_id.as_str()) || peer_id == self.self_id {
                    continue; // Avoid cycles
                }

                if !record
                    .endorsements_by(&current.peer_id)
                    .any(|e| endorses(e, current, record))
                {
                    continue;
                }

                let mut next = path.clone();
                next.push(peer_id.as_str());
                if peer_id == target {
                    chains.push(TrustChain {
                        score: self.policy.score(next.len() - 1),
                        path: next.into_iter().map(str::to_string).collect(),
                    });
                } else {
                    queue.push_back(next);
                }
            }
        }

        chains.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(chains)
    }
}

/// Whether `endorsement` is a valid signature by `from` over `to`'s key.
///
/// Undecodable endorsements count as invalid so one bad entry cannot stall
/// verification of the rest.
fn endorses(endorsement: &Endorsement, from: &TrustRecord, to: &TrustRecord) -> bool {
    match endorsement.verify(&from.public_key, &to.peer_id, &to.public_key) {
        Ok(valid) => valid,
        Err(e) => {
            debug!(from = %from.peer_id, to = %to.peer_id, error = %e, "Skipping malformed endorsement");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::identity::{Identity, Profile};

    struct Web {
        me: Identity,
        peers: Vec<Identity>,
        records: HashMap<String, TrustRecord>,
    }

    impl Web {
        fn new(names: &[&str]) -> Self {
            let me = Identity::generate(Profile::named("me")).unwrap();
            let peers: Vec<_> = names
                .iter()
                .map(|n| Identity::generate(Profile::named(*n)).unwrap())
                .collect();
            let records = peers
                .iter()
                .map(|p| {
                    let view = p.public_view();
                    let (_, ids) = view.validate().unwrap();
                    (p.id().to_string(), TrustRecord::new(&view, ids, me.id(), None, 0))
                })
                .collect();
            Self { me, peers, records }
        }

        fn id(&self, i: usize) -> String {
            self.peers[i].id().to_string()
        }

        fn trust(&mut self, i: usize, level: TrustLevel) {
            let id = self.id(i);
            self.records.get_mut(&id).unwrap().trust_level = level;
        }

        fn endorse(&mut self, from: usize, to: usize) {
            let sig = Endorsement::create(&self.peers[from], &self.peers[to].public_view()).unwrap();
            let id = self.id(to);
            self.records.get_mut(&id).unwrap().add_endorsement(sig, 1);
        }
    }

    #[test]
    fn test_direct_introduction_grants_marginal() {
        let mut web = Web::new(&["bob", "carol"]);
        web.trust(0, TrustLevel::Full);
        web.endorse(0, 1);

        let policy = ChainPolicy::default();
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
        let verdict = verifier.verify(&[web.id(0), web.id(1)]).unwrap();

        assert!(verdict.is_accepted());
        assert_eq!(verdict.grant(), Some(TrustLevel::Marginal));
    }

    #[test]
    fn test_introducer_must_be_full() {
        let mut web = Web::new(&["bob", "carol"]);
        web.trust(0, TrustLevel::Marginal);
        web.endorse(0, 1);

        let policy = ChainPolicy::default();
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
        assert_eq!(
            verifier.verify(&[web.id(0), web.id(1)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::IntroducerNotTrusted(web.id(0)))
        );
    }

    #[test]
    fn test_missing_and_forged_endorsements() {
        let mut web = Web::new(&["bob", "carol", "dave"]);
        web.trust(0, TrustLevel::Full);

        let policy = ChainPolicy::default();
        {
            let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
            assert!(matches!(
                verifier.verify(&[web.id(0), web.id(1)]).unwrap(),
                ChainVerdict::Rejected(ChainRejection::MissingEndorsement { .. })
            ));
        }

        // Dave signs but claims to be Bob
        let mut forged = Endorsement::create(&web.peers[2], &web.peers[1].public_view()).unwrap();
        forged.signed_by = web.id(0);
        let carol = web.id(1);
        web.records.get_mut(&carol).unwrap().add_endorsement(forged, 1);

        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
        assert!(matches!(
            verifier.verify(&[web.id(0), web.id(1)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::BadSignature { .. })
        ));
    }

    #[test]
    fn test_score_decays_with_length() {
        let mut web = Web::new(&["b", "c", "d", "e"]);
        web.trust(0, TrustLevel::Full);
        web.endorse(0, 1);
        web.endorse(1, 2);
        web.endorse(2, 3);

        let policy = ChainPolicy {
            max_path_length: 4,
            trust_decay: 0.5,
            marginal_threshold: 0.5,
        };
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());

        let two_hops = verifier.verify(&[web.id(0), web.id(1), web.id(2)]).unwrap();
        assert_eq!(two_hops.grant(), Some(TrustLevel::Marginal));

        // Accepted, but too weak to grant anything
        let three_hops = verifier
            .verify(&[web.id(0), web.id(1), web.id(2), web.id(3)])
            .unwrap();
        assert!(three_hops.is_accepted());
        assert_eq!(three_hops.grant(), None);
    }

    #[test]
    fn test_length_and_cycles_rejected() {
        let mut web = Web::new(&["b", "c"]);
        web.trust(0, TrustLevel::Full);
        web.endorse(0, 1);

        let policy = ChainPolicy {
            max_path_length: 2,
            ..Default::default()
        };
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());

        assert_eq!(
            verifier.verify(&[web.id(0)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::TooShort)
        );
        assert!(matches!(
            verifier.verify(&[web.id(0), web.id(1), web.id(0)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::TooLong { .. })
        ));
        assert!(matches!(
            verifier.verify(&[web.id(0), web.id(0)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::Cycle(_))
        ));
        assert!(matches!(
            verifier.verify(&[web.id(0), web.me.id().to_string()]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::Cycle(_))
        ));
    }

    #[test]
    fn test_find_chains() {
        let mut web = Web::new(&["bob", "carol", "dave"]);
        web.trust(0, TrustLevel::Full);
        web.endorse(0, 1);
        web.endorse(1, 2);
        web.endorse(0, 2);

        let policy = ChainPolicy::default();
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
        let chains = verifier.find_chains(&web.id(2)).unwrap();

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].path, vec![web.id(0), web.id(2)]);
        assert_eq!(chains[1].path, vec![web.id(0), web.id(1), web.id(2)]);
        assert!(chains[0].score > chains[1].score);

        for chain in &chains {
            assert!(verifier.verify(&chain.path).unwrap().is_accepted());
        }
    }

    #[test]
    fn test_malformed_endorsement_does_not_block_chains() {
        let mut web = Web::new(&["bob", "carol", "dave"]);
        web.trust(0, TrustLevel::Full);

        // Carol holds a garbage endorsement from Bob next to a real one
        let mut garbage = Endorsement::create(&web.peers[0], &web.peers[1].public_view()).unwrap();
        garbage.signature = "AAAA".into();
        let carol = web.id(1);
        web.records.get_mut(&carol).unwrap().add_endorsement(garbage.clone(), 1);
        web.endorse(0, 1);

        // Dave only has a garbage one
        garbage.timestamp += 1;
        let dave = web.id(2);
        web.records.get_mut(&dave).unwrap().add_endorsement(garbage, 1);

        let policy = ChainPolicy::default();
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());

        assert!(verifier.verify(&[web.id(0), web.id(1)]).unwrap().is_accepted());
        assert_eq!(verifier.find_chains(&web.id(1)).unwrap().len(), 1);

        assert!(matches!(
            verifier.verify(&[web.id(0), web.id(2)]).unwrap(),
            ChainVerdict::Rejected(ChainRejection::BadSignature { .. })
        ));
        assert!(verifier.find_chains(&web.id(2)).unwrap().is_empty());
    }

    #[test]
    fn test_find_chains_without_trusted_introducer() {
        let mut web = Web::new(&["bob", "carol"]);
        web.endorse(0, 1);

        let policy = ChainPolicy::default();
        let verifier = TrustChainVerifier::new(&web.records, &policy, web.me.id());
        assert!(verifier.find_chains(&web.id(1)).unwrap().is_empty());
    }
}
