use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use socialgraph_common::NodeHandle;

#[derive(Debug)]
enum Claim {
    /// Visit in flight. Holds the Follow sources waiting for its outcome.
    Pending(Vec<NodeHandle>),
    Persisted(NodeHandle),
    /// Fetch or write failed, or the entity had no id.
    Unavailable,
    /// Another id for the entity claimed under the inner id.
    Alias(String),
}

/// Where a Follow edge to an already-claimed id should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// The entity is persisted; link now.
    Ready(NodeHandle),
    /// The visit is still running; the source is queued and handed back by
    /// [`VisitedRegistry::settle`].
    Deferred,
    /// The entity will never have a node.
    Dropped,
}

/// Ids whose expansion has been initiated during one crawl, with the
/// outcome of each visit once known.
///
/// [`try_claim`](Self::try_claim) is an atomic check-and-set, so two
/// branches discovering the same id concurrently can't both expand it.
/// Entries are never removed.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    claims: DashMap<String, Claim>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for expansion. True for exactly one caller per id.
    pub fn try_claim(&self, id: &str) -> bool {
        match self.claims.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Claim::Pending(Vec::new()));
                true
            }
        }
    }

    /// Resolve a Follow edge from `source` to the claimed `id`.
    pub fn link_to(&self, id: &str, source: NodeHandle) -> LinkTarget {
        match self.resolve(id, source) {
            Ok(target) => target,
            // Aliases point at ids claimed directly, so one hop is enough.
            Err((canonical, source)) => self
                .resolve(&canonical, source)
                .unwrap_or(LinkTarget::Dropped),
        }
    }

    fn resolve(&self, id: &str, source: NodeHandle) -> Result<LinkTarget, (String, NodeHandle)> {
        let Some(mut claim) = self.claims.get_mut(id) else {
            return Ok(LinkTarget::Dropped);
        };
        match &mut *claim {
            Claim::Pending(waiting) => {
                waiting.push(source);
                Ok(LinkTarget::Deferred)
            }
            Claim::Persisted(handle) => Ok(LinkTarget::Ready(handle.clone())),
            Claim::Unavailable => Ok(LinkTarget::Dropped),
            Claim::Alias(canonical) => Err((canonical.clone(), source)),
        }
    }

    /// Record the outcome of the visit that claimed `id` and return the
    /// sources that were waiting to link to it.
    pub fn settle(&self, id: &str, handle: Option<&NodeHandle>) -> Vec<NodeHandle> {
        let outcome = match handle {
            Some(h) => Claim::Persisted(h.clone()),
            None => Claim::Unavailable,
        };
        match self.claims.insert(id.to_string(), outcome) {
            Some(Claim::Pending(waiting)) => waiting,
            _ => Vec::new(),
        }
    }

    /// Mark `alias` as another id for the entity claimed under `canonical`.
    /// Sources that were waiting on `alias` are re-resolved against
    /// `canonical`; the ones that can link now are returned with their target.
    pub fn redirect(&self, alias: &str, canonical: &str) -> Vec<(NodeHandle, NodeHandle)> {
        let waiting = match self
            .claims
            .insert(alias.to_string(), Claim::Alias(canonical.to_string()))
        {
            Some(Claim::Pending(waiting)) => waiting,
            _ => Vec::new(),
        };
        waiting
            .into_iter()
            .filter_map(|source| match self.link_to(canonical, source.clone()) {
                LinkTarget::Ready(target) => Some((source, target)),
                LinkTarget::Deferred | LinkTarget::Dropped => None,
            })
            .collect()
    }

    /// Number of claimed ids, aliases included.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_claim_wins_and_repeats_fail() {
        let registry = VisitedRegistry::new();
        assert!(registry.try_claim("A"));
        assert!(!registry.try_claim("A"));
        assert!(registry.try_claim("B"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner_per_id() {
        let registry = Arc::new(VisitedRegistry::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            let wins = wins.clone();
            handles.push(tokio::spawn(async move {
                for id in ["shared-1", "shared-2", "shared-3"] {
                    if registry.try_claim(id) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn link_to_pending_claim_waits_for_outcome() {
        let registry = VisitedRegistry::new();
        registry.try_claim("C");

        assert_eq!(registry.link_to("C", NodeHandle::user("B")), LinkTarget::Deferred);

        let c = NodeHandle::user("C");
        assert_eq!(registry.settle("C", Some(&c)), vec![NodeHandle::user("B")]);
        assert_eq!(registry.link_to("C", NodeHandle::user("A")), LinkTarget::Ready(c));
    }

    #[test]
    fn failed_visit_drops_waiting_links() {
        let registry = VisitedRegistry::new();
        registry.try_claim("C");
        registry.link_to("C", NodeHandle::user("B"));

        let waiting = registry.settle("C", None);

        assert_eq!(waiting.len(), 1, "waiters are handed back for the caller to drop");
        assert_eq!(registry.link_to("C", NodeHandle::user("A")), LinkTarget::Dropped);
        assert!(!registry.try_claim("C"), "failed ids stay claimed");
    }

    #[test]
    fn unclaimed_id_is_dropped() {
        let registry = VisitedRegistry::new();
        assert_eq!(registry.link_to("X", NodeHandle::user("A")), LinkTarget::Dropped);
    }

    #[test]
    fn alias_forwards_links_to_canonical() {
        let registry = VisitedRegistry::new();
        registry.try_claim("durov");
        registry.try_claim("1");
        registry.link_to("durov", NodeHandle::user("A"));

        let ready = registry.redirect("durov", "1");
        assert!(ready.is_empty(), "canonical still pending, waiter moves over");

        let one = NodeHandle::user("1");
        assert_eq!(registry.settle("1", Some(&one)), vec![NodeHandle::user("A")]);
        assert_eq!(
            registry.link_to("durov", NodeHandle::user("B")),
            LinkTarget::Ready(one)
        );
    }

    #[test]
    fn alias_of_persisted_canonical_links_immediately() {
        let registry = VisitedRegistry::new();
        registry.try_claim("durov");
        registry.try_claim("1");
        let one = NodeHandle::user("1");
        registry.settle("1", Some(&one));
        registry.link_to("durov", NodeHandle::user("A"));

        let ready = registry.redirect("durov", "1");

        assert_eq!(ready, vec![(NodeHandle::user("A"), one)]);
    }
}
