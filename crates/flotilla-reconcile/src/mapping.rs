//! Mapping engine
//!
//! Resolves HAProxy members and Eureka instances to logical application
//! instances. Candidate resolution is pure; `MappingService` wires it to the
//! store, honours manual mappings and the operator-unmap sticky window, and
//! appends a history row for every create, change, or removal.
//!
//! The engine is idempotent: running it twice with unchanged inputs writes
//! nothing new. The reconcile driver invokes it from a single consumer task,
//! so resolutions for one entity are naturally serialised.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, info, warn};

use flotilla_persistence::PersistenceService;
use flotilla_persistence::model::{MappingCandidate, MappingEntityType, MappingReason};

/// An external entity to resolve
#[derive(Clone, Debug)]
pub struct MapTarget {
    pub entity_type: MappingEntityType,
    pub entity_id: i64,
    pub ip: Option<String>,
    pub port: Option<i32>,
    /// Member/instance name, used for the same-host-name tiebreak
    pub name: Option<String>,
}

/// Outcome of candidate resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Matched(i64),
    NoCandidates,
    Ambiguous,
}

/// Pick the application instance a target belongs to.
///
/// Candidates already share the target's IP. A candidate whose port is known
/// on both sides and differs is discarded. Tiebreak order: exact port match,
/// then name match against the member name, each subset resolved first-by-id.
/// Anything still undecided is ambiguous.
pub fn resolve_candidates(target: &MapTarget, candidates: &[MappingCandidate]) -> Resolution {
    let compatible: Vec<&MappingCandidate> = candidates
        .iter()
        .filter(|c| match (target.port, c.port) {
            (Some(target_port), Some(candidate_port)) => target_port == candidate_port,
            _ => true,
        })
        .collect();

    match compatible.len() {
        0 => return Resolution::NoCandidates,
        1 => return Resolution::Matched(compatible[0].application_id),
        _ => {}
    }

    if target.port.is_some() {
        let exact: Vec<&&MappingCandidate> = compatible
            .iter()
            .filter(|c| c.port == target.port)
            .collect();
        if let Some(first) = exact.iter().min_by_key(|c| c.application_id) {
            return Resolution::Matched(first.application_id);
        }
    }

    if let Some(name) = target.name.as_deref() {
        let by_instance_name: Vec<&&MappingCandidate> = compatible
            .iter()
            .filter(|c| name.contains(&c.instance_name))
            .collect();
        let named = if by_instance_name.is_empty() {
            compatible
                .iter()
                .filter(|c| name.contains(&c.server_name))
                .collect()
        } else {
            by_instance_name
        };
        if let Some(first) = named.iter().min_by_key(|c| c.application_id) {
            return Resolution::Matched(first.application_id);
        }
    }

    Resolution::Ambiguous
}

/// Mapping engine service
pub struct MappingService {
    store: Arc<dyn PersistenceService>,
    /// Entities manually unmapped within the sticky window; auto-resolution
    /// is suppressed while a key is present.
    sticky: Cache<(&'static str, i64), ()>,
}

impl MappingService {
    pub fn new(store: Arc<dyn PersistenceService>, sticky_window: Duration) -> Self {
        Self {
            store,
            sticky: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(sticky_window)
                .build(),
        }
    }

    fn sticky_key(entity_type: MappingEntityType, entity_id: i64) -> (&'static str, i64) {
        (entity_type.as_str(), entity_id)
    }

    /// Whether the entity sits inside an operator-unmap sticky window
    pub fn in_sticky_window(&self, entity_type: MappingEntityType, entity_id: i64) -> bool {
        self.sticky
            .contains_key(&Self::sticky_key(entity_type, entity_id))
    }

    /// Auto-resolve a newly appeared HAProxy member
    pub async fn resolve_haproxy_server(&self, id: i64) -> anyhow::Result<()> {
        let Some(server) = self.store.haproxy_server_find_by_id(id).await? else {
            return Ok(());
        };
        let target = MapTarget {
            entity_type: MappingEntityType::HaproxyServer,
            entity_id: id,
            ip: server.ip,
            port: server.port,
            name: Some(server.name),
        };
        self.resolve_target(target).await
    }

    /// Auto-resolve a newly appeared Eureka instance
    pub async fn resolve_eureka_instance(&self, id: i64) -> anyhow::Result<()> {
        let Some(instance) = self.store.eureka_instance_find_by_id(id).await? else {
            return Ok(());
        };
        let target = MapTarget {
            entity_type: MappingEntityType::EurekaInstance,
            entity_id: id,
            ip: Some(instance.ip),
            port: instance.port,
            name: Some(instance.instance_id),
        };
        self.resolve_target(target).await
    }

    async fn resolve_target(&self, target: MapTarget) -> anyhow::Result<()> {
        if let Some(existing) = self
            .store
            .mapping_find_for_entity(target.entity_type, target.entity_id)
            .await?
        {
            // Manual mappings are never overwritten; an existing auto
            // mapping means there is nothing to do.
            debug!(
                entity_type = target.entity_type.as_str(),
                entity_id = target.entity_id,
                application_id = existing.application_id,
                "entity already mapped, skipping auto-resolution"
            );
            return Ok(());
        }
        if self.in_sticky_window(target.entity_type, target.entity_id) {
            debug!(
                entity_type = target.entity_type.as_str(),
                entity_id = target.entity_id,
                "entity inside operator-unmap sticky window, skipping"
            );
            return Ok(());
        }
        let Some(ip) = target.ip.as_deref() else {
            return Ok(());
        };

        let candidates = self.store.instance_find_candidates_by_ip(ip).await?;
        match resolve_candidates(&target, &candidates) {
            Resolution::Matched(application_id) => {
                self.store
                    .mapping_create(
                        application_id,
                        target.entity_type,
                        target.entity_id,
                        false,
                        None,
                        None,
                        MappingReason::Auto,
                    )
                    .await?;
                info!(
                    entity_type = target.entity_type.as_str(),
                    entity_id = target.entity_id,
                    application_id,
                    "auto-mapped entity"
                );
            }
            Resolution::NoCandidates => {}
            Resolution::Ambiguous => {
                // Only record once per unresolved episode so reruns stay
                // idempotent.
                let history = self
                    .store
                    .mapping_history_for_entity(target.entity_type, target.entity_id, 1)
                    .await?;
                let already_noted = history
                    .first()
                    .map(|h| h.reason == MappingReason::Ambiguous.as_str())
                    .unwrap_or(false);
                if !already_noted {
                    warn!(
                        entity_type = target.entity_type.as_str(),
                        entity_id = target.entity_id,
                        candidates = candidates.len(),
                        "ambiguous auto-mapping, leaving unmapped"
                    );
                    self.store
                        .mapping_record_unresolved(
                            target.entity_type,
                            target.entity_id,
                            Some(&format!("{} candidates shared the IP", candidates.len())),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Operator-initiated manual mapping. Replaces an auto mapping in place;
    /// refuses to replace another manual mapping.
    pub async fn map_manual(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        application_id: i64,
        actor: &str,
        notes: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(existing) = self
            .store
            .mapping_find_for_entity(entity_type, entity_id)
            .await?
        {
            if existing.is_manual {
                return Err(flotilla_common::FlotillaError::Conflict(format!(
                    "{} {} already carries a manual mapping",
                    entity_type.as_str(),
                    entity_id
                ))
                .into());
            }
            self.store
                .mapping_remove(entity_type, entity_id, MappingReason::Manual, Some(actor))
                .await?;
        }
        self.store
            .mapping_create(
                application_id,
                entity_type,
                entity_id,
                true,
                Some(actor),
                notes,
                MappingReason::Manual,
            )
            .await?;
        // A manual decision ends any pending sticky suppression
        self.sticky
            .invalidate(&Self::sticky_key(entity_type, entity_id));
        Ok(())
    }

    /// Operator-initiated unmap; starts the sticky window
    pub async fn unmap_manual(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        actor: &str,
    ) -> anyhow::Result<bool> {
        let removed = self
            .store
            .mapping_remove(
                entity_type,
                entity_id,
                MappingReason::OperatorUnmap,
                Some(actor),
            )
            .await?;
        if removed {
            self.sticky
                .insert(Self::sticky_key(entity_type, entity_id), ());
        }
        Ok(removed)
    }

    /// A tombstoned entity loses its auto mapping; manual mappings survive
    pub async fn handle_entity_disappeared(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
    ) -> anyhow::Result<()> {
        if let Some(existing) = self
            .store
            .mapping_find_for_entity(entity_type, entity_id)
            .await?
        {
            if !existing.is_manual {
                self.store
                    .mapping_remove(
                        entity_type,
                        entity_id,
                        MappingReason::EntityDisappeared,
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// An application instance changed ip/port: drop auto mappings that no
    /// longer hold and re-resolve the affected entities.
    pub async fn handle_instance_endpoint_changed(
        &self,
        application_id: i64,
    ) -> anyhow::Result<()> {
        let Some(instance) = self.store.instance_find_by_id(application_id).await? else {
            return Ok(());
        };
        let mappings = self.store.mapping_find_for_application(application_id).await?;
        for mapping in mappings.into_iter().filter(|m| !m.is_manual) {
            let entity_type: MappingEntityType = mapping
                .entity_type
                .parse()
                .map_err(flotilla_common::FlotillaError::Internal)?;
            let entity_ip = match entity_type {
                MappingEntityType::HaproxyServer => self
                    .store
                    .haproxy_server_find_by_id(mapping.entity_id)
                    .await?
                    .and_then(|s| s.ip),
                MappingEntityType::EurekaInstance => self
                    .store
                    .eureka_instance_find_by_id(mapping.entity_id)
                    .await?
                    .map(|i| i.ip),
            };
            if entity_ip.as_deref() != instance.ip.as_deref() {
                self.store
                    .mapping_remove(
                        entity_type,
                        mapping.entity_id,
                        MappingReason::IpChanged,
                        None,
                    )
                    .await?;
                match entity_type {
                    MappingEntityType::HaproxyServer => {
                        self.resolve_haproxy_server(mapping.entity_id).await?
                    }
                    MappingEntityType::EurekaInstance => {
                        self.resolve_eureka_instance(mapping.entity_id).await?
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(application_id: i64, name: &str, port: Option<i32>) -> MappingCandidate {
        MappingCandidate {
            application_id,
            server_name: "web-01".to_string(),
            instance_name: name.to_string(),
            ip: Some("10.0.0.5".to_string()),
            port,
        }
    }

    fn target(port: Option<i32>, name: Option<&str>) -> MapTarget {
        MapTarget {
            entity_type: MappingEntityType::HaproxyServer,
            entity_id: 1,
            ip: Some("10.0.0.5".to_string()),
            port,
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_zero_candidates_is_unmapped() {
        assert_eq!(
            resolve_candidates(&target(Some(8080), None), &[]),
            Resolution::NoCandidates
        );
    }

    #[test]
    fn test_single_candidate_matches() {
        let candidates = vec![candidate(5, "billing-1", Some(8080))];
        assert_eq!(
            resolve_candidates(&target(Some(8080), None), &candidates),
            Resolution::Matched(5)
        );
    }

    #[test]
    fn test_port_mismatch_discards_candidate() {
        let candidates = vec![candidate(5, "billing-1", Some(9090))];
        assert_eq!(
            resolve_candidates(&target(Some(8080), None), &candidates),
            Resolution::NoCandidates
        );
    }

    #[test]
    fn test_exact_port_beats_portless() {
        let candidates = vec![
            candidate(5, "billing-1", None),
            candidate(6, "billing-2", Some(8080)),
        ];
        assert_eq!(
            resolve_candidates(&target(Some(8080), None), &candidates),
            Resolution::Matched(6)
        );
    }

    #[test]
    fn test_name_match_breaks_tie() {
        let candidates = vec![
            candidate(5, "billing-1", None),
            candidate(6, "orders-1", None),
        ];
        assert_eq!(
            resolve_candidates(&target(None, Some("web-01_orders-1")), &candidates),
            Resolution::Matched(6)
        );
    }

    #[test]
    fn test_two_portless_candidates_are_ambiguous() {
        // Two live instances share the IP with no port info on either side
        let candidates = vec![
            candidate(5, "billing-1", None),
            candidate(6, "billing-2", None),
        ];
        assert_eq!(
            resolve_candidates(&target(None, Some("unrelated")), &candidates),
            Resolution::Ambiguous
        );
    }
}
