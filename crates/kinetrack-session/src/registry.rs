//! Tracked-body registry: maps sensor tracking identifiers to application
//! entities across ticks.
//!
//! Lifecycle per identifier is `Unseen -> Tracked -> removed`. An identifier
//! missing from a tick's tracked set is removed on that same tick, with no
//! grace period, and its entity handle goes back to the presentation layer.

use std::cmp::Ordering;
use std::collections::{hash_map::Entry, HashMap, HashSet};
use std::fmt;

use kinetrack_core::{BodyFrame, JointFrame, JointType, TrackingId};
use serde::{Deserialize, Serialize};

use crate::repetition::{RepetitionConfig, RepetitionStateMachine};

/// Entity creation/destruction hooks owned by the presentation layer.
///
/// The registry stores handles but never looks inside them.
pub trait EntityLifecycle {
    type Handle;

    /// Called on the first tick an identifier is seen tracked.
    fn create(&mut self, id: TrackingId) -> Self::Handle;

    /// Called on the first tick an identifier is no longer tracked.
    fn destroy(&mut self, id: TrackingId, handle: Self::Handle);
}

/// Lifecycle for consumers that only need the identifiers: the handle is
/// the tracking id itself and destruction is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLifecycle;

impl EntityLifecycle for IdentityLifecycle {
    type Handle = TrackingId;

    fn create(&mut self, id: TrackingId) -> Self::Handle {
        id
    }

    fn destroy(&mut self, _id: TrackingId, _handle: Self::Handle) {}
}

/// One body known to the registry
#[derive(Debug)]
pub struct TrackedBody<H> {
    pub tracking_id: TrackingId,
    pub handle: H,
    pub last_frame: JointFrame,
    pub repetition: Option<RepetitionStateMachine>,
}

/// Identifiers created and removed by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub created: Vec<TrackingId>,
    pub removed: Vec<TrackingId>,
}

/// Registry of tracked bodies keyed by sensor tracking identifier.
pub struct TrackedBodyRegistry<H> {
    bodies: HashMap<TrackingId, TrackedBody<H>>,
    repetition: Option<RepetitionConfig>,
}

impl<H> TrackedBodyRegistry<H> {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            repetition: None,
        }
    }

    /// Give every newly created body its own repetition machine.
    pub fn with_repetition(mut self, config: RepetitionConfig) -> Self {
        self.repetition = Some(config);
        self
    }

    /// Reconcile known bodies with this tick's batch.
    ///
    /// Only bodies flagged as tracked take part; untracked slots are ignored
    /// entirely. Known identifiers absent from the tracked set are destroyed
    /// first, then unknown tracked identifiers are created. Cost is
    /// O(known + tracked).
    pub fn reconcile<L>(&mut self, bodies: &[BodyFrame], lifecycle: &mut L) -> ReconcileOutcome
    where
        L: EntityLifecycle<Handle = H>,
    {
        let tracked_ids: HashSet<TrackingId> = bodies
            .iter()
            .filter(|b| b.is_tracked)
            .map(|b| b.tracking_id)
            .collect();

        let mut outcome = ReconcileOutcome::default();

        let mut stale: Vec<TrackingId> = self
            .bodies
            .keys()
            .filter(|id| !tracked_ids.contains(id))
            .copied()
            .collect();
        stale.sort();

        for id in stale {
            if let Some(body) = self.bodies.remove(&id) {
                lifecycle.destroy(id, body.handle);
                tracing::info!(tracking_id = %id, "body lost, entity destroyed");
                outcome.removed.push(id);
            }
        }

        for body in bodies.iter().filter(|b| b.is_tracked) {
            match self.bodies.entry(body.tracking_id) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().last_frame = body.joints.clone();
                }
                Entry::Vacant(entry) => {
                    let handle = lifecycle.create(body.tracking_id);
                    tracing::info!(tracking_id = %body.tracking_id, "body tracked, entity created");
                    entry.insert(TrackedBody {
                        tracking_id: body.tracking_id,
                        handle,
                        last_frame: body.joints.clone(),
                        repetition: self.repetition.map(RepetitionStateMachine::new),
                    });
                    outcome.created.push(body.tracking_id);
                }
            }
        }

        outcome
    }

    pub fn get(&self, id: TrackingId) -> Option<&TrackedBody<H>> {
        self.bodies.get(&id)
    }

    pub fn get_mut(&mut self, id: TrackingId) -> Option<&mut TrackedBody<H>> {
        self.bodies.get_mut(&id)
    }

    pub fn contains(&self, id: TrackingId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Known identifiers, sorted.
    pub fn tracking_ids(&self) -> Vec<TrackingId> {
        let mut ids: Vec<_> = self.bodies.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Destroy every entity, e.g. when the session shuts down.
    pub fn clear<L>(&mut self, lifecycle: &mut L)
    where
        L: EntityLifecycle<Handle = H>,
    {
        for (id, body) in self.bodies.drain() {
            lifecycle.destroy(id, body.handle);
        }
    }
}

impl<H> Default for TrackedBodyRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks which tracked bodies are analyzed this tick.
///
/// `tracked` arrives in the sensor's native order. That order is not
/// guaranteed stable across ticks, so order-based strategies may switch
/// bodies when the sensor reshuffles its slots.
pub trait SelectionStrategy: Send + Sync + fmt::Debug {
    fn select<'a>(&self, tracked: &[&'a BodyFrame]) -> Vec<&'a BodyFrame>;
}

/// First tracked bodies in sensor order, up to `max_bodies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorOrder {
    max_bodies: usize,
}

impl SensorOrder {
    pub fn up_to(max_bodies: usize) -> Self {
        Self { max_bodies }
    }

    /// The single-body policy: first tracked body wins.
    pub fn single() -> Self {
        Self::up_to(1)
    }

    pub fn all() -> Self {
        Self::up_to(usize::MAX)
    }
}

impl SelectionStrategy for SensorOrder {
    fn select<'a>(&self, tracked: &[&'a BodyFrame]) -> Vec<&'a BodyFrame> {
        tracked.iter().take(self.max_bodies).copied().collect()
    }
}

/// Orders tracked bodies with a comparator before taking `max_bodies`.
/// The sort is stable, so ties keep sensor order.
pub struct ByComparator<F> {
    compare: F,
    max_bodies: usize,
}

impl<F> ByComparator<F>
where
    F: Fn(&BodyFrame, &BodyFrame) -> Ordering + Send + Sync,
{
    pub fn new(compare: F, max_bodies: usize) -> Self {
        Self {
            compare,
            max_bodies,
        }
    }
}

impl<F> fmt::Debug for ByComparator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByComparator")
            .field("max_bodies", &self.max_bodies)
            .finish_non_exhaustive()
    }
}

impl<F> SelectionStrategy for ByComparator<F>
where
    F: Fn(&BodyFrame, &BodyFrame) -> Ordering + Send + Sync,
{
    fn select<'a>(&self, tracked: &[&'a BodyFrame]) -> Vec<&'a BodyFrame> {
        let mut ordered = tracked.to_vec();
        ordered.sort_by(|a, b| (self.compare)(a, b));
        ordered.truncate(self.max_bodies);
        ordered
    }
}

/// Depth of the spine base, with unusable depths sorted last.
fn body_depth(body: &BodyFrame) -> f64 {
    let z = body.joints.position(JointType::SpineBase).z;
    if z.is_finite() {
        z
    } else {
        f64::INFINITY
    }
}

/// Nearest bodies to the sensor first, by spine-base depth.
pub fn closest_first(max_bodies: usize) -> ByComparator<fn(&BodyFrame, &BodyFrame) -> Ordering> {
    fn by_depth(a: &BodyFrame, b: &BodyFrame) -> Ordering {
        body_depth(a).total_cmp(&body_depth(b))
    }
    ByComparator::new(by_depth as fn(&BodyFrame, &BodyFrame) -> Ordering, max_bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetrack_core::{Joint, JointType};

    #[derive(Default)]
    struct Recorder {
        created: Vec<TrackingId>,
        destroyed: Vec<TrackingId>,
        next_handle: u32,
    }

    impl EntityLifecycle for Recorder {
        type Handle = u32;

        fn create(&mut self, id: TrackingId) -> u32 {
            self.created.push(id);
            self.next_handle += 1;
            self.next_handle
        }

        fn destroy(&mut self, id: TrackingId, _handle: u32) {
            self.destroyed.push(id);
        }
    }

    fn body(id: u64, tracked: bool, depth: f64) -> BodyFrame {
        let joints = JointFrame::from_joints([Joint::tracked(0.0, 1.0, depth); JointType::COUNT]);
        BodyFrame::new(TrackingId(id), tracked, joints)
    }

    #[test]
    fn test_untracked_slots_are_ignored() {
        let mut registry = TrackedBodyRegistry::new();
        let mut recorder = Recorder::default();

        let outcome = registry.reconcile(&[body(7, false, 2.0), body(8, true, 2.0)], &mut recorder);

        assert_eq!(outcome.created, vec![TrackingId(8)]);
        assert!(!registry.contains(TrackingId(7)));
    }

    #[test]
    fn test_handles_survive_across_ticks() {
        let mut registry = TrackedBodyRegistry::new();
        let mut recorder = Recorder::default();

        registry.reconcile(&[body(1, true, 2.0)], &mut recorder);
        let outcome = registry.reconcile(&[body(1, true, 2.5)], &mut recorder);

        assert_eq!(outcome, ReconcileOutcome::default());
        let tracked = registry.get(TrackingId(1)).unwrap();
        assert_eq!(tracked.handle, 1);
        assert!((tracked.last_frame.position(JointType::Head).z - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tick_removes_everything() {
        let mut registry = TrackedBodyRegistry::new();
        let mut recorder = Recorder::default();

        registry.reconcile(&[body(1, true, 2.0), body(2, true, 2.0)], &mut recorder);
        let outcome = registry.reconcile(&[], &mut recorder);

        assert_eq!(outcome.removed, vec![TrackingId(1), TrackingId(2)]);
        assert!(registry.is_empty());
        assert_eq!(recorder.destroyed.len(), 2);
    }

    #[test]
    fn test_new_bodies_get_fresh_repetition_machine() {
        let config = RepetitionConfig::new(0.0, 1.0, 2).unwrap();
        let mut registry = TrackedBodyRegistry::new().with_repetition(config);
        registry.reconcile(&[body(3, true, 2.0)], &mut IdentityLifecycle);

        let machine = registry.get(TrackingId(3)).unwrap().repetition.as_ref().unwrap();
        assert_eq!(machine.half_cycles_remaining(), 4);
    }

    #[test]
    fn test_closest_first_orders_by_depth() {
        let bodies = [body(1, true, 3.0), body(2, true, f64::NAN), body(3, true, 1.5)];
        let tracked: Vec<&BodyFrame> = bodies.iter().collect();

        let selected = closest_first(2).select(&tracked);
        let ids: Vec<u64> = selected.iter().map(|b| b.tracking_id.0).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_sensor_order_limits() {
        let bodies = [body(4, true, 2.0), body(5, true, 2.0), body(6, true, 2.0)];
        let tracked: Vec<&BodyFrame> = bodies.iter().collect();

        assert_eq!(SensorOrder::single().select(&tracked).len(), 1);
        assert_eq!(SensorOrder::up_to(2).select(&tracked).len(), 2);
        assert_eq!(SensorOrder::all().select(&tracked).len(), 3);
    }
}
