//! Drop-zone matching for in-flight drags.
//!
//! Zones live in a [`DropRegistry`] owned by the embedding (one per grid, or
//! one shared across several). Each drag interaction snapshots its candidate
//! set into a [`DropTracker`], which the embedding pumps with pointer
//! samples and a millisecond clock. Evaluation is coalesced to a poll
//! interval, idles while the pointer is still, and reports winner-set
//! transitions through a [`DropSink`]: `drop_start` (vetoable), `drop_end`,
//! and the final `drop` on release.

use log::debug;

use crate::geom::Point;
use crate::geom::Region;

/// How a candidate zone is scored against the pointer and drag proxy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DropTolerance {
    /// Pointer inside the zone wins outright; otherwise falls back to the
    /// overlap area with the proxy.
    #[default]
    Intersect,
    /// Overlap area between zone and proxy.
    Overlap,
    /// Zone must fully contain the proxy.
    Fit,
    /// Zone must contain the proxy's center point.
    Middle,
}

#[derive(Clone, Copy, Debug)]
pub struct DropOptions {
    pub tolerance: DropTolerance,
    /// Maximum number of simultaneous winners.
    pub multi: usize,
    /// Poll coalescing interval in ms.
    pub poll_interval: u64,
}

impl Default for DropOptions {
    fn default() -> Self {
        Self {
            tolerance: DropTolerance::Intersect,
            multi: 1,
            poll_interval: 20,
        }
    }
}

struct ZoneEntry<Z> {
    id: Z,
    region: Region,
    active: bool,
    index: u64,
}

/// Registry of drop zones with stable registration order.
pub struct DropRegistry<Z> {
    zones: Vec<ZoneEntry<Z>>,
    next_index: u64,
}

impl<Z: PartialEq> DropRegistry<Z> {
    pub fn new() -> Self {
        Self {
            zones: Vec::new(),
            next_index: 0,
        }
    }

    pub fn register(&mut self, id: Z, region: Region) {
        let index = self.next_index;
        self.next_index += 1;
        self.zones.push(ZoneEntry {
            id,
            region,
            active: true,
            index,
        });
    }

    pub fn unregister(&mut self, id: &Z) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != *id);
        self.zones.len() != before
    }

    pub fn update_region(&mut self, id: &Z, region: Region) -> bool {
        match self.zones.iter_mut().find(|z| z.id == *id) {
            Some(z) => {
                z.region = region;
                true
            }
            None => false,
        }
    }

    /// Inactive zones stay registered but are skipped when interactions
    /// snapshot their candidates.
    pub fn set_active(&mut self, id: &Z, active: bool) -> bool {
        match self.zones.iter_mut().find(|z| z.id == *id) {
            Some(z) => {
                z.active = active;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl<Z: PartialEq> Default for DropRegistry<Z> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives winner-set transitions from a [`DropTracker`].
pub trait DropSink<Z> {
    /// A zone is about to become a winner. Return `false` to veto; the zone
    /// is skipped for this pass and re-evaluated on the next one.
    fn drop_start(&mut self, zone: &Z) -> bool {
        let _ = zone;
        true
    }

    /// A zone left the winner set.
    fn drop_end(&mut self, zone: &Z) {
        let _ = zone;
    }

    /// Fired per winner when the interaction ends over it.
    fn drop(&mut self, zone: &Z) {
        let _ = zone;
    }
}

/// A winner-set change computed by one poll, for logging or assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropTransition<Z> {
    pub started: Vec<Z>,
    pub ended: Vec<Z>,
}

struct Candidate<Z> {
    id: Z,
    region: Region,
    index: u64,
}

type Sample = (Point, Region);

/// Per-interaction matcher over a candidate snapshot.
pub struct DropTracker<Z> {
    options: DropOptions,
    candidates: Vec<Candidate<Z>>,
    winners: Vec<usize>,
    next_poll: Option<u64>,
    pending: Option<Sample>,
    evaluated: Option<Sample>,
}

impl<Z: Clone + PartialEq> DropTracker<Z> {
    /// Snapshot the active zones that pass `accept` into a new tracker.
    pub fn begin(
        registry: &DropRegistry<Z>,
        options: DropOptions,
        accept: impl Fn(&Z) -> bool,
    ) -> Self {
        let candidates = registry
            .zones
            .iter()
            .filter(|z| z.active && accept(&z.id))
            .map(|z| Candidate {
                id: z.id.clone(),
                region: z.region,
                index: z.index,
            })
            .collect();
        Self {
            options,
            candidates,
            winners: Vec::new(),
            next_poll: None,
            pending: None,
            evaluated: None,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn winners(&self) -> Vec<&Z> {
        self.winners.iter().map(|i| &self.candidates[*i].id).collect()
    }

    /// Polling is parked until the next [`Self::note_move`].
    pub fn is_idle(&self) -> bool {
        self.next_poll.is_none()
    }

    /// Instant of the next pending poll, if one is scheduled.
    pub fn deadline(&self) -> Option<u64> {
        self.next_poll
    }

    /// Record the latest pointer position and proxy rectangle. Resumes
    /// polling when it had gone idle.
    pub fn note_move(&mut self, now: u64, pointer: Point, proxy: Region) {
        self.pending = Some((pointer, proxy));
        if self.next_poll.is_none() {
            self.next_poll = Some(now);
        }
    }

    /// Evaluate the candidate set if a poll is due. Returns the transition
    /// when an evaluation ran.
    pub fn tick(&mut self, now: u64, sink: &mut impl DropSink<Z>) -> Option<DropTransition<Z>> {
        let deadline = self.next_poll?;
        if now < deadline {
            return None;
        }
        let Some(sample) = self.pending else {
            self.next_poll = None;
            return None;
        };
        if self.evaluated == Some(sample) {
            // pointer unchanged between two polls: park until the next move
            self.next_poll = None;
            return None;
        }
        self.evaluated = Some(sample);
        self.next_poll = Some(now + self.options.poll_interval);

        let (pointer, proxy) = sample;
        let mut ranked: Vec<(usize, i64)> = self
            .candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let score = tolerance_score(self.options.tolerance, &c.region, pointer, &proxy);
                (score > 0).then_some((i, score))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(self.candidates[a.0].index.cmp(&self.candidates[b.0].index))
        });
        let want: Vec<usize> = ranked
            .iter()
            .take(self.options.multi)
            .map(|(i, _)| *i)
            .collect();

        let mut transition = DropTransition {
            started: Vec::new(),
            ended: Vec::new(),
        };
        let old = std::mem::take(&mut self.winners);
        for i in &old {
            if !want.contains(i) {
                sink.drop_end(&self.candidates[*i].id);
                transition.ended.push(self.candidates[*i].id.clone());
            }
        }
        for i in want {
            if old.contains(&i) {
                self.winners.push(i);
                continue;
            }
            if sink.drop_start(&self.candidates[i].id) {
                self.winners.push(i);
                transition.started.push(self.candidates[i].id.clone());
            }
        }
        if !transition.started.is_empty() || !transition.ended.is_empty() {
            debug!(
                "drop winners changed: +{} -{}",
                transition.started.len(),
                transition.ended.len()
            );
        }
        Some(transition)
    }

    /// Finish the interaction: every current winner receives `drop`, in rank
    /// order, and the tracker resets.
    pub fn end(&mut self, sink: &mut impl DropSink<Z>) {
        for i in std::mem::take(&mut self.winners) {
            sink.drop(&self.candidates[i].id);
        }
        self.reset();
    }

    /// Abort the interaction: winners receive `drop_end`, nothing receives
    /// `drop`.
    pub fn cancel(&mut self, sink: &mut impl DropSink<Z>) {
        for i in std::mem::take(&mut self.winners) {
            sink.drop_end(&self.candidates[i].id);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.next_poll = None;
        self.pending = None;
        self.evaluated = None;
    }
}

// Scores dominated by a pointer hit still rank among themselves by overlap.
const POINTER_HIT: i64 = i64::MAX / 4;

fn tolerance_score(
    tolerance: DropTolerance,
    zone: &Region,
    pointer: Point,
    proxy: &Region,
) -> i64 {
    match tolerance {
        DropTolerance::Intersect => {
            let overlap = zone.overlap_area(proxy);
            if zone.contains(pointer) {
                POINTER_HIT + overlap
            } else {
                overlap
            }
        }
        DropTolerance::Overlap => zone.overlap_area(proxy),
        DropTolerance::Fit => i64::from(zone.contains_region(proxy)),
        DropTolerance::Middle => i64::from(zone.contains(proxy.center())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecSink {
        events: Vec<String>,
        veto: Option<&'static str>,
    }

    impl DropSink<&'static str> for RecSink {
        fn drop_start(&mut self, zone: &&'static str) -> bool {
            if self.veto == Some(zone) {
                self.events.push(format!("veto {zone}"));
                return false;
            }
            self.events.push(format!("start {zone}"));
            true
        }

        fn drop_end(&mut self, zone: &&'static str) {
            self.events.push(format!("end {zone}"));
        }

        fn drop(&mut self, zone: &&'static str) {
            self.events.push(format!("drop {zone}"));
        }
    }

    fn registry() -> DropRegistry<&'static str> {
        let mut r = DropRegistry::new();
        r.register("a", Region::from_size(0, 0, 10, 10));
        r.register("b", Region::from_size(20, 0, 10, 10));
        r.register("c", Region::from_size(40, 0, 10, 10));
        r
    }

    fn overlap_options(multi: usize) -> DropOptions {
        DropOptions {
            tolerance: DropTolerance::Overlap,
            multi,
            poll_interval: 20,
        }
    }

    #[test]
    fn ranks_by_overlap_then_registration_order() {
        // proxy x 6..42 overlaps a by 4x10, b by 10x10, c by 2x10
        let mut t = DropTracker::begin(&registry(), overlap_options(3), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(15, 5), Region::from_size(6, 0, 36, 10));
        let tr = t.tick(0, &mut sink).unwrap();
        assert_eq!(tr.started, vec!["b", "a", "c"]);
        assert_eq!(t.winners(), vec![&"b", &"a", &"c"]);
    }

    #[test]
    fn equal_scores_break_ties_by_registration() {
        let mut r = DropRegistry::new();
        r.register("late", Region::from_size(0, 0, 10, 10));
        r.register("early", Region::from_size(0, 0, 10, 10));
        // same region, same overlap; "late" registered first wins
        let mut t = DropTracker::begin(&r, overlap_options(1), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        let tr = t.tick(0, &mut sink).unwrap();
        assert_eq!(tr.started, vec!["late"]);
    }

    #[test]
    fn intersect_pointer_hit_beats_bigger_overlap() {
        let mut r = DropRegistry::new();
        r.register("big", Region::from_size(0, 0, 100, 10));
        r.register("small", Region::from_size(50, 20, 10, 10));
        let options = DropOptions {
            tolerance: DropTolerance::Intersect,
            multi: 1,
            poll_interval: 20,
        };
        let mut t = DropTracker::begin(&r, options, |_| true);
        let mut sink = RecSink::default();
        // proxy overlaps "big" far more, but the pointer sits inside "small"
        t.note_move(0, Point::new(55, 25), Region::from_size(0, 0, 100, 30));
        let tr = t.tick(0, &mut sink).unwrap();
        assert_eq!(tr.started, vec!["small"]);
    }

    #[test]
    fn fit_requires_full_containment() {
        let options = DropOptions {
            tolerance: DropTolerance::Fit,
            multi: 3,
            poll_interval: 20,
        };
        let mut t = DropTracker::begin(&registry(), options, |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(2, 2, 6, 6));
        let tr = t.tick(0, &mut sink).unwrap();
        assert_eq!(tr.started, vec!["a"]);
    }

    #[test]
    fn middle_requires_center_containment() {
        let options = DropOptions {
            tolerance: DropTolerance::Middle,
            multi: 3,
            poll_interval: 20,
        };
        let mut t = DropTracker::begin(&registry(), options, |_| true);
        let mut sink = RecSink::default();
        // proxy center at (25, 5) is inside b only
        t.note_move(0, Point::new(0, 0), Region::from_size(15, 0, 20, 10));
        let tr = t.tick(0, &mut sink).unwrap();
        assert_eq!(tr.started, vec!["b"]);
    }

    #[test]
    fn winner_change_fires_end_then_start() {
        let mut t = DropTracker::begin(&registry(), overlap_options(1), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        t.tick(0, &mut sink);
        t.note_move(10, Point::new(25, 5), Region::from_size(20, 0, 10, 10));
        t.tick(20, &mut sink);
        assert_eq!(sink.events, vec!["start a", "end a", "start b"]);
    }

    #[test]
    fn veto_demotes_for_the_pass_and_reoffers_later() {
        let mut t = DropTracker::begin(&registry(), overlap_options(1), |_| true);
        let mut sink = RecSink {
            veto: Some("a"),
            ..Default::default()
        };
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        t.tick(0, &mut sink);
        assert!(t.winners().is_empty());
        // subscriber stops vetoing; the next evaluated move offers it again
        sink.veto = None;
        t.note_move(20, Point::new(6, 5), Region::from_size(1, 0, 10, 10));
        t.tick(20, &mut sink);
        assert_eq!(t.winners(), vec![&"a"]);
    }

    #[test]
    fn polling_idles_when_pointer_is_still_and_resumes_on_move() {
        let mut t = DropTracker::begin(&registry(), overlap_options(1), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        assert!(t.tick(0, &mut sink).is_some());
        // same sample: evaluation short-circuits and polling parks
        assert!(t.tick(20, &mut sink).is_none());
        assert!(t.is_idle());
        assert!(t.tick(40, &mut sink).is_none());
        t.note_move(60, Point::new(6, 5), Region::from_size(1, 0, 10, 10));
        assert!(!t.is_idle());
        assert!(t.tick(60, &mut sink).is_some());
    }

    #[test]
    fn poll_coalesces_to_interval() {
        let mut t = DropTracker::begin(&registry(), overlap_options(1), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        assert!(t.tick(0, &mut sink).is_some());
        t.note_move(5, Point::new(6, 5), Region::from_size(1, 0, 10, 10));
        // due at 20, not before
        assert!(t.tick(10, &mut sink).is_none());
        assert!(t.tick(20, &mut sink).is_some());
    }

    #[test]
    fn end_delivers_drop_to_winners() {
        let mut t = DropTracker::begin(&registry(), overlap_options(2), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(4, 0, 20, 10));
        t.tick(0, &mut sink);
        t.end(&mut sink);
        assert!(sink.events.contains(&"drop a".to_string()));
        assert!(sink.events.contains(&"drop b".to_string()));
        assert!(t.winners().is_empty());
        assert!(t.is_idle());
    }

    #[test]
    fn cancel_ends_winners_without_drop() {
        let mut t = DropTracker::begin(&registry(), overlap_options(1), |_| true);
        let mut sink = RecSink::default();
        t.note_move(0, Point::new(5, 5), Region::from_size(0, 0, 10, 10));
        t.tick(0, &mut sink);
        t.cancel(&mut sink);
        assert_eq!(sink.events, vec!["start a", "end a"]);
    }

    #[test]
    fn candidate_filter_and_inactive_zones() {
        let mut r = registry();
        r.set_active(&"b", false);
        let t = DropTracker::begin(&r, overlap_options(1), |z| *z != "c");
        assert_eq!(t.candidate_count(), 1);
    }
}
