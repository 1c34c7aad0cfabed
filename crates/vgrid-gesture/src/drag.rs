//! Pointer drag recognition.
//!
//! A [`DragSensor`] consumes pointer samples from the embedding and produces
//! the drag life cycle: an `Init` pass when the configured button goes down,
//! a `Start` pass per target once the pointer travels past the distance
//! threshold, a `Drag` pass per live target for every subsequent sample, and
//! an `End` pass per live target on release. Phases are delivered through a
//! caller-supplied dispatch closure; the [`DragPass`] handed to it carries
//! the cancellation controls:
//!
//! - cancelling the `Init` pass aborts the whole interaction before any
//!   further phase fires;
//! - `Init` may replace the pressed target with an arbitrary set of targets,
//!   each tracked with its own live flag from then on;
//! - cancelling a `Start` or `Drag` pass drops only that target, the rest of
//!   the interaction continues.
//!
//! Release tears the interaction down unconditionally; `End` fires only if
//! the threshold had been crossed.

use log::debug;

use crate::geom::Point;

/// Pointer button a sensor reacts to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Clone, Copy, Debug)]
pub struct DragOptions {
    /// Button that arms the sensor; presses with any other button are
    /// ignored.
    pub button: PointerButton,
    /// Minimum travel, in px, before a press becomes a drag. Compared in
    /// squared space; `0` starts on the first move.
    pub distance: u32,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            button: PointerButton::Primary,
            distance: 0,
        }
    }
}

/// Drag life-cycle phase carried by a [`DragPass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Init,
    Start,
    Drag,
    End,
}

/// One phase delivery. Holds the sample geometry plus the per-pass controls
/// a subscriber may exercise.
pub struct DragPass<'a, T> {
    pub phase: DragPhase,
    pub origin: Point,
    pub at: Point,
    target: Option<&'a T>,
    cancelled: bool,
    replacement: Option<Vec<T>>,
}

impl<'a, T> DragPass<'a, T> {
    fn new(phase: DragPhase, origin: Point, at: Point, target: Option<&'a T>) -> Self {
        Self {
            phase,
            origin,
            at,
            target,
            cancelled: false,
            replacement: None,
        }
    }

    /// Target this pass is addressed to. `Init` reports the pressed target.
    pub fn target(&self) -> Option<&T> {
        self.target
    }

    /// Pointer travel since the press.
    pub fn delta(&self) -> (i32, i32) {
        (self.at.x - self.origin.x, self.at.y - self.origin.y)
    }

    /// On `Init`: abort the interaction. On `Start`/`Drag`: drop this target
    /// from the rest of the interaction. Ignored on `End`.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Replace the interaction's target set. Only honored on `Init`.
    pub fn set_targets(&mut self, targets: Vec<T>) {
        self.replacement = Some(targets);
    }
}

struct LiveTarget<T> {
    target: T,
    alive: bool,
}

struct Interaction<T> {
    origin: Point,
    last: Point,
    targets: Vec<LiveTarget<T>>,
}

enum SensorState<T> {
    Idle,
    Pressed(Interaction<T>),
    Dragging(Interaction<T>),
}

/// Single-pointer drag state machine.
pub struct DragSensor<T> {
    options: DragOptions,
    state: SensorState<T>,
}

impl<T> DragSensor<T> {
    pub fn new(options: DragOptions) -> Self {
        Self {
            options,
            state: SensorState::Idle,
        }
    }

    pub fn options(&self) -> DragOptions {
        self.options
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SensorState::Dragging(_))
    }

    /// A press has been accepted and not yet released.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, SensorState::Idle)
    }

    pub fn origin(&self) -> Option<Point> {
        match &self.state {
            SensorState::Idle => None,
            SensorState::Pressed(it) | SensorState::Dragging(it) => Some(it.origin),
        }
    }

    pub fn position(&self) -> Option<Point> {
        match &self.state {
            SensorState::Idle => None,
            SensorState::Pressed(it) | SensorState::Dragging(it) => Some(it.last),
        }
    }

    /// Targets still live in the current interaction, in init order.
    pub fn live_targets(&self) -> impl Iterator<Item = &T> {
        let targets = match &self.state {
            SensorState::Idle => &[][..],
            SensorState::Pressed(it) | SensorState::Dragging(it) => it.targets.as_slice(),
        };
        targets.iter().filter(|t| t.alive).map(|t| &t.target)
    }

    /// Drop the interaction without dispatching anything. For when the
    /// embedding loses pointer capture.
    pub fn cancel(&mut self) {
        self.state = SensorState::Idle;
    }

    fn threshold_sq(&self) -> i64 {
        let d = i64::from(self.options.distance);
        d * d
    }

    /// Feed a button press. Returns `true` when the press armed the sensor;
    /// `false` when the button did not match or the `Init` pass was
    /// cancelled.
    pub fn press(
        &mut self,
        at: Point,
        button: PointerButton,
        target: T,
        mut dispatch: impl FnMut(&mut DragPass<'_, T>),
    ) -> bool {
        if button != self.options.button || self.is_active() {
            return false;
        }
        let (cancelled, replacement) = {
            let mut pass = DragPass::new(DragPhase::Init, at, at, Some(&target));
            dispatch(&mut pass);
            (pass.cancelled, pass.replacement)
        };
        if cancelled {
            self.state = SensorState::Idle;
            return false;
        }
        let targets = match replacement {
            Some(set) => set
                .into_iter()
                .map(|target| LiveTarget {
                    target,
                    alive: true,
                })
                .collect(),
            None => vec![LiveTarget {
                target,
                alive: true,
            }],
        };
        self.state = SensorState::Pressed(Interaction {
            origin: at,
            last: at,
            targets,
        });
        true
    }

    /// Feed a pointer move. Returns `true` when any phase was dispatched.
    pub fn pointer_move(
        &mut self,
        at: Point,
        mut dispatch: impl FnMut(&mut DragPass<'_, T>),
    ) -> bool {
        match std::mem::replace(&mut self.state, SensorState::Idle) {
            SensorState::Idle => false,
            SensorState::Pressed(mut it) => {
                it.last = at;
                if it.origin.distance_sq(at) >= self.threshold_sq() {
                    debug!(
                        "drag started at {:?} ({} target(s))",
                        at,
                        it.targets.len()
                    );
                    dispatch_each(&mut it, DragPhase::Start, at, &mut dispatch);
                    dispatch_each(&mut it, DragPhase::Drag, at, &mut dispatch);
                    self.state = SensorState::Dragging(it);
                    true
                } else {
                    self.state = SensorState::Pressed(it);
                    false
                }
            }
            SensorState::Dragging(mut it) => {
                it.last = at;
                dispatch_each(&mut it, DragPhase::Drag, at, &mut dispatch);
                self.state = SensorState::Dragging(it);
                true
            }
        }
    }

    /// Feed a button release. Returns `true` when a drag was in progress
    /// (an `End` pass fired per live target). State is reset either way.
    pub fn release(
        &mut self,
        at: Point,
        mut dispatch: impl FnMut(&mut DragPass<'_, T>),
    ) -> bool {
        match std::mem::replace(&mut self.state, SensorState::Idle) {
            SensorState::Idle | SensorState::Pressed(_) => false,
            SensorState::Dragging(mut it) => {
                it.last = at;
                debug!("drag ended at {:?}", at);
                dispatch_each(&mut it, DragPhase::End, at, &mut dispatch);
                true
            }
        }
    }
}

fn dispatch_each<T>(
    it: &mut Interaction<T>,
    phase: DragPhase,
    at: Point,
    dispatch: &mut impl FnMut(&mut DragPass<'_, T>),
) {
    for lt in it.targets.iter_mut() {
        if !lt.alive {
            continue;
        }
        let cancelled = {
            let mut pass = DragPass::new(phase, it.origin, at, Some(&lt.target));
            dispatch(&mut pass);
            pass.cancelled
        };
        if cancelled && phase != DragPhase::End {
            lt.alive = false;
        }
    }
}
