use crate::intersection::FlowState;
use crate::{LaneId, LaneSet};

/// The signal state machine controlling one flow through an intersection.
#[derive(Clone, Debug)]
pub struct TrafficLightFsm {
    /// The current state.
    state: SignalState,
    /// The time spent in the current green phase, in s.
    elapsed: f64,
    /// How long the flow stays green, in s.
    green_duration: f64,
    /// The flow that takes over once this one has cleared.
    successor: FlowState,
    /// The connector lanes controlled by this signal.
    lanes: Vec<LaneId>,
}

/// The state of a traffic signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalState {
    /// Vehicles may enter the flow's connector lanes.
    Go,
    /// No more vehicles may enter; waiting for the connectors to clear.
    WaitForEmpty,
}

impl TrafficLightFsm {
    /// Creates a signal in the `Go` state.
    pub fn new(green_duration: f64, successor: FlowState, lanes: Vec<LaneId>) -> Self {
        Self {
            state: SignalState::Go,
            elapsed: 0.0,
            green_duration,
            successor,
            lanes,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn successor(&self) -> FlowState {
        self.successor
    }

    /// The connector lanes controlled by the signal.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// Whether vehicles may currently enter the flow's connector lanes.
    pub fn permits_entry(&self) -> bool {
        self.state == SignalState::Go
    }

    /// Advances the signal by `dt` seconds.
    ///
    /// Returns the flow that should take over once the signal has finished its cycle,
    /// at which point it is reset to `Go` for the next time it becomes active.
    pub fn update(&mut self, dt: f64, lanes: &LaneSet) -> Option<FlowState> {
        match self.state {
            SignalState::Go => {
                self.elapsed += dt;
                if self.elapsed >= self.green_duration {
                    self.state = SignalState::WaitForEmpty;
                }
                None
            }
            SignalState::WaitForEmpty => {
                let clear = self
                    .lanes
                    .iter()
                    .all(|id| lanes.get(*id).map_or(true, |lane| lane.is_empty()));
                if !clear {
                    return None;
                }
                self.state = SignalState::Go;
                self.elapsed = 0.0;
                Some(self.successor)
            }
        }
    }
}
