/// Stable case execution states.
///
/// Transient work (suspending, terminating) is never encoded here; it is
/// tracked by [`TransientMarker`] on top of a stable state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CaseExecutionState {
    New,
    Available,
    Enabled,
    Disabled,
    Active,
    Suspended,
    Terminated,
    Completed,
    Failed,
    Closed,
}

/// Compact IDs used for error payloads and journal records.
impl CaseExecutionState {
    pub const fn id(self) -> u8 {
        match self {
            CaseExecutionState::New => 0,
            CaseExecutionState::Available => 1,
            CaseExecutionState::Enabled => 2,
            CaseExecutionState::Disabled => 3,
            CaseExecutionState::Active => 4,
            CaseExecutionState::Suspended => 5,
            CaseExecutionState::Terminated => 6,
            CaseExecutionState::Completed => 7,
            CaseExecutionState::Failed => 8,
            CaseExecutionState::Closed => 9,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CaseExecutionState::New => "new",
            CaseExecutionState::Available => "available",
            CaseExecutionState::Enabled => "enabled",
            CaseExecutionState::Disabled => "disabled",
            CaseExecutionState::Active => "active",
            CaseExecutionState::Suspended => "suspended",
            CaseExecutionState::Terminated => "terminated",
            CaseExecutionState::Completed => "completed",
            CaseExecutionState::Failed => "failed",
            CaseExecutionState::Closed => "closed",
        }
    }

    /// True for states no further work leaves (except reactivation/close).
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            CaseExecutionState::Terminated
                | CaseExecutionState::Completed
                | CaseExecutionState::Failed
                | CaseExecutionState::Closed
        )
    }

    /// States that count as "done" for stage completion.
    pub const fn is_finished(self) -> bool {
        matches!(
            self,
            CaseExecutionState::Disabled
                | CaseExecutionState::Completed
                | CaseExecutionState::Terminated
        )
    }
}

impl std::fmt::Display for CaseExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical list of all stable states.
pub const ALL_STATES: [CaseExecutionState; 10] = [
    CaseExecutionState::New,
    CaseExecutionState::Available,
    CaseExecutionState::Enabled,
    CaseExecutionState::Disabled,
    CaseExecutionState::Active,
    CaseExecutionState::Suspended,
    CaseExecutionState::Terminated,
    CaseExecutionState::Completed,
    CaseExecutionState::Failed,
    CaseExecutionState::Closed,
];

/// Marker set while a suspend/terminate walk is in flight.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TransientMarker {
    Suspending,
    Terminating,
}

impl TransientMarker {
    /// Stable state the in-flight operation settles into.
    pub const fn destination(self) -> CaseExecutionState {
        match self {
            TransientMarker::Suspending => CaseExecutionState::Suspended,
            TransientMarker::Terminating => CaseExecutionState::Terminated,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TransientMarker::Suspending => "suspending",
            TransientMarker::Terminating => "terminating",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Transient {
    marker: TransientMarker,
    previous: CaseExecutionState,
}

/// Stable state plus an optional transient marker.
///
/// `previous_state()` is `Some` exactly when a marker is set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExecutionState {
    current: CaseExecutionState,
    transient: Option<Transient>,
}

impl ExecutionState {
    pub const fn new() -> Self {
        Self::stable(CaseExecutionState::New)
    }

    pub const fn stable(current: CaseExecutionState) -> Self {
        Self {
            current,
            transient: None,
        }
    }

    /// Rebuild a persisted state. A `previous` without a marker is dropped.
    pub fn from_parts(
        current: CaseExecutionState,
        marker: Option<TransientMarker>,
        previous: Option<CaseExecutionState>,
    ) -> Self {
        Self {
            current,
            transient: marker.map(|marker| Transient {
                marker,
                previous: previous.unwrap_or(current),
            }),
        }
    }

    pub const fn current(&self) -> CaseExecutionState {
        self.current
    }

    pub fn transient_marker(&self) -> Option<TransientMarker> {
        self.transient.map(|t| t.marker)
    }

    pub fn previous_state(&self) -> Option<CaseExecutionState> {
        self.transient.map(|t| t.previous)
    }

    /// The state guards reason about: the pre-transient state while a
    /// marker is set, otherwise the stable state.
    pub fn effective(&self) -> CaseExecutionState {
        match self.transient {
            Some(t) => t.previous,
            None => self.current,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transient.is_some()
    }

    pub fn is_suspending(&self) -> bool {
        self.transient_marker() == Some(TransientMarker::Suspending)
    }

    pub fn is_terminating(&self) -> bool {
        self.transient_marker() == Some(TransientMarker::Terminating)
    }

    pub(crate) fn begin_transient(&mut self, marker: TransientMarker) {
        self.transient = Some(Transient {
            marker,
            previous: self.current,
        });
    }

    /// Move to a stable state, clearing any marker.
    pub(crate) fn settle(&mut self, state: CaseExecutionState) {
        self.current = state;
        self.transient = None;
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}
