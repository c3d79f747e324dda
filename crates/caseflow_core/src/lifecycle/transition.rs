/// Plan item lifecycle transitions.
///
/// These double as the standard events sentry on-parts listen for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Transition {
    Create,
    Enable,
    Disable,
    Reenable,
    Start,
    ManualStart,
    Complete,
    ManualComplete,
    Occur,
    Terminate,
    ParentTerminate,
    Exit,
    Suspend,
    ParentSuspend,
    Resume,
    ParentResume,
    Reactivate,
    Fault,
    Close,
}

/// Compact IDs used for error payloads.
impl Transition {
    pub const fn id(self) -> u8 {
        match self {
            Transition::Create => 1,
            Transition::Enable => 2,
            Transition::Disable => 3,
            Transition::Reenable => 4,
            Transition::Start => 5,
            Transition::ManualStart => 6,
            Transition::Complete => 7,
            Transition::ManualComplete => 8,
            Transition::Occur => 9,
            Transition::Terminate => 10,
            Transition::ParentTerminate => 11,
            Transition::Exit => 12,
            Transition::Suspend => 13,
            Transition::ParentSuspend => 14,
            Transition::Resume => 15,
            Transition::ParentResume => 16,
            Transition::Reactivate => 17,
            Transition::Fault => 18,
            Transition::Close => 19,
        }
    }

    /// Standard event name, as used in case models.
    pub const fn label(self) -> &'static str {
        match self {
            Transition::Create => "create",
            Transition::Enable => "enable",
            Transition::Disable => "disable",
            Transition::Reenable => "reenable",
            Transition::Start => "start",
            Transition::ManualStart => "manualStart",
            Transition::Complete => "complete",
            Transition::ManualComplete => "manualComplete",
            Transition::Occur => "occur",
            Transition::Terminate => "terminate",
            Transition::ParentTerminate => "parentTerminate",
            Transition::Exit => "exit",
            Transition::Suspend => "suspend",
            Transition::ParentSuspend => "parentSuspend",
            Transition::Resume => "resume",
            Transition::ParentResume => "parentResume",
            Transition::Reactivate => "reactivate",
            Transition::Fault => "fault",
            Transition::Close => "close",
        }
    }

    /// Transitions driven by an ancestor or a sentry rather than a request
    /// on the instance itself; never allowed on the case instance.
    pub const fn is_propagated(self) -> bool {
        matches!(
            self,
            Transition::ParentTerminate
                | Transition::Exit
                | Transition::ParentSuspend
                | Transition::ParentResume
        )
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical list of all transitions.
pub const ALL_TRANSITIONS: [Transition; 19] = [
    Transition::Create,
    Transition::Enable,
    Transition::Disable,
    Transition::Reenable,
    Transition::Start,
    Transition::ManualStart,
    Transition::Complete,
    Transition::ManualComplete,
    Transition::Occur,
    Transition::Terminate,
    Transition::ParentTerminate,
    Transition::Exit,
    Transition::Suspend,
    Transition::ParentSuspend,
    Transition::Resume,
    Transition::ParentResume,
    Transition::Reactivate,
    Transition::Fault,
    Transition::Close,
];
