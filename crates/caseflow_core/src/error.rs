use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Convenient result alias for caseflow_core.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Log/handling importance. Maps onto logging levels in the runtime crate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Where an error came from (helps triage and routing).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Domain {
    Lifecycle,
    Sentry,
    Rule,
    Tree,
    Config,
    Other,
}

/// Stable error "kind" for matching/branching.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    AlreadyInTargetState,
    UnexpectedState,
    AlreadyClosed,
    WrongState,
    NotCaseInstance,
    ImpossibleTransition,
    MissingActivity,
    UnknownInstance,
    ChildrenNotFinished,
    CascadeDepthExceeded,
    RuleEvaluation,
    InvalidArgument,
    Other,
}

/// Optional structured payload for rich context without forcing allocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    None,

    /// Generic key/value context.
    Context {
        key: &'static str,
        value: Cow<'static, str>,
    },

    /// Guard context: compact ids of the transition and the states involved.
    StateTransition {
        transition: u8,
        current: u8,
        target: u8,
    },

    /// Arbitrary numeric detail (instance ids, depths).
    Code(u64),
}

/// The one error type that crosses module boundaries in caseflow_core.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{severity:?}: {message}")]
pub struct CoreError {
    pub domain: Domain,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: Cow<'static, str>,
    pub payload: Payload,
}

impl CoreError {
    /// Fully-specified constructor (rarely needed at call sites).
    pub fn new(
        domain: Domain,
        kind: ErrorKind,
        severity: Severity,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            domain,
            kind,
            severity,
            message: message.into(),
            payload: Payload::None,
        }
    }

    // ---------------- Fluent entry points ----------------

    #[inline]
    pub fn debug() -> ErrB {
        ErrB::new(Severity::Debug)
    }
    #[inline]
    pub fn warn() -> ErrB {
        ErrB::new(Severity::Warn)
    }
    #[inline]
    pub fn error() -> ErrB {
        ErrB::new(Severity::Error)
    }
    #[inline]
    pub fn fatal() -> ErrB {
        ErrB::new(Severity::Fatal)
    }

    // ---------------- Lifecycle failures ----------------

    /// The instance already is in the state the transition would lead to.
    pub fn already_in_target_state(
        transition: &'static str,
        instance: impl fmt::Display,
        transition_id: u8,
        current: u8,
        target: &'static str,
        target_id: u8,
    ) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::AlreadyInTargetState)
            .msgf(format_args!(
                "cannot perform '{transition}' on case execution '{instance}': already in state '{target}'"
            ))
            .payload(Payload::StateTransition {
                transition: transition_id,
                current,
                target: target_id,
            })
            .build()
    }

    /// The instance is neither in the expected nor in the target state.
    pub fn unexpected_state(
        transition: &'static str,
        instance: impl fmt::Display,
        transition_id: u8,
        expected: impl fmt::Display,
        actual: &'static str,
        actual_id: u8,
        target_id: u8,
    ) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::UnexpectedState)
            .msgf(format_args!(
                "cannot perform '{transition}' on case execution '{instance}': expected state '{expected}' but was '{actual}'"
            ))
            .payload(Payload::StateTransition {
                transition: transition_id,
                current: actual_id,
                target: target_id,
            })
            .build()
    }

    pub fn already_closed(transition: &'static str, instance: impl fmt::Display) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::AlreadyClosed)
            .msgf(format_args!(
                "cannot perform '{transition}' on case instance '{instance}': already closed"
            ))
            .build()
    }

    pub fn wrong_state(
        transition: &'static str,
        instance: impl fmt::Display,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::WrongState)
            .msgf(format_args!(
                "cannot perform '{transition}' on case instance '{instance}': expected one of {expected} but was '{actual}'"
            ))
            .build()
    }

    pub fn not_case_instance(transition: &'static str, instance: impl fmt::Display) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::NotCaseInstance)
            .msgf(format_args!(
                "cannot perform '{transition}' on case execution '{instance}': not a case instance"
            ))
            .build()
    }

    pub fn impossible_transition(transition: &'static str, instance: impl fmt::Display) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::ImpossibleTransition)
            .msgf(format_args!(
                "transition '{transition}' is not possible on case execution '{instance}'"
            ))
            .build()
    }

    /// Internal invariant violation: an instance without a bound definition.
    pub fn missing_activity(instance: impl fmt::Display) -> Self {
        CoreError::fatal()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::MissingActivity)
            .msgf(format_args!("case execution '{instance}' has no current activity"))
            .build()
    }

    pub fn children_not_finished(transition: &'static str, instance: impl fmt::Display) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::ChildrenNotFinished)
            .msgf(format_args!(
                "cannot perform '{transition}' on case execution '{instance}': it has unfinished children"
            ))
            .build()
    }

    // ---------------- Tree failures ----------------

    pub fn unknown_instance(instance: u64) -> Self {
        CoreError::warn()
            .domain(Domain::Tree)
            .kind(ErrorKind::UnknownInstance)
            .msgf(format_args!("no case execution with id '{instance}'"))
            .payload(Payload::Code(instance))
            .build()
    }

    pub fn cascade_depth_exceeded(limit: usize) -> Self {
        CoreError::error()
            .domain(Domain::Tree)
            .kind(ErrorKind::CascadeDepthExceeded)
            .msgf(format_args!(
                "cascade exceeded the maximum depth of {limit} nested transitions"
            ))
            .payload(Payload::Code(limit as u64))
            .build()
    }
}

/// Fluent builder that behaves like iterator chains (takes self, returns Self).
/// Defaults:
/// - domain = Other
/// - kind = Other
/// - message = ""
/// - payload = None
#[derive(Debug, Clone)]
pub struct ErrB {
    domain: Domain,
    kind: ErrorKind,
    severity: Severity,
    message: Cow<'static, str>,
    payload: Payload,
}

impl ErrB {
    #[inline]
    fn new(severity: Severity) -> Self {
        Self {
            domain: Domain::Other,
            kind: ErrorKind::Other,
            severity,
            message: Cow::Borrowed(""),
            payload: Payload::None,
        }
    }

    #[inline]
    pub fn domain(mut self, d: Domain) -> Self {
        self.domain = d;
        self
    }

    #[inline]
    pub fn kind(mut self, k: ErrorKind) -> Self {
        self.kind = k;
        self
    }

    #[inline]
    pub fn msg(mut self, m: impl Into<Cow<'static, str>>) -> Self {
        self.message = m.into();
        self
    }

    /// Formatting-friendly message setter.
    #[inline]
    pub fn msgf(mut self, args: fmt::Arguments<'_>) -> Self {
        self.message = Cow::Owned(args.to_string());
        self
    }

    /// Only one payload: this replaces any previous payload (default is None).
    #[inline]
    pub fn payload(mut self, p: Payload) -> Self {
        self.payload = p;
        self
    }

    #[inline]
    pub fn build(self) -> CoreError {
        CoreError {
            domain: self.domain,
            kind: self.kind,
            severity: self.severity,
            message: self.message,
            payload: self.payload,
        }
    }
}

impl From<ErrB> for CoreError {
    fn from(b: ErrB) -> Self {
        b.build()
    }
}
