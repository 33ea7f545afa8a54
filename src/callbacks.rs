use crate::clause::Lit;

/// Receives notifications about lower-level state changes during conflict
/// resolution.
///
/// The propagator calls each method exactly once per assignment undone or
/// newly forced below the conflicting decision level. Undoing the
/// conflicting level itself is implicit and never reported.
///
/// This is a one-way notification channel: a handler must not call back
/// into the propagator that is notifying it.
pub trait AssignmentHandler {
    /// A previously true literal was unassigned by backjumping.
    fn assignment_undone(&mut self, _l: Lit) {}

    /// A literal became true through the learnt clause or the propagation
    /// that follows it.
    fn assignment_forced(&mut self, _l: Lit) {}
}

/// Handler that ignores every notification.
impl AssignmentHandler for () {}

/// Handler that records the notification stream; mostly useful in tests and
/// debugging.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub undone: Vec<Lit>,
    pub forced: Vec<Lit>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.undone.clear();
        self.forced.clear();
    }
}

impl AssignmentHandler for EventLog {
    fn assignment_undone(&mut self, l: Lit) {
        self.undone.push(l);
    }
    fn assignment_forced(&mut self, l: Lit) {
        self.forced.push(l);
    }
}
