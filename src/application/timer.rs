//! Nested activity timing.
//!
//! The [`ActivityTimer`] owns one tracker's stack of in-flight activities.
//! Starting an activity pushes it and records its parent and depth; stopping
//! pops it and stamps the stop time. The stack is strictly LIFO: only the
//! innermost open activity may be stopped, and violating that order is a
//! surfaced [`StateError`], never a silent reorder.

use std::sync::Arc;

use super::ports::Clock;
use crate::domain::activity::{Activity, ActivityId, StateError};
use crate::domain::event::Event;

/// Stack of in-flight activities for one tracker.
///
/// Not internally synchronized; the tracker wraps it in a mutex.
#[derive(Debug)]
pub struct ActivityTimer {
    clock: Arc<dyn Clock>,
    stack: Vec<Activity>,
}

impl ActivityTimer {
    /// Create an idle timer.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            stack: Vec::new(),
        }
    }

    /// Start an activity and push it onto the stack.
    ///
    /// The activity's parent is the currently innermost open activity, its
    /// depth the number of activities already open.
    ///
    /// # Returns
    /// The started activity's identifier.
    ///
    /// # Errors
    /// Propagates [`StateError::AlreadyStarted`] / `AlreadyStopped` when the
    /// caller hands in an activity that has already run.
    pub fn start(&mut self, mut activity: Activity) -> Result<ActivityId, StateError> {
        let parent_id = self.current_id();
        activity.set_nesting(parent_id, self.stack.len());
        activity.start_at(self.clock.now(), self.clock.wall_now())?;

        let id = activity.id();
        self.stack.push(activity);
        Ok(id)
    }

    /// Stop the activity with the given identifier and pop it.
    ///
    /// # Returns
    /// The stopped activity, with its stop timestamps stamped.
    ///
    /// # Errors
    /// * [`StateError::NoActiveActivity`] when nothing is open
    /// * [`StateError::OutOfOrderStop`] when `id` is open but not innermost;
    ///   the stack is left untouched
    pub fn stop(&mut self, id: ActivityId) -> Result<Activity, StateError> {
        let current = self.stack.last_mut().ok_or(StateError::NoActiveActivity)?;
        if current.id() != id {
            return Err(StateError::OutOfOrderStop {
                expected: current.id(),
                requested: id,
            });
        }
        current.stop_at(self.clock.now(), self.clock.wall_now())?;

        // Unreachable None: the stack was non-empty above and nothing popped
        // since.
        self.stack.pop().ok_or(StateError::NoActiveActivity)
    }

    /// Route a finished event to the innermost open activity.
    ///
    /// # Returns
    /// `None` when the event was attached; `Some(event)` handed back when no
    /// activity is open, for standalone dispatch by the caller.
    ///
    /// # Errors
    /// Returns [`StateError::NotStopped`] for an event still running.
    pub fn attach_event(&mut self, event: Event) -> Result<Option<Event>, StateError> {
        if !event.is_stopped() {
            return Err(StateError::NotStopped);
        }
        match self.stack.last_mut() {
            Some(current) => {
                current.add_event(event)?;
                Ok(None)
            }
            None => Ok(Some(event)),
        }
    }

    /// Identifier of the innermost open activity, if any.
    pub fn current_id(&self) -> Option<ActivityId> {
        self.stack.last().map(Activity::id)
    }

    /// Number of open activities.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether no activity is open.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }
}
