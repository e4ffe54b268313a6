//! A cooperative, single-threaded task runner.
//!
//! Hosts like editors and game loops usually give you a single "update"
//! callback and not much else. The [`TaskRunner`] lets you write a chain of
//! asynchronous steps (list the MatCaps, then fetch each preview) as
//! [`Routine`]s which get advanced a little bit on every
//! [`TaskRunner::tick()`].
//!
//! # Examples
//!
//! ```rust
//! use matcap_cache::runner::{from_fn, TaskRunner, TaskState, Yield};
//!
//! let mut runner = TaskRunner::new();
//! let mut ticks_left = 2;
//!
//! let handle = runner.start(from_fn(move || {
//!     if ticks_left == 0 {
//!         return Ok(Yield::Done);
//!     }
//!     ticks_left -= 1;
//!     Ok(Yield::NextTick)
//! }));
//!
//! assert_eq!(handle.state(), TaskState::Yielded);
//! runner.tick();
//! runner.tick();
//! assert_eq!(handle.state(), TaskState::Completed);
//! assert!(runner.is_empty());
//! ```

mod operation;
mod routine;

pub use operation::{spawn, Operation, Pending, Slot};
pub use routine::{from_fn, FromFn, Routine, Sequence, Yield};

use crate::error::describe;
use std::{
    cell::Cell,
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

/// Where a task is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Registered but not started yet. [`TaskRunner::start()`] always runs
    /// a task before returning, so this is never seen from outside.
    Pending,
    /// Currently being resumed.
    Running,
    /// Waiting for an [`Operation`] to complete.
    Suspended,
    /// Waiting for the next tick.
    Yielded,
    /// Ran to completion.
    Completed,
    /// Stopped by [`TaskRunner::cancel()`].
    Cancelled,
    /// One of its routines returned an error.
    Faulted,
}

impl TaskState {
    /// Has the task stopped for good?
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Faulted
        )
    }
}

/// A unique identifier for a task started by a [`TaskRunner`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// A reference to a task started with [`TaskRunner::start()`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    state: Rc<Cell<TaskState>>,
}

impl TaskHandle {
    /// The task's identifier.
    pub fn id(&self) -> TaskId { self.id }

    /// What the task is doing right now.
    pub fn state(&self) -> TaskState { self.state.get() }

    /// Has the task stopped for good?
    pub fn is_finished(&self) -> bool { self.state().is_finished() }
}

struct Task {
    id: TaskId,
    frames: Vec<Box<dyn Routine>>,
    waiting_on: Option<Box<dyn Operation>>,
    state: Rc<Cell<TaskState>>,
}

impl Task {
    /// Make one unit of progress, returning `true` while the task is still
    /// alive.
    fn advance(&mut self) -> bool {
        if let Some(op) = self.waiting_on.as_mut() {
            if !op.poll_complete() {
                return true;
            }
            self.waiting_on = None;
        }

        self.run_until_suspended()
    }

    fn run_until_suspended(&mut self) -> bool {
        self.state.set(TaskState::Running);

        loop {
            let top = match self.frames.last_mut() {
                Some(top) => top,
                None => {
                    log::debug!("Task {:?} completed", self.id);
                    self.state.set(TaskState::Completed);
                    return false;
                },
            };

            match top.resume() {
                Ok(Yield::NextTick) => {
                    self.state.set(TaskState::Yielded);
                    return true;
                },
                Ok(Yield::Await(op)) => {
                    self.waiting_on = Some(op);
                    self.state.set(TaskState::Suspended);
                    return true;
                },
                Ok(Yield::Nested(child)) => self.frames.push(child),
                Ok(Yield::Done) => {
                    self.frames.pop();
                },
                Err(fault) => {
                    log::error!(
                        "Task {:?} failed: {}",
                        self.id,
                        describe(&*fault)
                    );
                    self.release();
                    self.state.set(TaskState::Faulted);
                    return false;
                },
            }
        }
    }

    fn release(&mut self) {
        self.frames.clear();
        self.waiting_on = None;
    }
}

/// Advances [`Routine`]s whenever the host calls [`TaskRunner::tick()`].
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<Task>,
    last_id: u64,
}

impl TaskRunner {
    /// Create an empty [`TaskRunner`].
    pub fn new() -> Self { TaskRunner::default() }

    /// Start a routine, running it up to its first suspension point.
    ///
    /// A routine that finishes without suspending is never registered, and
    /// the returned handle will already report [`TaskState::Completed`] (or
    /// [`TaskState::Faulted`]).
    pub fn start<R: Routine + 'static>(&mut self, routine: R) -> TaskHandle {
        self.last_id += 1;
        let id = TaskId(self.last_id);
        let state = Rc::new(Cell::new(TaskState::Pending));

        let mut task = Task {
            id,
            frames: vec![Box::new(routine)],
            waiting_on: None,
            state: Rc::clone(&state),
        };

        if task.run_until_suspended() {
            self.tasks.push(task);
        }

        TaskHandle { id, state }
    }

    /// Give every live task a chance to make progress, in the order they
    /// were started.
    pub fn tick(&mut self) { self.tasks.retain_mut(Task::advance); }

    /// Stop a task. Its remaining steps are never run, and the result of any
    /// operation it was waiting on is ignored.
    ///
    /// Cancelling a task which has already finished does nothing.
    pub fn cancel(&mut self, handle: &TaskHandle) {
        let position = self.tasks.iter().position(|t| t.id == handle.id);

        if let Some(position) = position {
            let mut task = self.tasks.remove(position);
            task.release();
            task.state.set(TaskState::Cancelled);
            log::debug!("Task {:?} was cancelled", task.id);
        }
    }

    /// Cancel every live task.
    pub fn cancel_all(&mut self) {
        for mut task in self.tasks.drain(..) {
            task.release();
            task.state.set(TaskState::Cancelled);
        }
    }

    /// The number of live tasks.
    pub fn len(&self) -> usize { self.tasks.len() }

    /// Are there any live tasks?
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}

impl Debug for TaskRunner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.tasks.iter().map(|t| t.id).collect();
        f.debug_struct("TaskRunner")
            .field("tasks", &ids)
            .field("last_id", &self.last_id)
            .finish()
    }
}
