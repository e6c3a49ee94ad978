//! Event source adapter: fills a shared buffer once per iteration.

use std::cell::RefCell;
use std::rc::Rc;

use cap_config::{Configuration, Scope};
use cap_core::errors::CapError;
use cap_core::status::Status;

use crate::context::RunContext;
use crate::stage::Stage;
use crate::task::TaskCore;

/// Result of one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The buffer holds a new event.
    Event,
    /// The current file is exhausted.
    EndOfFile,
    /// All input is exhausted.
    EndOfData,
}

/// Producer of events into a caller-owned buffer.
pub trait EventReader<B> {
    /// Default parameters merged at the source's scope.
    fn defaults(&self) -> Vec<(&'static str, cap_config::ParamValue)> {
        Vec::new()
    }

    /// Prepares the reader; called once from `initialize`.
    fn open(&mut self, _params: cap_config::ScopedView<'_>) -> Result<(), CapError> {
        Ok(())
    }

    /// Reads the next event into `buffer`.
    fn read_next(&mut self, buffer: &mut B) -> Result<ReadOutcome, CapError>;
}

/// Stage wrapping an [`EventReader`]; analyzers share its buffer.
pub struct SourceTask<R, B> {
    core: TaskCore,
    reader: R,
    buffer: Rc<RefCell<B>>,
}

impl<R: EventReader<B>, B: Default> SourceTask<R, B> {
    /// Creates a source called `name` below `parent` with a fresh buffer.
    pub fn new(name: &str, parent: &Scope, reader: R) -> Result<Self, CapError> {
        Ok(Self {
            core: TaskCore::new("SourceTask", name, parent)?,
            reader,
            buffer: Rc::new(RefCell::new(B::default())),
        })
    }
}

impl<R, B> SourceTask<R, B> {
    /// Handle to the shared event buffer.
    pub fn buffer(&self) -> Rc<RefCell<B>> {
        Rc::clone(&self.buffer)
    }

    /// The wrapped reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: EventReader<B>, B> Stage for SourceTask<R, B> {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn define_defaults(&self, config: &mut Configuration) -> Result<(), CapError> {
        for (name, value) in self.reader.defaults() {
            config.merge_default(self.core.scope(), name, value);
        }
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        self.reader.open(ctx.config().view(self.core.scope()))
    }

    fn execute(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        let outcome = self.reader.read_next(&mut self.buffer.borrow_mut())?;
        match outcome {
            ReadOutcome::Event => self.core.counters_mut().increment_processed(),
            ReadOutcome::EndOfFile => ctx.post(
                Status::EndOfFile,
                self.core.site("execute"),
                "end of input file",
            ),
            ReadOutcome::EndOfData => ctx.post(
                Status::EndOfData,
                self.core.site("execute"),
                format!("end of data after {} events", self.core.counters().total_since_start),
            ),
        }
        Ok(())
    }
}
