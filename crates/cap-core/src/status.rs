//! Run-wide status token and reporting sites.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Status of a run. Ordered by severity, so `max` keeps the worst one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Nothing to report.
    #[default]
    Ok,
    /// Logged, execution continues.
    Warning,
    /// Input file exhausted (control signal).
    EndOfFile,
    /// Input data exhausted (control signal).
    EndOfData,
    /// Aborts the remainder of the current phase dispatch.
    Error,
    /// Terminates the run at the next checkpoint.
    Fatal,
}

impl Status {
    /// Returns true for OK.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Returns true when dispatching may proceed. Warnings are logged but do not gate.
    pub fn allows_dispatch(self) -> bool {
        self <= Status::Warning
    }

    /// Returns true for END_OF_DATA / END_OF_FILE.
    pub fn is_end_of_input(self) -> bool {
        matches!(self, Status::EndOfData | Status::EndOfFile)
    }

    /// Returns true for ERROR / FATAL.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Error | Status::Fatal)
    }

    /// Stable uppercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::EndOfFile => "END_OF_FILE",
            Status::EndOfData => "END_OF_DATA",
            Status::Error => "ERROR",
            Status::Fatal => "FATAL",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a status was raised: component kind, instance path and operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Component kind, e.g. `IteratorDriver`.
    pub component: String,
    /// Instance identifier, usually the task path.
    pub instance: String,
    /// Operation or phase being executed.
    pub operation: String,
}

impl Site {
    /// Creates a new reporting site.
    pub fn new(
        component: impl Into<String>,
        instance: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            instance: instance.into(),
            operation: operation.into(),
        }
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]::{}", self.component, self.instance, self.operation)
    }
}

/// Last status raised on a run together with its site and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Reported status.
    pub status: Status,
    /// Reporting site.
    pub site: Site,
    /// Free-form diagnostic.
    pub message: String,
}

/// Single status token shared by a whole task tree.
///
/// Posting only ever worsens the status; [`StatusToken::reset_to_ok`] is the one
/// way back to [`Status::Ok`].
#[derive(Debug, Clone, Default)]
pub struct StatusToken {
    current: Status,
    last: Option<StatusReport>,
}

impl StatusToken {
    /// Creates a token in the OK state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn current(&self) -> Status {
        self.current
    }

    /// Shorthand for `current().is_ok()`.
    pub fn is_ok(&self) -> bool {
        self.current.is_ok()
    }

    /// Shorthand for `current().allows_dispatch()`.
    pub fn allows_dispatch(&self) -> bool {
        self.current.allows_dispatch()
    }

    /// Most recent report that changed or matched the current status.
    pub fn last_report(&self) -> Option<&StatusReport> {
        self.last.as_ref()
    }

    /// Posts a status with its reporting context and logs it.
    pub fn post(&mut self, status: Status, site: Site, message: impl Into<String>) {
        if status == Status::Ok {
            return;
        }
        let message = message.into();
        match status {
            Status::Ok => {}
            Status::Warning => tracing::warn!(
                component = %site.component,
                instance = %site.instance,
                operation = %site.operation,
                "{message}"
            ),
            Status::EndOfFile | Status::EndOfData => tracing::info!(
                component = %site.component,
                instance = %site.instance,
                operation = %site.operation,
                status = %status,
                "{message}"
            ),
            Status::Error | Status::Fatal => tracing::error!(
                component = %site.component,
                instance = %site.instance,
                operation = %site.operation,
                status = %status,
                "{message}"
            ),
        }
        if status >= self.current {
            self.current = status;
            self.last = Some(StatusReport {
                status,
                site,
                message,
            });
        }
    }

    /// Clears the token back to OK.
    pub fn reset_to_ok(&mut self) {
        self.current = Status::Ok;
        self.last = None;
    }
}
