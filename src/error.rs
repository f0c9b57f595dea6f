use std::{error, fmt, io, process};

/// Crate-wide error type. Every fallible operation reports through this
/// type so the driver can print one consistent diagnostic regardless of
/// which stage of the search failed.
#[derive(Debug)]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) repr: Repr,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn new(kind: ErrorKind, repr: Repr) -> Self {
        Self { kind, repr }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, Repr::Message(msg.into()))
    }

    pub(crate) fn message(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::new(kind, Repr::Message(msg.into()))
    }

    pub(crate) fn io(kind: ErrorKind, e: io::Error) -> Self {
        Self::new(kind, Repr::Io(e))
    }

    /// Build an error from a completed `process::Output` whose exit status
    /// was non-zero. stdout/stderr are carried along for diagnostics.
    pub(crate) fn process(kind: ErrorKind, output: process::Output) -> Self {
        Self::new(kind, Repr::UnsuccessfulExit(output))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), &self.repr)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            Repr::Io(e) => Some(e),
            Repr::UnsuccessfulExit(_) | Repr::Message(_) => None,
        }
    }
}

/// Coarse classification of what went wrong, matching the taxonomy in
/// spec.md §7: `Config` aborts before any trial runs; the rest are fatal
/// to an in-progress search.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Document parse failure, missing required attribute, out-of-range
    /// numeric, inconsistent experiment template counts, invalid algorithm
    /// name.
    Config,
    /// Template read or write failure.
    Template,
    /// Scratch input/output/result file I/O outside of template writing.
    Scratch,
    /// External simulator process exited abnormally or could not be spawned.
    Simulator,
    /// External evaluator process exited abnormally or could not be spawned.
    Evaluator,
    /// The scalar error on the first line of the output/result file could
    /// not be parsed.
    Parse,
    /// Distributed send/recv failure.
    Transport,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            Config => "configuration",
            Template => "template substitution",
            Scratch => "scratch file",
            Simulator => "simulator process",
            Evaluator => "evaluator process",
            Parse => "result parse",
            Transport => "distributed transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Repr {
    Io(io::Error),
    UnsuccessfulExit(process::Output),
    Message(String),
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::UnsuccessfulExit(output) => write!(
                f,
                "process exited with {}; stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
            Self::Message(s) => f.write_str(s),
        }
    }
}

impl fmt::Debug for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => fmt::Debug::fmt(e, f),
            Self::UnsuccessfulExit(output) => f
                .debug_struct("UnsuccessfulExit")
                .field("status", &output.status)
                .field("stdout", &String::from_utf8_lossy(&output.stdout))
                .field("stderr", &String::from_utf8_lossy(&output.stderr))
                .finish(),
            Self::Message(s) => f.debug_tuple("Message").field(s).finish(),
        }
    }
}

impl From<io::Error> for Repr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<process::Output> for Repr {
    fn from(output: process::Output) -> Self {
        Self::UnsuccessfulExit(output)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
