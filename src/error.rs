use std::cell::Cell;
use std::fmt;

/// A code-generation or execution error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Operand types violate a builder's rule.
    TypeMismatch(String),
    /// Argument or variable lookup outside the valid range.
    IndexOutOfRange { index: usize, len: usize },
    /// Memory exhaustion during table growth or text emission.
    Allocation,
    /// Builder called on a closed kernel, or similar misuse.
    Usage(String),
    /// A backend or hardware feature is absent or was compiled out.
    ResourceUnavailable(String),
    /// An execution adapter's compiler or driver rejected the program.
    /// `message` carries the adapter diagnostic (e.g. a build log).
    Backend { backend: String, message: String },
}

/// Discriminant of an [`Error`], kept in the thread-local last-error slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    None,
    TypeMismatch,
    IndexOutOfRange,
    Allocation,
    Usage,
    ResourceUnavailable,
    Backend,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::Allocation => ErrorKind::Allocation,
            Error::Usage(_) => ErrorKind::Usage,
            Error::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            Error::Backend { .. } => ErrorKind::Backend,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch(msg) => write!(f, "{}: {}", describe(self.kind()), msg),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "{}: {} (length {})", describe(self.kind()), index, len)
            }
            Error::Allocation => write!(f, "{}", describe(self.kind())),
            Error::Usage(msg) => write!(f, "{}: {}", describe(self.kind()), msg),
            Error::ResourceUnavailable(what) => {
                write!(f, "{}: {}", describe(self.kind()), what)
            }
            Error::Backend { backend, message } => {
                if message.is_empty() {
                    write!(f, "{} ({})", describe(self.kind()), backend)
                } else {
                    write!(f, "{}: {}", backend, message)
                }
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable human-readable phrase for an error kind. Backend failures
/// defer to the adapter's own diagnostic when one is attached to the
/// error value; this is the generic fallback.
pub fn describe(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::None => "success",
        ErrorKind::TypeMismatch => "wrong type",
        ErrorKind::IndexOutOfRange => "index out of range",
        ErrorKind::Allocation => "out of memory",
        ErrorKind::Usage => "invalid kernel use",
        ErrorKind::ResourceUnavailable => "function or implementation not available",
        ErrorKind::Backend => "backend compilation or execution failed",
    }
}

thread_local! {
    static LAST_ERROR: Cell<ErrorKind> = const { Cell::new(ErrorKind::None) };
}

/// Kind of the most recent fallible operation on this thread.
///
/// Overwritten by every fallible call (including successful ones, which
/// store [`ErrorKind::None`]); read it before making another fallible
/// call. Prefer the `Result` value itself — this exists for call sites
/// that cannot change their signature.
pub fn last_error() -> ErrorKind {
    LAST_ERROR.with(|slot| slot.get())
}

/// Record the outcome of a fallible operation in the thread-local slot
/// and pass it through unchanged.
pub(crate) fn track<T>(res: Result<T>) -> Result<T> {
    let kind = match &res {
        Ok(_) => ErrorKind::None,
        Err(e) => e.kind(),
    };
    LAST_ERROR.with(|slot| slot.set(kind));
    res
}
