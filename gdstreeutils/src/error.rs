//!
//! # Error-Construction Helpers
//!
//! Tree-walkers such as binary parsers carry state (position, nesting context)
//! which belongs in every error they produce.
//! [`ErrorHelper`] routes all failures through a single `err` method which attaches that state.
//!
//! ```rust
//! use gdstreeutils::error::{ErrorHelper, Unwrapper};
//!
//! struct Cursor {
//!     pos: usize,
//! }
//! impl ErrorHelper for Cursor {
//!     type Error = String;
//!     fn err(&self, msg: impl Into<String>) -> Self::Error {
//!         format!("{} at byte {}", msg.into(), self.pos)
//!     }
//! }
//!
//! let c = Cursor { pos: 12 };
//! let e = None::<u8>.unwrapper(&c, "missing record").unwrap_err();
//! assert_eq!(e, "missing record at byte 12");
//! ```
//!

///
/// # ErrorHelper
///
/// Implementers supply `err`; the remaining methods are provided.
///
pub trait ErrorHelper {
    type Error;

    /// Create and return a [Self::Error] value.
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap the [Option] `opt` if it is [Some], and fail if not.
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Fail unless `b` holds.
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        match b {
            true => Ok(()),
            false => self.fail(msg),
        }
    }
}

///
/// # Unwrapper
///
/// Post-fix form of [`ErrorHelper::unwrap`], for [`Option`]s and [`Result`]s.
/// The error of a failing [`Result`] is discarded in favor of the helper's own.
///
pub trait Unwrapper {
    type Ok;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper;
}
impl<T> Unwrapper for Option<T> {
    type Ok = T;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        helper.unwrap(self, msg)
    }
}
impl<T, E> Unwrapper for Result<T, E> {
    type Ok = T;
    fn unwrapper<H>(
        self,
        helper: &H,
        msg: impl Into<String>,
    ) -> Result<<Self as Unwrapper>::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        helper.unwrap(self.ok(), msg)
    }
}
