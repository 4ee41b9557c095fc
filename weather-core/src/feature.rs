//! State machines behind each screen of the app.
//!
//! Every feature is a plain struct with a synchronous `reduce` that applies
//! one action and returns descriptions of the async work it wants done. The
//! [`Store`](crate::store::Store) executes those effects and feeds their
//! completions back in as actions.

pub mod app;
pub mod search;
pub mod weather;

/// Identifies one issued request so that a late completion can be told
/// apart from the response to the latest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocate the id following `self`.
    pub(crate) fn advance(&mut self) -> RequestId {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
