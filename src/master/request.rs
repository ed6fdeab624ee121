//! Queued build requests.

/// A request for one build on a specific builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Request id, unique within the master.
    pub id: u64,
    /// Somebody (usually a parent build) is waiting on this request's result.
    pub waited_for: bool,
}

impl BuildRequest {
    /// A request nobody is waiting on.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            waited_for: false,
        }
    }

    /// Marks the request as explicitly waited for.
    pub fn waited_for(mut self, waited_for: bool) -> Self {
        self.waited_for = waited_for;
        self
    }
}
