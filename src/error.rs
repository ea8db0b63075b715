/// Coarse classification shared by every error the crate reports, so hosts
/// can tell bad data apart from calls made in the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structurally invalid model, environment or config payload.
    Parse,
    /// A model commit was attempted without every required resource.
    IncompleteResources,
    /// Index outside the loaded model's range.
    OutOfRange,
    InvalidArgument,
    /// Call made in a state that does not allow it (no drag, no pending load).
    Misuse,
    /// Call made after the renderer was destroyed or before it was set up.
    Lifecycle,
    Engine,
    Io,
}
