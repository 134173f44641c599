use std::time::Duration;

/// Handle on the transport's asynchronous processing context.
///
/// Opened by the transport when a request arrives and released exactly once
/// by the engine's completion guard. Implementations must tolerate calls
/// from whichever thread finishes the request - worker or transport.
pub trait AsyncContext: Send + Sync {
    /// Arm (or disarm, with `None`) the transport-level request timeout.
    ///
    /// When the timeout fires the transport is expected to call
    /// [`Dispatcher::on_timeout`](crate::dispatcher::Dispatcher::on_timeout);
    /// if the request already completed, that call is a harmless no-op.
    fn set_timeout(&self, timeout: Option<Duration>);

    /// Signal the transport that the response is finished and the
    /// connection resources can be released.
    ///
    /// Called exactly once per request by the completion guard.
    fn complete(&self);
}
