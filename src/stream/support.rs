//! Producer-side collaborator hooks
//!
//! The bridge never talks to the engine directly. It calls out through a
//! [`StreamSupport`] when it wants more data and when the consumer is done.

/// Hooks the bridge invokes on the producer side
///
/// Both calls are made without the bridge lock held, so implementations may
/// take their own locks or call back into the producer handle.
#[cfg_attr(test, mockall::automock)]
pub trait StreamSupport: Send + Sync {
    /// Ask a suspended channel to resume delivering data
    ///
    /// Must be safe to call when the channel is already delivering.
    fn resume(&self);

    /// Release the underlying channel; called once when the bridge closes
    fn close(&self) {}
}

/// Support for producers without flow control
impl StreamSupport for () {
    fn resume(&self) {}
}

/// Adapter turning a resume closure into a [`StreamSupport`]
pub struct ResumeFn<F>(F);

impl<F> StreamSupport for ResumeFn<F>
where
    F: Fn() + Send + Sync,
{
    fn resume(&self) {
        (self.0)()
    }
}

/// Build a [`StreamSupport`] that only handles resume requests
pub fn resume_fn<F>(f: F) -> ResumeFn<F>
where
    F: Fn() + Send + Sync,
{
    ResumeFn(f)
}
