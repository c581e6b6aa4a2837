//! The dispatch request carried through every layer.

use crate::DispatchContext;

/// One templated payload addressed to zero or more recipients.
///
/// This is the request type of the dispatch capability: every backend and
/// every decorator is a `tower::Service<Dispatch<T>>`. `T` is opaque to
/// the decorators and forwarded untouched. Decorators that may send the
/// same request more than once (failover, retry) require `T: Clone`; wrap
/// large payloads in an `Arc` to keep that cheap.
///
/// ```
/// use dispatch_resilience_core::Dispatch;
///
/// let sms = Dispatch::new("login_code", [("code", "481516")])
///     .to("+15550100")
///     .to("+15550101");
///
/// assert_eq!(sms.template(), "login_code");
/// assert_eq!(sms.recipients().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Dispatch<T> {
    /// Caller budget shared by every attempt of this dispatch.
    pub ctx: DispatchContext,
    /// Template name, template id, or business key.
    pub template: String,
    /// Template arguments.
    pub args: T,
    /// Recipient identifiers (phone numbers, device tokens, addresses).
    pub recipients: Vec<String>,
}

impl<T> Dispatch<T> {
    /// Creates a request with no recipients and an unbounded context.
    pub fn new(template: impl Into<String>, args: T) -> Self {
        Self {
            ctx: DispatchContext::new(),
            template: template.into(),
            args,
            recipients: Vec::new(),
        }
    }

    /// Adds one recipient.
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Adds several recipients.
    pub fn to_all<I>(mut self, recipients: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.recipients
            .extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Replaces the caller context.
    pub fn with_context(mut self, ctx: DispatchContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// The caller context.
    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    /// The template or business key.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template arguments.
    pub fn args(&self) -> &T {
        &self.args
    }

    /// The recipients.
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}
