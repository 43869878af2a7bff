//! Handler functions.
//!
//! A handler is any async function of the shape
//!
//! ```text
//! async fn name(update: Arc<Update>, ctx: Arc<Context>, p1: P1, ..., pn: Pn) -> R
//! ```
//!
//! where every `Pi` implements [`FromScope`] and `R` implements
//! [`HandlerOutput`]. The [`Handler`] trait is implemented for such functions
//! with up to 16 extra parameters, in the style of Axum's handlers.
//!
//! Output is written one item at a time into an injected [`Answers`] sink; a
//! handler may also return answers, which are realized after it finishes.
//!
//! ```rust,ignore
//! async fn greet(update: Arc<Update>, _ctx: Arc<Context>, out: Answers, users: Inject<UserStore>) {
//!     let name = users.name_of(update.effective_user_id());
//!     out.send(format!("Hello, {name}!")).await;
//!     out.send(Answer::edit("(edited)")).await;
//! }
//! ```
//!
//! [`Answers`]: crate::Answers

use std::future::Future;
use std::sync::Arc;

use botty_core::{Answer, BoxError, Update};
use futures::future::BoxFuture;
use tracing::debug;

use crate::context::Context;
use crate::di::{FromScope, RequestScope, resolve_parameter};
use crate::error::{InvocationError, ResolveError, ResolveResult};
use crate::processor::ResponseProcessor;

/// What a handler body finally evaluates to: answers to realize after it
/// returns, or the error it failed with.
pub type HandlerOutcome = Result<Vec<Answer>, BoxError>;

// ============================================================================
// HandlerOutput
// ============================================================================

/// Types a handler may return.
pub trait HandlerOutput: Send + 'static {
    fn into_outcome(self) -> HandlerOutcome;
}

impl HandlerOutput for () {
    fn into_outcome(self) -> HandlerOutcome {
        Ok(Vec::new())
    }
}

impl HandlerOutput for Answer {
    fn into_outcome(self) -> HandlerOutcome {
        Ok(vec![self])
    }
}

impl HandlerOutput for Vec<Answer> {
    fn into_outcome(self) -> HandlerOutcome {
        Ok(self)
    }
}

impl<T: HandlerOutput> HandlerOutput for Option<T> {
    fn into_outcome(self) -> HandlerOutcome {
        self.map_or_else(|| Ok(Vec::new()), HandlerOutput::into_outcome)
    }
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: HandlerOutput,
    E: Into<BoxError> + Send + 'static,
{
    fn into_outcome(self) -> HandlerOutcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// An invocable handler.
///
/// Invocation is split in two: [`prepare`](Self::prepare) resolves every
/// parameter against the scope and yields the handler body as a future that
/// has not started yet. A resolution failure therefore surfaces before the
/// body can emit anything.
pub trait Handler<T>: Clone + Send + Sync + 'static {
    fn prepare<'a>(
        &'a self,
        scope: &'a RequestScope,
        name: &'a str,
    ) -> BoxFuture<'a, ResolveResult<BoxFuture<'static, HandlerOutcome>>>;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce(Arc<Update>, Arc<Context>, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: HandlerOutput,
            $( $ty: FromScope, )*
        {
            fn prepare<'a>(
                &'a self,
                scope: &'a RequestScope,
                name: &'a str,
            ) -> BoxFuture<'a, ResolveResult<BoxFuture<'static, HandlerOutcome>>> {
                Box::pin(async move {
                    $(
                        let $ty = resolve_parameter::<$ty>(scope, name).await?;
                    )*

                    let handler = self.clone();
                    let update = Arc::clone(scope.update());
                    let context = Arc::clone(scope.context());
                    let body: BoxFuture<'static, HandlerOutcome> = Box::pin(async move {
                        handler(update, context, $($ty,)*).await.into_outcome()
                    });
                    Ok::<_, ResolveError>(body)
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

// ============================================================================
// Invocation
// ============================================================================

/// Runs `handler` once against `scope`.
///
/// In order: every parameter is resolved, the chat to answer in is
/// determined, then the body runs while the response processor realizes its
/// output. Any failure before the body starts means no transport call was
/// made.
///
/// The scope's session is left alone; ending it is the caller's job
/// ([`RequestScope::finish`]).
pub async fn invoke<H, T>(handler: &H, scope: &RequestScope, name: &str) -> Result<(), InvocationError>
where
    H: Handler<T>,
{
    let body = handler.prepare(scope, name).await?;
    let chat_id = scope.update().chat_id()?;
    let stream = scope
        .take_stream()
        .ok_or_else(|| InvocationError::ScopeConsumed(name.to_string()))?;

    debug!(handler = name, chat_id, "Running handler");
    let processor = ResponseProcessor::new(
        Arc::clone(scope.app().registry()),
        Arc::clone(scope.context().client()),
    );
    processor
        .drive(body, stream, chat_id, name)
        .await
        .map_err(|source| InvocationError::Handler {
            handler: name.to_string(),
            source,
        })
}
