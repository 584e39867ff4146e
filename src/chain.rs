//! The handler chain: an ordered pipeline of stages that a request
//! passes through on its way to a resource and back.
//!
//! Each stage receives a cursor to the rest of the chain and decides
//! whether to delegate. The chain itself is immutable once compiled;
//! adding a stage recompiles the whole chain, so no request ever
//! observes a half-built pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Error;
use crate::http::HttpResponse;
use crate::Application;

/// One stage of the chain.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error>;

    /// Stage name for logs.
    fn name(&self) -> &str {
        "handler"
    }
}

/// Cursor over the remaining stages. Consumed by `run`, so a stage can
/// delegate downstream at most once.
pub struct Next<'a> {
    handlers: &'a [Arc<dyn Handler>],
    index: usize,
}

impl Next<'_> {
    pub async fn run(
        self,
        app: &Application,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse, Error> {
        match self.handlers.get(self.index) {
            Some(handler) => {
                tracing::trace!(stage = handler.name(), "entering chain stage");
                let next = Next {
                    handlers: self.handlers,
                    index: self.index + 1,
                };
                handler.handle(app, ctx, next).await
            }
            // the terminal stage must produce a response, not delegate
            None => Err(Error::HandlerContract(
                "chain ran past its final stage".to_string(),
            )),
        }
    }
}

/// A compiled, immutable pipeline.
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Arc<[Arc<dyn Handler>]>,
}

impl HandlerChain {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run a request through the chain from the first stage.
    pub async fn execute(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse, Error> {
        Next {
            handlers: &self.handlers,
            index: 0,
        }
        .run(app, ctx)
        .await
    }

    /// Run the given stages as a one-off chain, outside the compiled
    /// pipeline. Used by the exception boundary to re-enter the tail of
    /// the chain with the error resource.
    pub async fn execute_detached(
        handlers: &[Arc<dyn Handler>],
        app: &Application,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse, Error> {
        Next { handlers, index: 0 }.run(app, ctx).await
    }
}
