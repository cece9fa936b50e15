// src/interceptor.rs

//! Statement interceptor chain
//!
//! Every statement a session runs passes through an ordered list of
//! handlers. A handler either claims the statement or hands it to the rest
//! of the chain through [`Next`]. The last link executes against SQLite.

use crate::error::{Error, Result};
use crate::executor::StandardExecutor;
use crate::extension::intercept::TleInterceptor;
use crate::extension::native::NativeExtensionHandler;
use crate::session::Session;
use crate::sql::{QueryResult, Statement};
use std::fmt;

/// Where a statement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Typed by a client
    Client,
    /// One statement of an extension install or update script
    ExtensionScript,
    /// The engine creating, replacing or dropping its own virtual files
    ArtifactMutation,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Client => "client",
            Origin::ExtensionScript => "extension script",
            Origin::ArtifactMutation => "artifact mutation",
        };
        write!(f, "{}", name)
    }
}

/// One link of the chain
pub trait StatementHandler {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    /// Handle `stmt`, or pass it on with `next.run(...)`
    fn handle(
        &self,
        session: &mut Session,
        stmt: Statement,
        origin: Origin,
        next: Next<'_>,
    ) -> Result<QueryResult>;
}

/// The handlers after the current one
pub struct Next<'a> {
    rest: &'a [Box<dyn StatementHandler>],
}

impl<'a> Next<'a> {
    pub fn run(self, session: &mut Session, stmt: Statement, origin: Origin) -> Result<QueryResult> {
        match self.rest.split_first() {
            Some((handler, rest)) => {
                tracing::trace!("{} <- {} ({})", handler.name(), stmt.tag(), origin);
                handler.handle(session, stmt, origin, Next { rest })
            }
            None => Err(Error::Internal(format!(
                "no handler accepted {} statement",
                stmt.tag()
            ))),
        }
    }
}

/// Ordered list of handlers
pub struct InterceptorChain {
    handlers: Vec<Box<dyn StatementHandler>>,
}

impl InterceptorChain {
    pub fn new(handlers: Vec<Box<dyn StatementHandler>>) -> Self {
        Self { handlers }
    }

    /// Stored-extension interceptor, then file-based extensions, then SQLite
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(TleInterceptor),
            Box::new(NativeExtensionHandler),
            Box::new(StandardExecutor),
        ])
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn run(&self, session: &mut Session, stmt: Statement, origin: Origin) -> Result<QueryResult> {
        Next {
            rest: &self.handlers,
        }
        .run(session, stmt, origin)
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::standard()
    }
}
