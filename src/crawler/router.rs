use crate::crawler::Context;
use crate::url::UrlPattern;
use crate::ConfigError;
use std::sync::Arc;
use tracing::{debug, warn};

/// A response handler
///
/// Handlers run synchronously on the worker task that fetched the request.
/// Returning an error (or panicking) counts as a failed attempt.
pub type Handler = Arc<dyn Fn(&Context) -> anyhow::Result<()> + Send + Sync>;

/// Maps completed exchanges to handlers by URL pattern
///
/// # Examples
///
/// ```
/// use sumi_harvest::Router;
///
/// let mut router = Router::new();
/// router.register("/products/", |ctx| {
///     ctx.save_data(serde_json::json!({ "url": ctx.request().url().as_str() }))?;
///     Ok(())
/// });
/// router.register_regex(r"/page/\d+$", |ctx| {
///     ctx.enqueue_links()?;
///     Ok(())
/// }).unwrap();
/// router.set_default(|_ctx| Ok(()));
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(UrlPattern, Handler)>,
    default: Option<Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route; routes are tried in registration order
    pub fn register<F>(&mut self, pattern: impl Into<UrlPattern>, handler: F) -> &mut Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.routes.push((pattern.into(), Arc::new(handler)));
        self
    }

    /// Adds a route matched by regular expression
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidPattern` if the expression does not compile
    pub fn register_regex<F>(&mut self, expr: &str, handler: F) -> Result<&mut Self, ConfigError>
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let pattern = UrlPattern::regex(expr)?;
        Ok(self.register(pattern, handler))
    }

    /// Sets the handler used when no route matches
    pub fn set_default<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the first matching handler against the request URL
    ///
    /// Falls back to the default handler; with neither, the exchange is
    /// logged and dropped.
    pub fn dispatch(&self, context: &Context) -> anyhow::Result<()> {
        let url = context.request().url().as_str();

        if let Some((pattern, handler)) = self.routes.iter().find(|(p, _)| p.matches(url)) {
            debug!("Routing {} via {}", url, pattern);
            return handler(context);
        }

        match &self.default {
            Some(handler) => handler(context),
            None => {
                warn!("No route for {}", url);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field(
                "routes",
                &self.routes.iter().map(|(p, _)| p.to_string()).collect::<Vec<_>>(),
            )
            .field("default", &self.default.is_some())
            .finish()
    }
}
