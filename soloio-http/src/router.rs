//! Two-tier request router: an exact-path table for the fast case and a
//! slash-segmented trie for longest-prefix fallback.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::HttpError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::target::Target;

/// Boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, HttpError>>>>;

/// A shared request handler. Handlers are `Rc` — the router and every
/// in-flight connection task live on the same thread.
pub type Handler = Rc<dyn Fn(Request) -> HandlerFuture>;

#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    handlers: HashMap<Method, Handler>,
}

/// Method-and-path router.
///
/// Lookup tries the exact table first (for the method, then for
/// [`Method::Any`], then both again with a trailing slash), and falls
/// back to the deepest trie node with a matching handler. A handler
/// registered for a specific method always beats an `Any` handler at
/// the same node.
#[derive(Default)]
pub struct Router {
    exact: HashMap<String, HashMap<Method, Handler>>,
    trie: TrieNode,
}

/// Strip the query string and collapse duplicate slashes, so that
/// `//a/b//?q=1` and `/a/b/` share a key.
fn normalize(path: &str) -> String {
    let path = match path.find('?') {
        Some(pos) => &path[..pos],
        None => path,
    };
    let mut out = String::with_capacity(path.len());
    let mut last = '\0';
    for ch in path.chars() {
        if last == '/' && ch == '/' {
            continue;
        }
        out.push(ch);
        last = ch;
    }
    out
}

fn boxed<F, Fut>(handler: F) -> Handler
where
    F: Fn(Request) -> Fut + 'static,
    Fut: Future<Output = Result<Response, HttpError>> + 'static,
{
    Rc::new(move |req| {
        let fut: HandlerFuture = Box::pin(handler(req));
        fut
    })
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    /// Register an exact-match route. The path must start with `/`;
    /// any query string is stripped from the key.
    pub fn route<F, Fut>(&mut self, method: Method, path: &str, handler: F) -> Result<(), HttpError>
    where
        F: Fn(Request) -> Fut + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + 'static,
    {
        if !path.starts_with('/') {
            return Err(HttpError::InvalidRoute(format!(
                "path does not start with '/': {path:?}"
            )));
        }
        self.exact
            .entry(normalize(path))
            .or_default()
            .insert(method, boxed(handler));
        Ok(())
    }

    /// Register a prefix route: it matches every path below `path`
    /// unless something deeper matches. The path must start with `/`,
    /// be origin-form, and carry no query parameters.
    pub fn route_prefix<F, Fut>(
        &mut self,
        method: Method,
        path: &str,
        handler: F,
    ) -> Result<(), HttpError>
    where
        F: Fn(Request) -> Fut + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + 'static,
    {
        if !path.starts_with('/') {
            return Err(HttpError::InvalidRoute(format!(
                "path does not start with '/': {path:?}"
            )));
        }
        match Target::parse(path) {
            Ok(Target::Origin { params, .. }) if params.is_empty() => {}
            Ok(Target::Origin { .. }) => {
                return Err(HttpError::InvalidRoute(format!(
                    "prefix route cannot carry query parameters: {path:?}"
                )));
            }
            _ => {
                return Err(HttpError::InvalidRoute(format!(
                    "prefix route must be origin-form: {path:?}"
                )));
            }
        }

        let mut node = &mut self.trie;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.handlers.insert(method, boxed(handler));
        Ok(())
    }

    fn exact_lookup(&self, method: Method, key: &str) -> Option<Handler> {
        let table = self.exact.get(key)?;
        table
            .get(&method)
            .or_else(|| table.get(&Method::Any))
            .cloned()
    }

    /// Find the handler for `(method, target)`, or None — a miss is not
    /// an error; the server synthesizes a 404.
    pub fn find_route(&self, method: Method, target: &str) -> Option<Handler> {
        let key = normalize(target);

        if let Some(handler) = self.exact_lookup(method, &key) {
            return Some(handler);
        }
        if !key.ends_with('/') {
            let with_slash = format!("{key}/");
            if let Some(handler) = self.exact_lookup(method, &with_slash) {
                return Some(handler);
            }
        }

        // Trie walk: remember the deepest node with a handler for this
        // method (or Any), starting at the root.
        let pick = |node: &TrieNode| {
            node.handlers
                .get(&method)
                .or_else(|| node.handlers.get(&Method::Any))
                .cloned()
        };
        let mut node = &self.trie;
        let mut found = pick(node);
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    if let Some(handler) = pick(node) {
                        found = Some(handler);
                    }
                }
                None => break,
            }
        }
        found
    }
}
