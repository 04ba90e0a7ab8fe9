//! 请求生命周期扩展点
//!
//! | 扩展点 | 时机 | 可接管响应 |
//! |--------|------|------------|
//! | OnRequest | 路由匹配之前 | 是 (返回 `Err(Response)`) |
//! | OnPreHandler | 认证之后、处理器之前 | 是 |
//! | OnPreResponse | 响应发出之前 | 可改写响应 |
//!
//! 同一扩展点的多个钩子按注册顺序执行。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::request::Parts;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

/// Snapshot of the request line and headers, taken when the request arrives.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub received_at: Instant,
}

impl RequestSummary {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            headers: parts.headers.clone(),
            received_at: Instant::now(),
        }
    }

    pub fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            headers: req.headers().clone(),
            received_at: Instant::now(),
        }
    }

    /// Headers as a JSON object. Repeated headers are joined with `", "`.
    pub fn headers_json(&self) -> String {
        let mut map = Map::new();
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            map.insert(name.as_str().to_string(), Value::String(joined));
        }
        Value::Object(map).to_string()
    }
}

pub type RequestHook =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Request, Response>> + Send + Sync>;

pub type ResponseHook =
    Arc<dyn Fn(Arc<RequestSummary>, Response) -> BoxFuture<'static, Response> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtPoint {
    OnRequest,
    OnPreHandler,
    OnPreResponse,
}

#[derive(Clone)]
enum Hook {
    OnRequest(RequestHook),
    OnPreHandler(RequestHook),
    OnPreResponse(ResponseHook),
}

/// A hook bound to one lifecycle point.
#[derive(Clone)]
pub struct Extension {
    hook: Hook,
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("point", &self.point())
            .finish_non_exhaustive()
    }
}

impl Extension {
    pub fn on_request<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Request, Response>> + Send + 'static,
    {
        Self {
            hook: Hook::OnRequest(Arc::new(move |req| f(req).boxed())),
        }
    }

    pub fn on_pre_handler<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Request, Response>> + Send + 'static,
    {
        Self {
            hook: Hook::OnPreHandler(Arc::new(move |req| f(req).boxed())),
        }
    }

    pub fn on_pre_response<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestSummary>, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            hook: Hook::OnPreResponse(Arc::new(move |summary, res| f(summary, res).boxed())),
        }
    }

    pub fn point(&self) -> ExtPoint {
        match self.hook {
            Hook::OnRequest(_) => ExtPoint::OnRequest,
            Hook::OnPreHandler(_) => ExtPoint::OnPreHandler,
            Hook::OnPreResponse(_) => ExtPoint::OnPreResponse,
        }
    }
}

/// Registered hooks, grouped by point in registration order.
#[derive(Clone, Default)]
pub(crate) struct ExtensionChain {
    on_request: Vec<RequestHook>,
    on_pre_handler: Vec<RequestHook>,
    on_pre_response: Vec<ResponseHook>,
}

impl ExtensionChain {
    pub(crate) fn push(&mut self, extension: Extension) {
        match extension.hook {
            Hook::OnRequest(hook) => self.on_request.push(hook),
            Hook::OnPreHandler(hook) => self.on_pre_handler.push(hook),
            Hook::OnPreResponse(hook) => self.on_pre_response.push(hook),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.on_request.len() + self.on_pre_handler.len() + self.on_pre_response.len()
    }

    /// Whether any router-level hook (OnRequest / OnPreResponse) is registered.
    pub(crate) fn has_outer(&self) -> bool {
        !self.on_request.is_empty() || !self.on_pre_response.is_empty()
    }

    pub(crate) fn pre_handler(&self) -> Option<Arc<[RequestHook]>> {
        (!self.on_pre_handler.is_empty()).then(|| Arc::from(self.on_pre_handler.as_slice()))
    }
}

/// Router-level middleware running OnRequest and OnPreResponse hooks.
pub(crate) async fn run_extensions(
    State(chain): State<Arc<ExtensionChain>>,
    req: Request,
    next: Next,
) -> Response {
    let summary = Arc::new(RequestSummary::from_request(&req));

    let mut req = req;
    for hook in &chain.on_request {
        req = match hook(req).await {
            Ok(req) => req,
            Err(takeover) => return respond(&chain, summary, takeover).await,
        };
    }

    let response = next.run(req).await;
    respond(&chain, summary, response).await
}

async fn respond(
    chain: &ExtensionChain,
    summary: Arc<RequestSummary>,
    mut response: Response,
) -> Response {
    for hook in &chain.on_pre_response {
        response = hook(summary.clone(), response).await;
    }
    response
}

/// Per-route middleware running OnPreHandler hooks.
pub(crate) async fn run_pre_handler(
    State(hooks): State<Arc<[RequestHook]>>,
    req: Request,
    next: Next,
) -> Response {
    let mut req = req;
    for hook in hooks.iter() {
        req = match hook(req).await {
            Ok(req) => req,
            Err(takeover) => return takeover,
        };
    }
    next.run(req).await
}
