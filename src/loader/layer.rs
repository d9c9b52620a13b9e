use super::options::StoredSessionLoaderOptions;
use super::scope::RequestScope;
use super::stored::StoredSessionLoader;
use crate::session::SessionRequest;
use axum::{body::Body, extract::Request, response::Response};
use futures::future::BoxFuture;
use tower::Service;

/// Tower layer that loads the stored session into each request
///
/// The session ends up in the request's [`RequestScope`] extension, where
/// [`CurrentSession`] and [`RequireSession`] find it. Cookie changes made
/// while loading (a refreshed ticket, a removed session) are written to the
/// response as `Set-Cookie` headers.
///
/// [`CurrentSession`]: super::CurrentSession
/// [`RequireSession`]: super::RequireSession
///
/// # Example
///
/// ```rust,ignore
/// let store = SessionConfig::from_env().build_store()?;
/// let options = StoredSessionLoaderOptions::new(store, Arc::new(MyProvider::new()))
///     .refresh_period(Duration::from_secs(3600));
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(StoredSessionLoaderLayer::new(options));
/// ```
#[derive(Clone)]
pub struct StoredSessionLoaderLayer {
    loader: StoredSessionLoader,
}

impl StoredSessionLoaderLayer {
    pub fn new(options: StoredSessionLoaderOptions) -> Self {
        Self::from_loader(StoredSessionLoader::new(options))
    }

    pub fn from_loader(loader: StoredSessionLoader) -> Self {
        Self { loader }
    }
}

impl<S> tower::Layer<S> for StoredSessionLoaderLayer {
    type Service = StoredSessionLoaderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StoredSessionLoaderService {
            inner,
            loader: self.loader.clone(),
        }
    }
}

#[derive(Clone)]
pub struct StoredSessionLoaderService<S> {
    inner: S,
    loader: StoredSessionLoader,
}

impl<S> Service<Request> for StoredSessionLoaderService<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Use the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let loader = self.loader.clone();

        Box::pin(async move {
            let mut session_req = SessionRequest::from_headers(req.headers());
            let mut scope = req
                .extensions_mut()
                .remove::<RequestScope>()
                .unwrap_or_default();

            loader.load_session(&mut scope, &mut session_req).await;
            req.extensions_mut().insert(scope);

            let mut response = inner.call(req).await?;
            session_req.write_set_cookies(response.headers_mut());
            Ok(response)
        })
    }
}
