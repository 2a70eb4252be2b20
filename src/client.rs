//! runtime client
//!
//! calls the generated endpoints, caches query responses, and runs the
//! configured interceptor and observer around every dispatch.

use crate::cache::{cache_key, ResponseCache};
use crate::config::{ClientConfig, ExecutionContext};
use crate::error::{Error, Result};
use crate::executor::{FetchOptions, OutgoingRequest, RawResponse, ReqwestExecutor, RequestExecutor};
use crate::graphql::GraphQlResponse;
use crate::operation::{OperationKind, TypedOperation};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// prefix of query parameters carrying client context
pub const CLIENT_CONTEXT_PREFIX: &str = "__gqlc_";

/// per-call cache opt-out; `Some(false)` disables caching for that context
///
/// a call can never enable caching that the config leaves disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachingOptions {
    pub client: Option<bool>,
    pub server: Option<bool>,
}

impl CachingOptions {
    /// opt out in both contexts
    pub fn disabled() -> Self {
        Self {
            client: Some(false),
            server: Some(false),
        }
    }

    fn allows(&self, context: ExecutionContext) -> bool {
        let flag = match context {
            ExecutionContext::Client => self.client,
            ExecutionContext::Server => self.server,
        };
        flag != Some(false)
    }
}

/// per-call options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub fetch_options: FetchOptions,
    /// forwarded to the server as `__gqlc_{key}` parameters
    pub client_context: BTreeMap<String, String>,
    pub graphql_caching: CachingOptions,
}

impl RequestOptions {
    pub fn with_fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = fetch_options;
        self
    }

    pub fn with_client_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.client_context.insert(key.into(), value.into());
        self
    }

    pub fn with_caching(mut self, caching: CachingOptions) -> Self {
        self.graphql_caching = caching;
        self
    }
}

/// a call in single-object form
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub name: String,
    pub variables: Value,
    pub options: RequestOptions,
}

impl OperationRequest {
    pub fn query(name: impl Into<String>, variables: Value) -> Self {
        Self::new(OperationKind::Query, name, variables)
    }

    pub fn mutation(name: impl Into<String>, variables: Value) -> Self {
        Self::new(OperationKind::Mutation, name, variables)
    }

    pub fn new(kind: OperationKind, name: impl Into<String>, variables: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            variables,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// client for the generated endpoints
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    executor: Arc<dyn RequestExecutor>,
    cache: Arc<OnceLock<ResponseCache>>,
}

impl Client {
    /// create a client using the reqwest executor
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let executor = ReqwestExecutor::new(&config)?;
        Ok(Self::assemble(config, Arc::new(executor)))
    }

    /// create a client dispatching through a custom executor
    pub fn with_executor(config: ClientConfig, executor: Arc<dyn RequestExecutor>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, executor))
    }

    fn assemble(config: ClientConfig, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            config: Arc::new(config),
            executor,
            cache: Arc::new(OnceLock::new()),
        }
    }

    /// access the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// run a query by name
    pub async fn query<T: DeserializeOwned>(
        &self,
        name: &str,
        variables: Option<Value>,
        options: RequestOptions,
    ) -> Result<GraphQlResponse<T>> {
        let request = OperationRequest::query(name, variables.unwrap_or_else(empty_variables));
        self.request(request.with_options(options)).await
    }

    /// run a mutation by name; never cached
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        name: &str,
        variables: Option<Value>,
        options: RequestOptions,
    ) -> Result<GraphQlResponse<T>> {
        let request = OperationRequest::mutation(name, variables.unwrap_or_else(empty_variables));
        self.request(request.with_options(options)).await
    }

    /// run a generated operation
    pub async fn execute_operation<O: TypedOperation>(
        &self,
        variables: &O::Variables,
        options: RequestOptions,
    ) -> Result<GraphQlResponse<O::Response>> {
        let variables = serde_json::to_value(variables)?;
        let request = OperationRequest::new(O::KIND, O::NAME, variables).with_options(options);
        self.request(request).await
    }

    /// run a call
    ///
    /// graphql errors in a 2xx response are returned in the response, not as
    /// an error. transport failures and non-2xx answers surface as
    /// [`Error::Server`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: OperationRequest,
    ) -> Result<GraphQlResponse<T>> {
        if request.kind == OperationKind::Subscription {
            return Err(Error::Config(format!(
                "subscription \"{}\" cannot be executed over http",
                request.name
            )));
        }

        let key = self.is_cacheable(&request).then(|| {
            cache_key(
                &self.config.cache_namespace(),
                request.kind,
                &request.name,
                &request.variables,
            )
        });

        if let Some(key) = &key {
            if let Some(body) = self.cache().get(key) {
                debug!("cache hit for {key}");
                return Ok(serde_json::from_value(body)?);
            }
        }

        let outgoing = self.build_request(&request)?;
        let outgoing = match &self.config.interceptor {
            Some(interceptor) => interceptor.intercept(outgoing),
            None => outgoing,
        };

        let raw = self.dispatch(outgoing).await?;
        if let Some(observer) = &self.config.observer {
            observer.on_response(&raw);
        }

        let body: Value = serde_json::from_str(&raw.body).map_err(|err| {
            debug!("invalid response body for {} {}: {err}", request.kind, request.name);
            Error::Server {
                status: Some(raw.status.as_u16()),
            }
        })?;
        let response = serde_json::from_value(body.clone())?;

        if let Some(key) = key {
            self.cache().insert(key, body);
        }
        Ok(response)
    }

    /// drop every cached response
    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache.get() {
            cache.clear();
        }
    }

    /// number of cached responses
    pub fn cached_responses(&self) -> usize {
        self.cache.get().map_or(0, ResponseCache::len)
    }

    fn cache(&self) -> &ResponseCache {
        self.cache.get_or_init(|| {
            debug!("creating response cache ({} entries)", self.config.cache.max_size);
            ResponseCache::new(self.config.cache.max_size)
        })
    }

    fn is_cacheable(&self, request: &OperationRequest) -> bool {
        let context = self.config.context;
        request.kind == OperationKind::Query
            && self.config.cache.enabled_for(context)
            && request.options.graphql_caching.allows(context)
    }

    fn build_request(&self, request: &OperationRequest) -> Result<OutgoingRequest> {
        let mut url = self.config.endpoint_url(request.kind, &request.name)?;
        let method = match request.kind {
            OperationKind::Query => Method::GET,
            _ => Method::POST,
        };

        {
            let mut pairs = url.query_pairs_mut();
            if method == Method::GET && has_variables(&request.variables) {
                pairs.append_pair("variables", &request.variables.to_string());
            }
            for (key, value) in &request.options.client_context {
                pairs.append_pair(&format!("{CLIENT_CONTEXT_PREFIX}{key}"), value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut outgoing = OutgoingRequest::new(method, url);
        if outgoing.method == Method::POST {
            outgoing.body = Some(request.variables.clone());
        }
        request.options.fetch_options.apply(&mut outgoing);
        Ok(outgoing)
    }

    async fn dispatch(&self, outgoing: OutgoingRequest) -> Result<RawResponse> {
        let url = outgoing.url.clone();
        let raw = match self.executor.execute(outgoing).await {
            Ok(raw) => raw,
            Err(err) => {
                debug!("request to {url} failed: {err}");
                return Err(Error::Server { status: None });
            }
        };

        if !raw.status.is_success() {
            debug!("request to {url} returned {}: {}", raw.status, raw.body);
            return Err(Error::Server {
                status: Some(raw.status.as_u16()),
            });
        }
        Ok(raw)
    }
}

fn empty_variables() -> Value {
    Value::Object(serde_json::Map::new())
}

fn has_variables(variables: &Value) -> bool {
    match variables {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
