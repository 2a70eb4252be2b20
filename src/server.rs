//! server handler
//!
//! framework-agnostic handler for the generated endpoints. it maps
//! `{prefix}/{kind}/{name}` onto the stored operation document and forwards
//! the call to the upstream graphql endpoint.

use crate::client::CLIENT_CONTEXT_PREFIX;
use crate::config::{ModuleConfig, DEFAULT_SERVER_API_PREFIX};
use crate::error::{Error, Result, SERVER_ERROR_MESSAGE};
use crate::executor::{FetchOptions, OutgoingRequest, RawResponse, ReqwestExecutor, RequestExecutor};
use crate::generator::GeneratorOutput;
use crate::operation::OperationKind;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// executable documents by kind and operation name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDocuments {
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub mutation: BTreeMap<String, String>,
    #[serde(default)]
    pub subscription: BTreeMap<String, String>,
}

impl OperationDocuments {
    pub fn from_output(output: &GeneratorOutput) -> Self {
        let mut documents = Self::default();
        for op in output.operations() {
            documents.insert(op.operation_type, op.graphql_name.clone(), op.document.clone());
        }
        documents
    }

    /// parse an emitted `documents.json`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, kind: OperationKind, name: &str) -> Option<&str> {
        self.table(kind).get(name).map(String::as_str)
    }

    pub fn insert(&mut self, kind: OperationKind, name: String, document: String) {
        self.table_mut(kind).insert(name, document);
    }

    pub fn len(&self) -> usize {
        self.query.len() + self.mutation.len() + self.subscription.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self, kind: OperationKind) -> &BTreeMap<String, String> {
        match kind {
            OperationKind::Query => &self.query,
            OperationKind::Mutation => &self.mutation,
            OperationKind::Subscription => &self.subscription,
        }
    }

    fn table_mut(&mut self, kind: OperationKind) -> &mut BTreeMap<String, String> {
        match kind {
            OperationKind::Query => &mut self.query,
            OperationKind::Mutation => &mut self.mutation,
            OperationKind::Subscription => &mut self.subscription,
        }
    }
}

/// a request as seen by the hosting framework
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub method: Method,
    /// url path, without query string
    pub path: String,
    /// decoded query parameters in order
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl IncomingRequest {
    /// build from a method and a request uri such as `/api/query/x?variables=...`
    pub fn parse(method: Method, uri: &str) -> Result<Self> {
        let url = Url::parse("http://localhost/")?.join(uri)?;
        Ok(Self {
            method,
            path: url.path().to_string(),
            query: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            headers: HeaderMap::new(),
            body: None,
        })
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// status and json body returned to the hosting framework
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ServerResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// `{"message": ...}` with the given status
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }
}

/// the call being handled, passed to every hook
#[derive(Debug, Clone, Copy)]
pub struct OperationContext<'a> {
    pub kind: OperationKind,
    pub name: &'a str,
    /// values of the `__gqlc_*` parameters, prefix stripped
    pub client_context: &'a BTreeMap<String, String>,
    pub request: &'a IncomingRequest,
}

/// picks the upstream endpoint per call
pub trait EndpointResolver: Send + Sync {
    fn graphql_endpoint(&self, ctx: &OperationContext<'_>) -> String;
}

/// transport settings for the upstream request
pub trait FetchOptionsProvider: Send + Sync {
    fn fetch_options(&self, ctx: &OperationContext<'_>) -> FetchOptions;
}

/// headers for the upstream request, applied last
pub trait HeaderBuilder: Send + Sync {
    fn build_headers(&self, ctx: &OperationContext<'_>) -> HeaderMap;
}

/// reshapes a successful upstream body before it is returned
pub trait ServerResponseHook: Send + Sync {
    fn on_server_response(&self, ctx: &OperationContext<'_>, raw: &RawResponse, body: Value) -> Value;
}

/// answers a failed call; `None` falls back to the generic 500
pub trait ServerErrorHook: Send + Sync {
    fn on_server_error(&self, ctx: &OperationContext<'_>, error: &Error) -> Option<ServerResponse>;
}

/// handler settings and hooks
#[derive(Clone)]
pub struct ServerOptions {
    graphql_endpoint: String,
    server_api_prefix: String,
    headers: HeaderMap,
    endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
    fetch_options: Option<Arc<dyn FetchOptionsProvider>>,
    header_builder: Option<Arc<dyn HeaderBuilder>>,
    response_hook: Option<Arc<dyn ServerResponseHook>>,
    error_hook: Option<Arc<dyn ServerErrorHook>>,
}

impl ServerOptions {
    pub fn new(graphql_endpoint: impl Into<String>) -> Self {
        Self {
            graphql_endpoint: graphql_endpoint.into(),
            server_api_prefix: DEFAULT_SERVER_API_PREFIX.to_string(),
            headers: HeaderMap::new(),
            endpoint_resolver: None,
            fetch_options: None,
            header_builder: None,
            response_hook: None,
            error_hook: None,
        }
    }

    /// endpoint and prefix taken from the build configuration
    pub fn from_module_config(config: &ModuleConfig) -> Self {
        Self::new(config.graphql_endpoint()).with_server_api_prefix(config.server_api_prefix())
    }

    pub fn with_server_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.server_api_prefix = prefix.into();
        self
    }

    /// header sent upstream with every call
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_endpoint_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.endpoint_resolver = Some(resolver);
        self
    }

    pub fn with_fetch_options(mut self, provider: Arc<dyn FetchOptionsProvider>) -> Self {
        self.fetch_options = Some(provider);
        self
    }

    pub fn with_header_builder(mut self, builder: Arc<dyn HeaderBuilder>) -> Self {
        self.header_builder = Some(builder);
        self
    }

    pub fn with_response_hook(mut self, hook: Arc<dyn ServerResponseHook>) -> Self {
        self.response_hook = Some(hook);
        self
    }

    pub fn with_error_hook(mut self, hook: Arc<dyn ServerErrorHook>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn graphql_endpoint(&self) -> &str {
        &self.graphql_endpoint
    }

    pub fn server_api_prefix(&self) -> &str {
        &self.server_api_prefix
    }
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("graphql_endpoint", &self.graphql_endpoint)
            .field("server_api_prefix", &self.server_api_prefix)
            .field("headers", &self.headers.len())
            .field("endpoint_resolver", &self.endpoint_resolver.is_some())
            .field("fetch_options", &self.fetch_options.is_some())
            .field("header_builder", &self.header_builder.is_some())
            .field("response_hook", &self.response_hook.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

/// serves the generated endpoints
#[derive(Clone)]
pub struct ServerHandler {
    documents: Arc<OperationDocuments>,
    options: Arc<ServerOptions>,
    executor: Arc<dyn RequestExecutor>,
}

impl ServerHandler {
    pub fn new(
        documents: OperationDocuments,
        options: ServerOptions,
        executor: Arc<dyn RequestExecutor>,
    ) -> Self {
        Self {
            documents: Arc::new(documents),
            options: Arc::new(options),
            executor,
        }
    }

    /// handler forwarding through a default reqwest client
    pub fn with_reqwest(documents: OperationDocuments, options: ServerOptions) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::new(
            documents,
            options,
            Arc::new(ReqwestExecutor::from_client(http)),
        ))
    }

    pub fn documents(&self) -> &OperationDocuments {
        &self.documents
    }

    /// handle one request; never fails, errors become status codes
    pub async fn handle(&self, request: &IncomingRequest) -> ServerResponse {
        let prefix = self.options.server_api_prefix.trim_end_matches('/');
        let Some(rest) = request
            .path
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return ServerResponse::error(StatusCode::NOT_FOUND, "Not Found");
        };

        let mut segments = rest.split('/');
        let (Some(kind), Some(name), None) = (segments.next(), segments.next(), segments.next())
        else {
            return ServerResponse::error(StatusCode::NOT_FOUND, "Not Found");
        };

        let kind = match OperationKind::from_segment(kind) {
            Some(OperationKind::Subscription) | None => {
                return ServerResponse::error(StatusCode::NOT_FOUND, "Not Found");
            }
            Some(kind) => kind,
        };

        let expected = match kind {
            OperationKind::Query => Method::GET,
            _ => Method::POST,
        };
        if request.method != expected {
            return ServerResponse::error(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method {} not allowed for {kind} operations", request.method),
            );
        }

        let Some(document) = self.documents.get(kind, name) else {
            return ServerResponse::error(
                StatusCode::NOT_FOUND,
                format!("Operation \"{name}\" not found"),
            );
        };

        let client_context = client_context(&request.query);
        let variables = match read_variables(kind, request) {
            Ok(variables) => variables,
            Err(message) => return ServerResponse::error(StatusCode::BAD_REQUEST, message),
        };

        let ctx = OperationContext {
            kind,
            name,
            client_context: &client_context,
            request,
        };
        match self.forward(&ctx, document, variables).await {
            Ok(response) => response,
            Err(err) => self.fail(&ctx, err),
        }
    }

    async fn forward(
        &self,
        ctx: &OperationContext<'_>,
        document: &str,
        variables: Value,
    ) -> Result<ServerResponse> {
        let endpoint = match &self.options.endpoint_resolver {
            Some(resolver) => resolver.graphql_endpoint(ctx),
            None => self.options.graphql_endpoint.clone(),
        };

        let mut outgoing = OutgoingRequest::new(Method::POST, Url::parse(&endpoint)?);
        outgoing.headers = self.options.headers.clone();
        if let Some(provider) = &self.options.fetch_options {
            provider.fetch_options(ctx).apply(&mut outgoing);
        }
        if let Some(builder) = &self.options.header_builder {
            for (name, value) in builder.build_headers(ctx).iter() {
                outgoing.headers.insert(name.clone(), value.clone());
            }
        }
        outgoing.body = Some(json!({
            "query": document,
            "variables": variables,
            "operationName": ctx.name,
        }));

        debug!("forwarding {} {} to {}", ctx.kind, ctx.name, outgoing.url);
        let raw = self.executor.execute(outgoing).await?;
        if !raw.status.is_success() {
            debug!("upstream returned {}: {}", raw.status, raw.body);
            return Err(Error::Server {
                status: Some(raw.status.as_u16()),
            });
        }

        let body: Value = serde_json::from_str(&raw.body)?;
        let body = match &self.options.response_hook {
            Some(hook) => hook.on_server_response(ctx, &raw, body),
            None => body,
        };
        Ok(ServerResponse::ok(body))
    }

    fn fail(&self, ctx: &OperationContext<'_>, err: Error) -> ServerResponse {
        warn!("{} {} failed: {err}", ctx.kind, ctx.name);
        if let Some(hook) = &self.options.error_hook {
            if let Some(response) = hook.on_server_error(ctx, &err) {
                return response;
            }
        }
        ServerResponse::error(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
    }
}

fn client_context(query: &[(String, String)]) -> BTreeMap<String, String> {
    query
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(CLIENT_CONTEXT_PREFIX)
                .map(|key| (key.to_string(), value.clone()))
        })
        .collect()
}

/// variables from the `variables` parameter or the json body
///
/// a query without a `variables` parameter takes its remaining plain
/// parameters as string variables.
fn read_variables(kind: OperationKind, request: &IncomingRequest) -> std::result::Result<Value, String> {
    let raw = match kind {
        OperationKind::Query => {
            let explicit = request
                .query
                .iter()
                .find(|(key, _)| key == "variables")
                .map(|(_, value)| value.as_str());
            match explicit {
                Some(raw) => Some(raw),
                None => {
                    let flat: Map<String, Value> = request
                        .query
                        .iter()
                        .filter(|(key, _)| !key.starts_with(CLIENT_CONTEXT_PREFIX))
                        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                        .collect();
                    return Ok(Value::Object(flat));
                }
            }
        }
        _ => request.body.as_deref(),
    };

    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err("Variables must be a JSON object".to_string()),
        Err(err) => Err(format!("Invalid variables: {err}")),
    }
}
