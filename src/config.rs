//! configuration
//!
//! [`ModuleConfig`] drives a build pass; [`ClientConfig`] drives the runtime
//! client. both apply their defaults once in `new` and are adjusted through
//! `with_*` builders.

use crate::error::{Error, Result};
use crate::executor::{RequestInterceptor, ResponseObserver};
use crate::generator::GeneratorOptions;
use crate::loader::SchemaSource;
use crate::operation::{endpoint_path, OperationKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// default route prefix of the generated endpoints
pub const DEFAULT_SERVER_API_PREFIX: &str = "/api/graphql_middleware";

/// default number of cached responses
pub const DEFAULT_CACHE_SIZE: usize = 30;

/// build-time configuration
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// upstream graphql endpoint
    pub(crate) graphql_endpoint: String,

    /// route prefix of the generated endpoints
    pub(crate) server_api_prefix: String,

    /// project root; document globs and relative paths resolve against it
    pub(crate) root_dir: PathBuf,

    /// directory the templates are written to
    pub(crate) build_dir: PathBuf,

    /// document glob patterns relative to the root
    pub(crate) documents: Vec<String>,

    /// documents given as strings
    pub(crate) inline_documents: Vec<String>,

    /// schema file; read from, or written to when downloading
    pub(crate) schema_path: PathBuf,

    /// url serving the schema sdl; when set the schema is downloaded
    pub(crate) schema_url: Option<String>,

    /// headers sent with the schema download
    pub(crate) schema_headers: HeaderMap,

    /// user file re-exported as client options
    pub(crate) client_options_path: Option<PathBuf>,

    /// user file re-exported as server options
    pub(crate) server_options_path: Option<PathBuf>,

    /// type generation settings
    pub(crate) generator: GeneratorOptions,
}

impl ModuleConfig {
    /// create a build configuration
    ///
    /// # example
    ///
    /// ```
    /// use graphql_middleware::ModuleConfig;
    ///
    /// let config = ModuleConfig::new("https://api.example.com/graphql", "./app")
    ///     .with_server_api_prefix("/api/mw");
    /// ```
    pub fn new(graphql_endpoint: impl Into<String>, root_dir: impl AsRef<Path>) -> Self {
        let root_dir = root_dir.as_ref().to_path_buf();
        Self {
            graphql_endpoint: graphql_endpoint.into(),
            server_api_prefix: DEFAULT_SERVER_API_PREFIX.to_string(),
            build_dir: root_dir.join(".graphql-middleware"),
            documents: vec!["**/*.graphql".to_string(), "**/*.gql".to_string()],
            inline_documents: Vec::new(),
            schema_path: root_dir.join("schema.graphql"),
            schema_url: None,
            schema_headers: HeaderMap::new(),
            client_options_path: None,
            server_options_path: None,
            generator: GeneratorOptions::default(),
            root_dir,
        }
    }

    pub fn with_server_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.server_api_prefix = prefix.into();
        self
    }

    /// relative paths resolve against the root dir
    pub fn with_build_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.build_dir = self.resolve(dir.as_ref());
        self
    }

    /// replace the document glob patterns
    pub fn with_documents<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inline_document(mut self, source: impl Into<String>) -> Self {
        self.inline_documents.push(source.into());
        self
    }

    pub fn with_schema_path(mut self, path: impl AsRef<Path>) -> Self {
        self.schema_path = self.resolve(path.as_ref());
        self
    }

    /// download the schema sdl from `url` and persist it to the schema path
    pub fn with_schema_url(mut self, url: impl Into<String>) -> Self {
        self.schema_url = Some(url.into());
        self
    }

    pub fn with_schema_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.schema_headers.insert(name, value);
        self
    }

    pub fn with_client_options_path(mut self, path: impl AsRef<Path>) -> Self {
        self.client_options_path = Some(self.resolve(path.as_ref()));
        self
    }

    pub fn with_server_options_path(mut self, path: impl AsRef<Path>) -> Self {
        self.server_options_path = Some(self.resolve(path.as_ref()));
        self
    }

    /// map a custom scalar to a typescript type
    pub fn with_scalar(mut self, scalar: impl Into<String>, ts_type: impl Into<String>) -> Self {
        self.generator
            .scalars
            .insert(scalar.into(), ts_type.into());
        self
    }

    pub fn graphql_endpoint(&self) -> &str {
        &self.graphql_endpoint
    }

    pub fn server_api_prefix(&self) -> &str {
        &self.server_api_prefix
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn generator_options(&self) -> &GeneratorOptions {
        &self.generator
    }

    /// where the schema is loaded from
    pub fn schema_source(&self) -> SchemaSource {
        match &self.schema_url {
            Some(url) => SchemaSource::Url {
                url: url.clone(),
                headers: self.schema_headers.clone(),
            },
            None => SchemaSource::File(self.schema_path.clone()),
        }
    }

    /// true if the schema is fetched over http
    pub fn downloads_schema(&self) -> bool {
        self.schema_url.is_some()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    /// validate the configuration
    pub(crate) fn validate(&self) -> Result<()> {
        if self.graphql_endpoint.trim().is_empty() {
            return Err(Error::Config("graphql endpoint is required".to_string()));
        }
        if !self.server_api_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "server api prefix must start with '/': {}",
                self.server_api_prefix
            )));
        }
        if self.documents.is_empty() && self.inline_documents.is_empty() {
            return Err(Error::Config(
                "no graphql documents configured".to_string(),
            ));
        }
        if let Some(url) = &self.schema_url {
            Url::parse(url)
                .map_err(|err| Error::Config(format!("invalid schema url {url}: {err}")))?;
        }
        Ok(())
    }
}

/// where a call is executed; caching is configured per context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Client,
    Server,
}

/// response cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// cache queries executed in the client context
    pub client: bool,
    /// cache queries executed in the server context
    pub server: bool,
    /// capacity; the oldest inserted entry is evicted first
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            client: false,
            server: false,
            max_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn enabled_for(&self, context: ExecutionContext) -> bool {
        match context {
            ExecutionContext::Client => self.client,
            ExecutionContext::Server => self.server,
        }
    }
}

/// configuration for the runtime client
#[derive(Clone)]
pub struct ClientConfig {
    /// original base url input
    pub(crate) raw_base_url: String,

    /// origin serving the generated endpoints (e.g., "<https://app.example.com>")
    pub(crate) base_url: Url,

    /// whether the provided base url parsed successfully
    pub(crate) base_url_valid: bool,

    /// route prefix of the generated endpoints
    pub(crate) server_api_prefix: String,

    /// request timeout duration
    pub(crate) timeout: Duration,

    /// user agent string
    pub(crate) user_agent: String,

    /// additional headers to send with every request
    pub(crate) extra_headers: HeaderMap,

    /// prebuilt http client
    pub(crate) http_client: Option<reqwest::Client>,

    /// response cache settings
    pub(crate) cache: CacheConfig,

    /// execution context of this client
    pub(crate) context: ExecutionContext,

    /// rewrites outgoing requests before dispatch
    pub(crate) interceptor: Option<Arc<dyn RequestInterceptor>>,

    /// reads raw responses after a successful call
    pub(crate) observer: Option<Arc<dyn ResponseObserver>>,
}

impl ClientConfig {
    /// create a new client configuration
    ///
    /// # arguments
    ///
    /// * `base_url` - origin serving the generated endpoints (with or without trailing slash)
    ///
    /// # example
    ///
    /// ```
    /// use graphql_middleware::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://app.example.com").with_server_api_prefix("/api/mw");
    /// ```
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base_url_str = base_url.as_ref();

        let normalized = base_url_str.trim_end_matches('/');

        let (base_url, base_url_valid) = match Url::parse(normalized)
            .or_else(|_| Url::parse(&format!("https://{}", normalized)))
        {
            Ok(url) => (url, true),
            Err(_) => (Url::parse("https://invalid.invalid").unwrap(), false),
        };

        Self {
            raw_base_url: base_url_str.to_string(),
            base_url,
            base_url_valid,
            server_api_prefix: DEFAULT_SERVER_API_PREFIX.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("graphql-middleware/{} (Rust)", env!("CARGO_PKG_VERSION")),
            extra_headers: HeaderMap::new(),
            http_client: None,
            cache: CacheConfig::default(),
            context: ExecutionContext::default(),
            interceptor: None,
            observer: None,
        }
    }

    pub fn with_server_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.server_api_prefix = prefix.into();
        self
    }

    /// set the request timeout
    ///
    /// default: 30 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// set a custom user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// add a header to every request
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.insert(name, value);
        self
    }

    /// add a set of headers to every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.extra_headers.extend(headers);
        self
    }

    /// access extra headers configured on this client
    pub fn extra_headers(&self) -> &HeaderMap {
        &self.extra_headers
    }

    /// inject a prebuilt http client.
    ///
    /// when set, the client is used as-is: timeout, user agent, and extra
    /// headers from this config are not applied to it.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// set the response cache settings
    ///
    /// default: caching disabled in both contexts, 30 entries
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// mark this client as running on the server or in the client
    pub fn with_execution_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// rewrite every outgoing request before it is dispatched
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// observe every successful raw response
    pub fn with_observer(mut self, observer: Arc<dyn ResponseObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn execution_context(&self) -> ExecutionContext {
        self.context
    }

    /// validate the configuration
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.base_url_valid {
            return Err(Error::Config(format!(
                "invalid base url: {}",
                self.raw_base_url
            )));
        }

        if self.base_url.scheme() != "http" && self.base_url.scheme() != "https" {
            return Err(Error::Config(format!(
                "invalid url scheme: {}. must be http or https",
                self.base_url.scheme()
            )));
        }

        if !self.server_api_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "server api prefix must start with '/': {}",
                self.server_api_prefix
            )));
        }

        if self.cache.max_size == 0 {
            return Err(Error::Config("cache max size must be at least 1".to_string()));
        }

        Ok(())
    }

    /// namespace that prefixes every cache key of this client
    pub(crate) fn cache_namespace(&self) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.server_api_prefix.trim_end_matches('/')
        )
    }

    /// build the endpoint url for an operation
    pub(crate) fn endpoint_url(&self, kind: OperationKind, name: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url_str = format!("{}{}", base, endpoint_path(&self.server_api_prefix, kind, name));
        Url::parse(&url_str).map_err(Error::from)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("server_api_prefix", &self.server_api_prefix)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("extra_headers", &self.extra_headers.len())
            .field("http_client", &self.http_client.is_some())
            .field("cache", &self.cache)
            .field("context", &self.context)
            .field("interceptor", &self.interceptor.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_config() {
        let config = ClientConfig::new("https://app.example.com/");
        assert_eq!(
            config.base_url.as_str().trim_end_matches('/'),
            "https://app.example.com"
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.server_api_prefix, DEFAULT_SERVER_API_PREFIX);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.cache.max_size, 30);
    }

    #[test]
    fn test_endpoint_url() {
        let config = ClientConfig::new("https://app.example.com").with_server_api_prefix("/api/mw");
        let url = config.endpoint_url(OperationKind::Query, "getUser").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/mw/query/getUser");
        let url = config
            .endpoint_url(OperationKind::Mutation, "createUser")
            .unwrap();
        assert_eq!(url.path(), "/api/mw/mutation/createUser");
    }

    #[test]
    fn test_cache_namespace() {
        let config = ClientConfig::new("http://localhost:3000").with_server_api_prefix("/api/mw/");
        assert_eq!(config.cache_namespace(), "http://localhost:3000/api/mw");
    }

    #[test]
    fn test_client_validation() {
        assert!(ClientConfig::new("https://app.example.com").validate().is_ok());

        let err = ClientConfig::new("ftp://example.com").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ClientConfig::new("https://app.example.com")
            .with_server_api_prefix("api")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ClientConfig::new("https://app.example.com")
            .with_cache(CacheConfig {
                client: true,
                server: false,
                max_size: 0,
            })
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = ClientConfig::new("https://app.example.com");
        config.base_url_valid = false;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cache_enabled_for_context() {
        let cache = CacheConfig {
            client: true,
            server: false,
            max_size: 10,
        };
        assert!(cache.enabled_for(ExecutionContext::Client));
        assert!(!cache.enabled_for(ExecutionContext::Server));
    }

    #[test]
    fn test_builder_helpers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-test"),
            HeaderValue::from_static("value"),
        );

        let config = ClientConfig::new("https://app.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("graphql-middleware-test")
            .with_execution_context(ExecutionContext::Server)
            .with_headers(headers)
            .with_header(
                HeaderName::from_static("x-other"),
                HeaderValue::from_static("other"),
            );

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "graphql-middleware-test");
        assert_eq!(config.execution_context(), ExecutionContext::Server);
        assert_eq!(config.extra_headers.get("x-test").unwrap(), "value");
        assert_eq!(config.extra_headers().get("x-other").unwrap(), "other");
    }

    #[test]
    fn test_debug_output() {
        let config = ClientConfig::new("https://app.example.com");
        let debug = format!("{config:?}");
        assert!(debug.contains("http_client: false"));
        assert!(debug.contains("interceptor: false"));
    }

    #[test]
    fn test_module_config_defaults() {
        let config = ModuleConfig::new("https://api.example.com/graphql", "/project");
        assert_eq!(config.server_api_prefix(), DEFAULT_SERVER_API_PREFIX);
        assert_eq!(config.build_dir(), Path::new("/project/.graphql-middleware"));
        assert_eq!(config.schema_path(), Path::new("/project/schema.graphql"));
        assert!(!config.downloads_schema());
        assert!(matches!(config.schema_source(), SchemaSource::File(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_module_config_paths_resolve_against_root() {
        let config = ModuleConfig::new("https://api.example.com/graphql", "/project")
            .with_build_dir("out")
            .with_schema_path("/abs/schema.graphql")
            .with_client_options_path("app/client.ts")
            .with_scalar("DateTime", "string");
        assert_eq!(config.build_dir(), Path::new("/project/out"));
        assert_eq!(config.schema_path(), Path::new("/abs/schema.graphql"));
        assert_eq!(
            config.client_options_path.as_deref(),
            Some(Path::new("/project/app/client.ts"))
        );
        assert_eq!(
            config.generator_options().scalars.get("DateTime").map(String::as_str),
            Some("string")
        );
    }

    #[test]
    fn test_module_config_validation() {
        let err = ModuleConfig::new("", "/project").validate().unwrap_err();
        assert!(err.to_string().contains("graphql endpoint is required"));

        let err = ModuleConfig::new("https://api.example.com/graphql", "/project")
            .with_server_api_prefix("api")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ModuleConfig::new("https://api.example.com/graphql", "/project")
            .with_documents(Vec::<String>::new())
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = ModuleConfig::new("https://api.example.com/graphql", "/project")
            .with_schema_url("https://api.example.com/schema.graphql");
        assert!(config.downloads_schema());
        assert!(config.validate().is_ok());

        let err = ModuleConfig::new("https://api.example.com/graphql", "/project")
            .with_schema_url("not a url")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
