//! graphql middleware
//!
//! exposes the named graphql operations of a frontend project as typed http
//! endpoints. at build time [`codegen::build`] validates `.graphql` documents
//! against the schema and emits typescript declarations plus runtime tables;
//! at run time [`Client`] calls the endpoints (with an optional response
//! cache) and [`ServerHandler`] forwards them to the upstream graphql api.
//!
//! ## build
//!
//! ```no_run
//! use graphql_middleware::{codegen, ModuleConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ModuleConfig::new("https://api.example.com/graphql", "./app")
//!     .with_server_api_prefix("/api/mw");
//! let report = codegen::build(&config)?;
//! println!("{} operations", report.operations);
//! # Ok(())
//! # }
//! ```
//!
//! ## runtime
//!
//! ```no_run
//! use graphql_middleware::{Client, ClientConfig, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::new("http://localhost:3000"))?;
//! let response = client
//!     .query::<serde_json::Value>(
//!         "userById",
//!         Some(serde_json::json!({ "id": "1" })),
//!         RequestOptions::default(),
//!     )
//!     .await?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cache;
mod client;
pub mod codegen;
mod config;
pub mod emitter;
mod error;
pub mod executor;
pub mod generator;
mod graphql;
pub mod loader;
pub mod naming;
mod operation;
pub mod schema;
pub mod schema_info;
pub mod server;
pub mod templates;

pub use client::{CachingOptions, Client, OperationRequest, RequestOptions, CLIENT_CONTEXT_PREFIX};
pub use config::{
    CacheConfig, ClientConfig, ExecutionContext, ModuleConfig, DEFAULT_CACHE_SIZE,
    DEFAULT_SERVER_API_PREFIX,
};
pub use error::{Error, Result, SERVER_ERROR_MESSAGE};
pub use executor::{
    FetchOptions, OutgoingRequest, RawResponse, ReqwestExecutor, RequestExecutor,
    RequestInterceptor, ResponseObserver,
};
pub use generator::{GeneratorOptions, GeneratorOutput};
pub use graphql::{GraphQlError, GraphQlLocation, GraphQlResponse};
pub use operation::{endpoint_path, OperationKind, TypedOperation};
pub use schema::Schema;
pub use server::{OperationDocuments, ServerHandler, ServerOptions};
