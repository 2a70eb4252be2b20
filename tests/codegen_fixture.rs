use graphql_middleware::codegen;
use graphql_middleware::server::IncomingRequest;
use graphql_middleware::{
    Error, ModuleConfig, OperationDocuments, RawResponse, RequestExecutor, ServerHandler,
    ServerOptions,
};
use reqwest::{Method, StatusCode};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
enum Role { ADMIN VIEWER }

type User {
  id: ID!
  name: String
  role: Role!
}

input UserFilter {
  role: Role
}

type Query {
  userById(id: ID!): User
  users(filter: UserFilter): [User!]!
  ping: Boolean!
}

type Mutation {
  ping: Boolean!
  rename(id: ID!, name: String!): User
}
"#;

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixture(root: &Path) -> ModuleConfig {
    write(root, "schema.graphql", SCHEMA);
    write(
        root,
        "app/queries/user.graphql",
        "fragment userFields on User { id name role }\n\
         query userById($id: ID!) { userById(id: $id) { ...userFields } }\n\
         query users($filter: UserFilter) { users(filter: $filter) { id } }",
    );
    write(root, "app/queries/ping.gql", "query ping { ping }");
    write(
        root,
        "app/mutations/ping.graphql",
        "mutation ping { ping }\nmutation rename($id: ID!, $name: String!) { rename(id: $id, name: $name) { id } }",
    );
    write(root, "app/client-options.ts", "export default {};\n");

    ModuleConfig::new("https://api.example.com/graphql", root)
        .with_server_api_prefix("/api/mw")
        .with_client_options_path("app/client-options.ts")
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(".graphql-middleware").join(path)).unwrap()
}

#[test]
fn build_emits_consistent_modules() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = fixture(root);

    let report = codegen::build(&config).unwrap();
    assert_eq!(report.operations, 5);

    let types = read(root, "graphql-operations/index.d.ts");
    assert!(types.contains("export type Role = 'ADMIN' | 'VIEWER';"));
    assert!(types.contains("export type UserFilter = {\n  role?: Role | null;\n};"));
    assert!(types.contains("export type UserFieldsFragment = {"));
    assert!(types.contains("export type UserByIdQueryVariables = {\n  id: string;\n};"));
    assert!(types.contains("export type PingMutationVariables = Record<string, never>;"));

    let table = read(root, "graphql-middleware/operation-types.d.ts");
    assert!(table.contains(
        "export type Query = {\n  ping: [PingQueryVariables, false, PingQuery];\n  userById: [UserByIdQueryVariables, true, UserByIdQuery];\n  users: [UsersQueryVariables, false, UsersQuery];\n};"
    ));
    assert!(table.contains(
        "export type Mutation = {\n  ping: [PingMutationVariables, false, PingMutation];\n  rename: [RenameMutationVariables, true, RenameMutation];\n};"
    ));
    // every name in the table is declared by the operations module
    for name in ["PingQuery", "UserByIdQueryVariables", "RenameMutation", "UsersQuery"] {
        assert!(table.contains(name));
        assert!(types.contains(&format!("export type {name} = ")));
    }

    let endpoints = read(root, "graphql-middleware/endpoints.js");
    assert!(endpoints.contains("    userById: '/api/mw/query/userById',\n"));

    let sources = read(root, "graphql-middleware/sources.js");
    assert!(sources.contains("  'query:ping': 'app/queries/ping.gql',\n"));

    let client_options = read(root, "graphql-middleware/client-options.js");
    assert!(client_options.contains("from '../../app/client-options';"));

    let documents =
        OperationDocuments::from_json(&read(root, "graphql-middleware/documents.json")).unwrap();
    let user_by_id = documents
        .get(graphql_middleware::OperationKind::Query, "userById")
        .unwrap();
    assert!(user_by_id.contains("fragment userFields on User"));
}

#[test]
fn rebuild_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = fixture(root);

    codegen::build(&config).unwrap();
    let first = read(root, "graphql-operations/index.d.ts");
    let report = codegen::build(&config).unwrap();
    assert!(report.emitted.written.is_empty());
    assert_eq!(read(root, "graphql-operations/index.d.ts"), first);
}

#[test]
fn anonymous_operation_aborts_build() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = fixture(root);
    write(root, "app/queries/anon.graphql", "{ ping }");

    let err = codegen::build(&config).unwrap_err();
    assert!(matches!(err, Error::AnonymousOperation { .. }));
    assert!(err.is_build_error());
    assert!(!root.join(".graphql-middleware").exists());
}

struct Upstream {
    bodies: Mutex<Vec<serde_json::Value>>,
}

#[async_trait::async_trait]
impl RequestExecutor for Upstream {
    async fn execute(
        &self,
        request: graphql_middleware::OutgoingRequest,
    ) -> graphql_middleware::Result<RawResponse> {
        self.bodies
            .lock()
            .unwrap()
            .push(request.body.clone().unwrap_or_default());
        Ok(RawResponse::new(
            StatusCode::OK,
            "{\"data\": {\"userById\": {\"id\": \"1\", \"name\": null, \"role\": \"ADMIN\"}}}",
        ))
    }
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn server_serves_emitted_documents() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = fixture(root);
    codegen::build(&config).unwrap();

    let documents =
        OperationDocuments::from_json(&read(root, "graphql-middleware/documents.json")).unwrap();
    let upstream = Arc::new(Upstream {
        bodies: Mutex::new(Vec::new()),
    });
    let handler = ServerHandler::new(
        documents,
        ServerOptions::from_module_config(&config),
        upstream.clone(),
    );

    let request = IncomingRequest::parse(
        Method::GET,
        "/api/mw/query/userById?variables=%7B%22id%22%3A%221%22%7D",
    )
    .unwrap();
    let response = handler.handle(&request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["userById"]["role"], "ADMIN");

    let bodies = upstream.bodies.lock().unwrap();
    assert_eq!(bodies[0]["operationName"], "userById");
    assert!(bodies[0]["query"]
        .as_str()
        .unwrap()
        .contains("fragment userFields on User"));
}
