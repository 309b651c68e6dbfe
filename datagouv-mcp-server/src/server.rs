use crate::matomo::MatomoTracker;
use crate::tools;
use datagouv::{Config, DatagouvClient};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::env;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const METHODS: &[&str] = &[
    "initialize",
    "initialized",
    "shutdown",
    "tools/list",
    "tools/call",
];

pub struct DatagouvMcpServer {
    client: DatagouvClient,
    matomo: MatomoTracker,
}

impl DatagouvMcpServer {
    pub async fn bootstrap() -> Result<(), ServerError> {
        let server = Self::new()?;
        server.run().await
    }

    fn new() -> Result<Self, ServerError> {
        let mut config = Config::from_env();
        if let Ok(user_agent) = env::var("DATAGOUV_USER_AGENT") {
            if !user_agent.trim().is_empty() {
                config = config.with_user_agent(user_agent);
            }
        }

        let client = DatagouvClient::with_config(config)?;
        let matomo = MatomoTracker::from_env();

        Ok(Self { client, matomo })
    }

    async fn run(self) -> Result<(), ServerError> {
        let stdin = io::stdin();
        let stdout = io::stdout();

        let reader = BufReader::new(stdin);
        let mut writer = BufWriter::new(stdout);

        self.send_ready(&mut writer).await?;

        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request = match serde_json::from_str::<Request>(trimmed) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!("invalid request: {err}");
                    let response =
                        Response::error(None, ServerError::InvalidRequest(err.to_string()));
                    self.write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let response = self.handle_request(request).await;
            self.write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn send_ready(&self, writer: &mut BufWriter<io::Stdout>) -> Result<(), ServerError> {
        let ready = json!({
            "jsonrpc": "2.0",
            "id": null,
            "result": {
                "server": "datagouv-mcp-server",
                "version": env!("CARGO_PKG_VERSION"),
                "methods": METHODS,
            }
        });

        let payload = serde_json::to_string(&ready).map_err(ServerError::Serialization)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        tracing::info!("data.gouv.fr MCP server ready");
        Ok(())
    }

    async fn write_response(
        &self,
        writer: &mut BufWriter<io::Stdout>,
        response: &Response,
    ) -> Result<(), ServerError> {
        let payload = serde_json::to_string(response).map_err(ServerError::Serialization)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn handle_request(&self, request: Request) -> Response {
        match self.dispatch(&request.method, request.params).await {
            Ok(result) => Response::success(request.id, result),
            Err(err) => Response::error(request.id, err),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, ServerError> {
        if method == "tools/call" {
            let params: CallToolParams = parse_required_params(method, params)?;
            if find_tool_spec(&params.name).is_none() {
                return Err(ServerError::InvalidMethod(params.name.clone()));
            }

            self.track(&params.name);
            let text = self.invoke_tool(&params.name, params.arguments).await?;
            let response = ToolResponse::text(text);
            return serde_json::to_value(response).map_err(ServerError::Serialization);
        }

        if find_tool_spec(method).is_some() {
            self.track(method);
            let text = self.invoke_tool(method, params).await?;
            let response = ToolResponse::text(text);
            return serde_json::to_value(response).map_err(ServerError::Serialization);
        }

        self.invoke_method(method, params).await
    }

    fn track(&self, tool_name: &str) {
        self.matomo
            .spawn_track(tool_name, &self.client.config().catalog.site_base);
    }

    async fn invoke_method(&self, method: &str, params: Option<Value>) -> Result<Value, ServerError> {
        match method {
            "initialize" => {
                let params: InitializeParams = parse_optional_params(method, params)?;
                let result = InitializeResult::new(params.client_info);
                Ok(serde_json::to_value(result).map_err(ServerError::Serialization)?)
            }
            "initialized" => Ok(Value::Null),
            "shutdown" => Ok(Value::Null),
            "tools/list" => {
                let params: ListToolsParams = parse_optional_params(method, params)?;
                let _ = params.cursor;
                let result = ListToolsResult {
                    tools: tool_descriptors(),
                    next_cursor: None,
                };
                Ok(serde_json::to_value(result).map_err(ServerError::Serialization)?)
            }
            other => Err(ServerError::InvalidMethod(other.to_string())),
        }
    }

    /// Run one tool. Tool failures never surface here: each tool
    /// resolves its own errors into the returned text, so the only
    /// errors left are malformed parameters.
    async fn invoke_tool(&self, name: &str, params: Option<Value>) -> Result<String, ServerError> {
        match name {
            "search_datasets" => {
                let params: SearchParams = parse_required_params(name, params)?;
                Ok(tools::search_datasets(
                    &self.client,
                    &params.query,
                    params.page,
                    params.page_size,
                )
                .await)
            }
            "search_dataservices" => {
                let params: SearchParams = parse_required_params(name, params)?;
                Ok(tools::search_dataservices(
                    &self.client,
                    &params.query,
                    params.page,
                    params.page_size,
                )
                .await)
            }
            "get_dataservice_info" => {
                let params: DataserviceParams = parse_required_params(name, params)?;
                Ok(tools::get_dataservice_info(&self.client, &params.dataservice_id).await)
            }
            "get_dataservice_openapi_spec" => {
                let params: DataserviceParams = parse_required_params(name, params)?;
                Ok(tools::get_dataservice_openapi_spec(&self.client, &params.dataservice_id).await)
            }
            "query_resource_data" => {
                let params: QueryResourceDataParams = parse_required_params(name, params)?;
                Ok(tools::query_resource_data(
                    &self.client,
                    &params.question,
                    &params.resource_id,
                    params.page,
                    params.page_size,
                )
                .await)
            }
            "get_dataset_info" => {
                let params: DatasetParams = parse_required_params(name, params)?;
                Ok(tools::get_dataset_info(&self.client, &params.dataset_id).await)
            }
            "list_dataset_resources" => {
                let params: DatasetParams = parse_required_params(name, params)?;
                Ok(tools::list_dataset_resources(&self.client, &params.dataset_id).await)
            }
            "get_resource_info" => {
                let params: ResourceParams = parse_required_params(name, params)?;
                Ok(tools::get_resource_info(&self.client, &params.resource_id).await)
            }
            "download_and_parse_resource" => {
                let params: DownloadAndParseParams = parse_required_params(name, params)?;
                Ok(tools::download_and_parse_resource(
                    &self.client,
                    &params.resource_id,
                    params.max_rows,
                )
                .await)
            }
            "get_metrics" => {
                let params: GetMetricsParams = parse_required_params(name, params)?;
                Ok(tools::get_metrics(
                    &self.client,
                    &params.model,
                    &params.id,
                    params.limit,
                    &params.sort_order,
                    params.as_csv,
                )
                .await)
            }
            "create_dataset" => {
                let params: CreateDatasetParams = parse_required_params(name, params)?;
                Ok(tools::create_dataset(
                    &self.client,
                    &params.title,
                    &params.description,
                    &params.frequency,
                    params.organization,
                    &params.license,
                    params.tags,
                    params.private,
                )
                .await)
            }
            other => Err(ServerError::InvalidMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default, rename = "jsonrpc")]
    _jsonrpc: Option<String>,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError>,
}

impl Response {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, error: ServerError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError::from(error)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl From<ServerError> for ResponseError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(message) => Self {
                code: -32600,
                message,
                data: None,
            },
            ServerError::InvalidMethod(method) => Self {
                code: -32601,
                message: format!("Unknown method: {method}"),
                data: None,
            },
            ServerError::InvalidParams(message) => Self {
                code: -32602,
                message,
                data: None,
            },
            ServerError::Json(err) => Self {
                code: -32700,
                message: err.to_string(),
                data: None,
            },
            ServerError::Io(err) => Self {
                code: -32020,
                message: err.to_string(),
                data: None,
            },
            ServerError::Datagouv(err) => Self {
                code: -32010,
                message: err.to_string(),
                data: None,
            },
            ServerError::Serialization(err) => Self {
                code: -32603,
                message: err.to_string(),
                data: None,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown method: {0}")]
    InvalidMethod(String),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Datagouv(#[from] datagouv::DatagouvError),
    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),
}

type ServerResult<T> = Result<T, ServerError>;

fn parse_required_params<T>(method: &str, params: Option<Value>) -> ServerResult<T>
where
    T: DeserializeOwned,
{
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| ServerError::InvalidParams(format!("{method}: {err}"))),
        None => Err(ServerError::InvalidParams(format!(
            "{method}: missing parameters"
        ))),
    }
}

fn parse_optional_params<T>(method: &str, params: Option<Value>) -> ServerResult<T>
where
    T: DeserializeOwned + Default,
{
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| ServerError::InvalidParams(format!("{method}: {err}"))),
        None => Ok(T::default()),
    }
}

fn default_page() -> i64 {
    1
}

fn default_search_page_size() -> i64 {
    20
}

fn default_query_page_size() -> i64 {
    100
}

fn default_max_rows() -> usize {
    100
}

fn default_metrics_limit() -> i64 {
    12
}

fn default_sort_order() -> String {
    "desc".to_string()
}

fn default_frequency() -> String {
    "unknown".to_string()
}

fn default_license() -> String {
    "fr-lo".to_string()
}

fn default_private() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_search_page_size")]
    page_size: i64,
}

#[derive(Debug, Deserialize)]
struct DatasetParams {
    dataset_id: String,
}

#[derive(Debug, Deserialize)]
struct ResourceParams {
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct DataserviceParams {
    dataservice_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResourceDataParams {
    question: String,
    resource_id: String,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_query_page_size")]
    page_size: i64,
}

#[derive(Debug, Deserialize)]
struct DownloadAndParseParams {
    resource_id: String,
    #[serde(default = "default_max_rows")]
    max_rows: usize,
}

#[derive(Debug, Deserialize)]
struct GetMetricsParams {
    model: String,
    id: String,
    #[serde(default = "default_metrics_limit")]
    limit: i64,
    #[serde(default = "default_sort_order")]
    sort_order: String,
    #[serde(default)]
    as_csv: bool,
}

#[derive(Debug, Deserialize)]
struct CreateDatasetParams {
    title: String,
    description: String,
    #[serde(default = "default_frequency")]
    frequency: String,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default = "default_license")]
    license: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default = "default_private")]
    private: bool,
}

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(default, rename = "clientInfo")]
    client_info: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct InitializeResult {
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "clientInfo")]
    client_info: Option<ClientInfoSummary>,
}

impl InitializeResult {
    fn new(client_info: Option<ClientInfo>) -> Self {
        let client_info = client_info.map(|info| ClientInfoSummary {
            name: info.name,
            version: info.version,
        });

        Self {
            server_info: ServerInfo {
                name: "datagouv-mcp-server",
                version: env!("CARGO_PKG_VERSION"),
            },
            capabilities: Some(json!({
                "tools": {
                    "list": true
                }
            })),
            client_info,
        }
    }
}

#[derive(Debug, Serialize)]
struct ServerInfo {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ClientInfoSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListToolsParams {
    #[serde(default, rename = "cursor")]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ListToolsResult {
    tools: Vec<ToolDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolResponse {
    content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    is_error: Option<bool>,
}

impl ToolResponse {
    fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

fn tool_descriptors() -> Vec<ToolDescriptor> {
    tool_specs()
        .into_iter()
        .map(|spec| ToolDescriptor {
            name: spec.name,
            description: spec.description,
            input_schema: spec.input_schema,
        })
        .collect()
}

fn find_tool_spec(name: &str) -> Option<ToolSpec> {
    tool_specs().into_iter().find(|spec| spec.name == name)
}

fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "search_datasets",
            description: "Search for datasets on data.gouv.fr by keywords",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Full-text search query (searches title, description, tags)"},
                    "page": {"type": "integer", "minimum": 1, "description": "Page number"},
                    "page_size": {"type": "integer", "minimum": 1, "maximum": 100, "description": "Results per page"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "search_dataservices",
            description: "Search for dataservices (third-party APIs registered in the catalog) by keywords",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Short, specific search query (generic words may return zero results)"},
                    "page": {"type": "integer", "minimum": 1, "description": "Page number"},
                    "page_size": {"type": "integer", "minimum": 1, "maximum": 100, "description": "Results per page"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "get_dataservice_info",
            description: "Get detailed metadata about a dataservice, including its base API URL and OpenAPI spec location",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dataservice_id": {"type": "string", "description": "Dataservice identifier"}
                },
                "required": ["dataservice_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "get_dataservice_openapi_spec",
            description: "Fetch and summarize the OpenAPI/Swagger spec of a dataservice: endpoints, methods and parameters",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dataservice_id": {"type": "string", "description": "Dataservice identifier"}
                },
                "required": ["dataservice_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "query_resource_data",
            description: "Fetch rows from a resource via the tabular API, with explicit pagination",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "What data you are looking for (recorded as context)"},
                    "resource_id": {"type": "string", "description": "Resource identifier (see list_dataset_resources)"},
                    "page": {"type": "integer", "minimum": 1, "description": "Page number"},
                    "page_size": {"type": "integer", "minimum": 1, "maximum": 200, "description": "Rows per page"}
                },
                "required": ["question", "resource_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "get_dataset_info",
            description: "Get metadata about a dataset: title, description, organization, tags, resource count",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dataset_id": {"type": "string", "description": "Dataset identifier"}
                },
                "required": ["dataset_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "list_dataset_resources",
            description: "List all resources (files) in a dataset with their IDs, formats, sizes and URLs",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dataset_id": {"type": "string", "description": "Dataset identifier"}
                },
                "required": ["dataset_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "get_resource_info",
            description: "Get metadata about a single resource (file), including its parent dataset",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "resource_id": {"type": "string", "description": "Resource identifier"}
                },
                "required": ["resource_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "download_and_parse_resource",
            description: "Download a resource file (CSV, JSON, JSONL, ZIP, gzip) and preview its parsed rows",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "resource_id": {"type": "string", "description": "Resource identifier"},
                    "max_rows": {"type": "integer", "minimum": 1, "maximum": 1000, "description": "Maximum number of rows to keep"}
                },
                "required": ["resource_id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "get_metrics",
            description: "Get monthly traffic metrics (visits, downloads) for a dataset, resource, organization or reuse",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "enum": ["datasets", "resources", "organizations", "reuses"], "description": "Which kind of object the ID refers to"},
                    "id": {"type": "string", "description": "Object identifier"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100, "description": "Maximum number of monthly records"},
                    "sort_order": {"type": "string", "enum": ["asc", "desc"], "description": "Sort order for the month field"},
                    "as_csv": {"type": "boolean", "description": "Return raw CSV instead of formatted text"}
                },
                "required": ["model", "id"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: "create_dataset",
            description: "Create a new dataset on data.gouv.fr (WRITE operation, requires DATAGOUV_API_KEY; datasets are created as private drafts by default)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Dataset title"},
                    "description": {"type": "string", "description": "Dataset description, markdown supported"},
                    "frequency": {"type": "string", "description": "Update frequency, e.g. unknown, daily, weekly, monthly, annual"},
                    "organization": {"type": ["string", "null"], "description": "Organization ID to publish under (personal account if omitted)"},
                    "license": {"type": "string", "description": "License identifier (default: fr-lo, Licence Ouverte)"},
                    "tags": {"type": ["array", "null"], "items": {"type": "string"}, "description": "Tags"},
                    "private": {"type": "boolean", "description": "Create as a private draft (default: true)"}
                },
                "required": ["title", "description"],
                "additionalProperties": false
            }),
        },
    ]
}
