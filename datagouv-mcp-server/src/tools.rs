use datagouv::present::{display_value, format_file_size, render_rows_preview, truncate_text};
use datagouv::{
    DatagouvClient, DatagouvError, Environment, FileFormat, METRIC_MODELS, MetricsOptions,
    detect_format, is_gzipped, parse_csv, parse_json, parse_zip,
};
use datagouv_api::{ApiError, CreateDatasetRequest, tag_names};
use serde_json::Value;

/// Number of rows shown in data previews.
const SAMPLE_ROWS: usize = 3;

/// Upper bound on rows kept by download_and_parse_resource.
const MAX_KEPT_ROWS: usize = 1000;

pub const VALID_FREQUENCIES: &[&str] = &[
    "unknown",
    "punctual",
    "continuous",
    "hourly",
    "fourTimesADay",
    "threeTimesADay",
    "semidaily",
    "daily",
    "fourTimesAWeek",
    "threeTimesAWeek",
    "semiweekly",
    "weekly",
    "biweekly",
    "threeTimesAMonth",
    "semimonthly",
    "monthly",
    "bimonthly",
    "quarterly",
    "threeTimesAYear",
    "semiannual",
    "annual",
    "biennial",
    "triennial",
    "quinquennial",
    "irregular",
];

/// Generic words that drown out catalog search results. The search API
/// uses AND logic, so "données transports csv" finds nothing while
/// "transports" works.
const STOP_WORDS: &[&str] = &[
    "données",
    "donnees",
    "data",
    "dataset",
    "datasets",
    "jeu",
    "jeux",
    "fichier",
    "fichiers",
    "liste",
    "csv",
    "json",
    "xlsx",
    "open",
];

/// Strip generic stop words from a search query, keeping the original
/// when nothing specific would remain.
pub fn clean_search_query(query: &str) -> String {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(&word.to_lowercase().as_str()))
        .collect();
    if kept.is_empty() {
        query.trim().to_string()
    } else {
        kept.join(" ")
    }
}

/// The single place where internal errors become user-facing text.
/// Every tool failure resolves to a string starting with "Error:" so
/// the calling agent can read it and react; nothing is thrown across
/// the protocol boundary.
pub fn render_error(err: &DatagouvError) -> String {
    match err {
        DatagouvError::Catalog(ApiError::Api { status, message }) => {
            format!("Error: HTTP {status} - {message}")
        }
        DatagouvError::Http { status, message } => format!("Error: HTTP {status} - {message}"),
        DatagouvError::FileTooLarge { size, limit } => format!(
            "Error: File too large: {} exceeds the {} limit",
            format_file_size(*size),
            format_file_size(*limit)
        ),
        other => format!("Error: {other}"),
    }
}

/// Render a catalog error, mapping 404 to a friendlier message.
fn render_catalog_error(err: ApiError, not_found: String) -> String {
    match err {
        ApiError::Api { status: 404, .. } => not_found,
        other => render_error(&other.into()),
    }
}

fn site_base(client: &DatagouvClient) -> &str {
    &client.config().catalog.site_base
}

// === Search tools ===

pub async fn search_datasets(
    client: &DatagouvClient,
    query: &str,
    page: i64,
    page_size: i64,
) -> String {
    let result = match client.catalog().search_datasets(query, page, page_size).await {
        Ok(result) => result,
        Err(err) => return render_error(&err.into()),
    };

    if result.data.is_empty() {
        return format!("No datasets found for query: '{query}'");
    }

    let mut parts = vec![
        format!(
            "Found {} dataset(s) for query: '{query}'",
            result.total.unwrap_or(result.data.len() as i64)
        ),
        format!("Page {} of results:\n", result.page.unwrap_or(page)),
    ];
    for (index, dataset) in result.data.iter().enumerate() {
        parts.push(format!(
            "{}. {}",
            index + 1,
            dataset.display_title().unwrap_or("Untitled")
        ));
        parts.push(format!(
            "   ID: {}",
            dataset.id.as_deref().unwrap_or("unknown")
        ));
        if let Some(description) = dataset
            .description_short
            .as_deref()
            .filter(|d| !d.is_empty())
        {
            parts.push(format!("   Description: {}", truncate_text(description, 200)));
        }
        if let Some(name) = dataset
            .organization
            .as_ref()
            .and_then(|org| org.name.as_deref())
        {
            parts.push(format!("   Organization: {name}"));
        }
        let tags = tag_names(&dataset.tags);
        if !tags.is_empty() {
            parts.push(format!("   Tags: {}", tags[..tags.len().min(5)].join(", ")));
        }
        parts.push(format!("   Resources: {}", dataset.resources.len()));
        let slug = dataset
            .slug
            .as_deref()
            .or(dataset.id.as_deref())
            .unwrap_or_default();
        parts.push(format!("   URL: {}datasets/{}", site_base(client), slug));
        parts.push(String::new());
    }
    parts.join("\n")
}

pub async fn search_dataservices(
    client: &DatagouvClient,
    query: &str,
    page: i64,
    page_size: i64,
) -> String {
    let cleaned_query = clean_search_query(query);

    let mut result = match client
        .catalog()
        .search_dataservices(&cleaned_query, page, page_size)
        .await
    {
        Ok(result) => result,
        Err(err) => return render_error(&err.into()),
    };

    if result.data.is_empty() && cleaned_query != query {
        tracing::debug!(
            "no results with cleaned query '{cleaned_query}', trying original query '{query}'"
        );
        result = match client
            .catalog()
            .search_dataservices(query, page, page_size)
            .await
        {
            Ok(result) => result,
            Err(err) => return render_error(&err.into()),
        };
    }

    if result.data.is_empty() {
        return format!("No dataservices found for query: '{query}'");
    }

    let mut parts = vec![
        format!(
            "Found {} dataservice(s) for query: '{query}'",
            result.total.unwrap_or(result.data.len() as i64)
        ),
        format!("Page {} of results:\n", result.page.unwrap_or(page)),
    ];
    for (index, service) in result.data.iter().enumerate() {
        parts.push(format!("{}. {}", index + 1, service.display_title()));
        parts.push(format!(
            "   ID: {}",
            service.id.as_deref().unwrap_or("unknown")
        ));
        if let Some(description) = service.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("   Description: {}", truncate_text(description, 200)));
        }
        if let Some(name) = service
            .organization
            .as_ref()
            .and_then(|org| org.name.as_deref())
        {
            parts.push(format!("   Organization: {name}"));
        }
        if let Some(base_api_url) = service.base_api_url.as_deref() {
            parts.push(format!("   Base API URL: {base_api_url}"));
        }
        let tags = tag_names(&service.tags);
        if !tags.is_empty() {
            parts.push(format!("   Tags: {}", tags[..tags.len().min(5)].join(", ")));
        }
        parts.push(format!(
            "   URL: {}dataservices/{}/",
            site_base(client),
            service.id.as_deref().unwrap_or_default()
        ));
        parts.push(String::new());
    }
    parts.join("\n")
}

// === Dataservice tools ===

pub async fn get_dataservice_info(client: &DatagouvClient, dataservice_id: &str) -> String {
    let data = match client.catalog().dataservice(dataservice_id).await {
        Ok(data) => data,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Dataservice with ID '{dataservice_id}' not found."),
            );
        }
    };

    let mut parts = vec![
        format!("Dataservice Information: {}", data.display_title()),
        String::new(),
    ];

    if let Some(id) = data.id.as_deref() {
        parts.push(format!("ID: {id}"));
        parts.push(format!("URL: {}dataservices/{id}/", site_base(client)));
    }

    if let Some(description) = data.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(String::new());
        parts.push(format!("Description: {}", truncate_text(description, 500)));
    }

    parts.push(String::new());
    if let Some(base_api_url) = data.base_api_url.as_deref() {
        parts.push(format!("Base API URL: {base_api_url}"));
    }
    if let Some(doc_url) = data.machine_documentation_url.as_deref() {
        parts.push(format!("OpenAPI/Swagger spec: {doc_url}"));
    }

    if let Some(org) = &data.organization {
        parts.push(String::new());
        parts.push(format!(
            "Organization: {}",
            org.name.as_deref().unwrap_or("Unknown")
        ));
        if let Some(org_id) = org.id.as_deref() {
            parts.push(format!("  Organization ID: {org_id}"));
        }
    }

    let tags = tag_names(&data.tags);
    if !tags.is_empty() {
        parts.push(String::new());
        parts.push(format!("Tags: {}", tags[..tags.len().min(10)].join(", ")));
    }

    if let Some(created_at) = data.created_at.as_deref() {
        parts.push(String::new());
        parts.push(format!("Created: {created_at}"));
    }
    if let Some(last_update) = data.last_update.as_deref() {
        parts.push(format!("Last updated: {last_update}"));
    }

    if let Some(license) = data.license.as_deref() {
        parts.push(String::new());
        parts.push(format!("License: {license}"));
    }

    // The API returns a link object for related datasets, not a list
    if let Some(total) = data.datasets.as_ref().and_then(|link| link.total) {
        if total > 0 {
            parts.push(String::new());
            parts.push(format!("Related datasets: {total}"));
        }
    }

    parts.join("\n")
}

fn summarize_parameters(params: &[Value]) -> String {
    params
        .iter()
        .filter_map(Value::as_object)
        .map(|param| {
            let name = param.get("name").and_then(Value::as_str).unwrap_or("?");
            let location = param.get("in").and_then(Value::as_str).unwrap_or("");
            let required = param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let ptype = param
                .get("schema")
                .and_then(|schema| schema.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("");
            let marker = if required { " (required)" } else { "" };
            format!("      - {name} [{location}, {ptype}]{marker}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarize an OpenAPI spec into a concise text representation:
/// API info, servers, and endpoints with parameters. Response schemas,
/// model definitions and examples are skipped.
fn summarize_spec(spec: &serde_json::Map<String, Value>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(info) = spec.get("info").and_then(Value::as_object) {
        if let Some(title) = info.get("title").and_then(Value::as_str) {
            parts.push(format!("API: {title}"));
        }
        if let Some(version) = info.get("version").and_then(Value::as_str) {
            parts.push(format!("Version: {version}"));
        }
        if let Some(description) = info.get("description").and_then(Value::as_str) {
            parts.push(format!("Description: {}", truncate_text(description, 300)));
        }
    }

    if let Some(servers) = spec.get("servers").and_then(Value::as_array) {
        if !servers.is_empty() {
            parts.push(String::new());
            parts.push("Servers:".to_string());
            for server in servers.iter().take(3).filter_map(Value::as_object) {
                let url = server.get("url").and_then(Value::as_str).unwrap_or("");
                match server.get("description").and_then(Value::as_str) {
                    Some(description) if !description.is_empty() => {
                        parts.push(format!("  - {url} ({description})"))
                    }
                    _ => parts.push(format!("  - {url}")),
                }
            }
        }
    }

    // OpenAPI 2.0 (Swagger) carries the base URL in host/basePath
    if let Some(host) = spec.get("host").and_then(Value::as_str) {
        let scheme = spec
            .get("schemes")
            .and_then(Value::as_array)
            .and_then(|schemes| schemes.first())
            .and_then(Value::as_str)
            .unwrap_or("https");
        let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("");
        parts.push(format!("\nBase URL: {scheme}://{host}{base_path}"));
    }

    if let Some(paths) = spec.get("paths").and_then(Value::as_object) {
        if !paths.is_empty() {
            parts.push(String::new());
            parts.push(format!("Endpoints ({} paths):", paths.len()));
            for (path, methods) in paths {
                let Some(methods) = methods.as_object() else {
                    continue;
                };
                for (method, details) in methods {
                    if method.starts_with("x-") || method == "parameters" {
                        continue;
                    }
                    let Some(details) = details.as_object() else {
                        continue;
                    };
                    parts.push(format!("  {} {}", method.to_uppercase(), path));
                    let summary = details
                        .get("summary")
                        .or_else(|| details.get("description"))
                        .and_then(Value::as_str)
                        .and_then(|text| text.lines().next())
                        .map(|line| truncate_text(line, 120));
                    if let Some(summary) = summary.filter(|s| !s.is_empty()) {
                        parts.push(format!("    {summary}"));
                    }
                    if let Some(params) = details.get("parameters").and_then(Value::as_array) {
                        if !params.is_empty() {
                            parts.push(summarize_parameters(params));
                        }
                    }
                }
            }
        }
    }

    parts.join("\n")
}

pub async fn get_dataservice_openapi_spec(client: &DatagouvClient, dataservice_id: &str) -> String {
    let data = match client.catalog().dataservice(dataservice_id).await {
        Ok(data) => data,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Dataservice with ID '{dataservice_id}' not found."),
            );
        }
    };

    let title = data.display_title().to_string();
    let Some(doc_url) = data.machine_documentation_url.as_deref() else {
        let mut message = format!("Dataservice '{title}' has no machine_documentation_url.");
        if let Some(base_api_url) = data.base_api_url.as_deref() {
            message.push_str(&format!(" Base API URL is: {base_api_url}"));
        }
        return message;
    };

    let spec = match client.catalog().fetch_openapi_spec(doc_url).await {
        Ok(spec) => spec,
        Err(err) => return format!("Error fetching OpenAPI spec: {err}"),
    };

    let mut parts = vec![
        format!("OpenAPI spec for: {title}"),
        format!("Source: {doc_url}"),
    ];
    if let Some(base_api_url) = data.base_api_url.as_deref() {
        parts.push(format!("Base API URL: {base_api_url}"));
    }
    parts.push(String::new());
    parts.push(summarize_spec(&spec));

    parts.join("\n")
}

// === Dataset and resource tools ===

pub async fn get_dataset_info(client: &DatagouvClient, dataset_id: &str) -> String {
    let dataset = match client.catalog().dataset(dataset_id).await {
        Ok(dataset) => dataset,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Dataset with ID '{dataset_id}' not found."),
            );
        }
    };

    if dataset.id.is_none() {
        return format!("Error: Dataset with ID '{dataset_id}' not found.");
    }

    let mut parts = vec![
        format!(
            "Dataset Information: {}",
            dataset.display_title().unwrap_or("Unknown")
        ),
        String::new(),
        format!("ID: {}", dataset.id.as_deref().unwrap_or(dataset_id)),
    ];
    let slug = dataset
        .slug
        .as_deref()
        .or(dataset.id.as_deref())
        .unwrap_or_default();
    parts.push(format!("URL: {}datasets/{}", site_base(client), slug));

    let description = dataset
        .description_short
        .as_deref()
        .filter(|d| !d.is_empty())
        .or(dataset.description.as_deref().filter(|d| !d.is_empty()));
    if let Some(description) = description {
        parts.push(String::new());
        parts.push(format!("Description: {}", truncate_text(description, 500)));
    }

    if let Some(org) = &dataset.organization {
        parts.push(String::new());
        parts.push(format!(
            "Organization: {}",
            org.name.as_deref().unwrap_or("Unknown")
        ));
    }

    let tags = tag_names(&dataset.tags);
    if !tags.is_empty() {
        parts.push(String::new());
        parts.push(format!("Tags: {}", tags[..tags.len().min(10)].join(", ")));
    }

    parts.push(String::new());
    parts.push(format!("Resources: {}", dataset.resources.len()));
    parts.push("Use list_dataset_resources to see each file with its resource ID.".to_string());

    parts.join("\n")
}

pub async fn list_dataset_resources(client: &DatagouvClient, dataset_id: &str) -> String {
    let dataset = match client.catalog().dataset(dataset_id).await {
        Ok(dataset) => dataset,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Dataset with ID '{dataset_id}' not found."),
            );
        }
    };

    if dataset.id.is_none() {
        return format!("Error: Dataset with ID '{dataset_id}' not found.");
    }

    let mut parts = vec![
        format!(
            "Resources in dataset: {}",
            dataset.display_title().unwrap_or("Unknown")
        ),
        format!("Dataset ID: {dataset_id}"),
        format!("Total resources: {}\n", dataset.resources.len()),
    ];

    if dataset.resources.is_empty() {
        parts.push("This dataset has no resources.".to_string());
        return parts.join("\n");
    }

    for (index, resource) in dataset.resources.iter().enumerate() {
        let Some(resource_id) = resource.id.as_deref() else {
            continue;
        };
        parts.push(format!(
            "{}. {}",
            index + 1,
            resource.display_title().unwrap_or("Untitled")
        ));
        parts.push(format!("   Resource ID: {resource_id}"));
        if let Some(format) = resource.format.as_deref() {
            parts.push(format!("   Format: {format}"));
        }
        if let Some(size) = resource.filesize.filter(|size| *size >= 0) {
            parts.push(format!("   Size: {}", format_file_size(size as u64)));
        }
        if let Some(mime) = resource.mime.as_deref() {
            parts.push(format!("   MIME type: {mime}"));
        }
        if let Some(kind) = resource.kind.as_deref() {
            parts.push(format!("   Type: {kind}"));
        }
        if let Some(url) = resource.url.as_deref() {
            parts.push(format!("   URL: {url}"));
        }
        parts.push(String::new());
    }

    parts.join("\n")
}

pub async fn get_resource_info(client: &DatagouvClient, resource_id: &str) -> String {
    let meta = match client.catalog().resource_metadata(resource_id).await {
        Ok(meta) => meta,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Resource with ID '{resource_id}' not found."),
            );
        }
    };

    let mut parts = vec![
        format!(
            "Resource Information: {}",
            meta.title.as_deref().unwrap_or("Unknown")
        ),
        String::new(),
        format!("Resource ID: {}", meta.id),
    ];

    if let Some(description) = meta.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("Description: {}", truncate_text(description, 300)));
    }
    if let Some(format) = meta.format.as_deref() {
        parts.push(format!("Format: {format}"));
    }
    if let Some(size) = meta.filesize.filter(|size| *size >= 0) {
        parts.push(format!("Size: {}", format_file_size(size as u64)));
    }
    if let Some(mime) = meta.mime.as_deref() {
        parts.push(format!("MIME type: {mime}"));
    }
    if let Some(url) = meta.url.as_deref() {
        parts.push(format!("URL: {url}"));
    }

    if let Some(dataset_id) = meta.dataset_id.as_deref() {
        // Parent dataset context, best effort
        let dataset_title = match client.catalog().dataset(dataset_id).await {
            Ok(dataset) => dataset
                .display_title()
                .unwrap_or("Unknown")
                .to_string(),
            Err(_) => "Unknown".to_string(),
        };
        parts.push(String::new());
        parts.push(format!("Dataset: {dataset_title} (ID: {dataset_id})"));
    }

    parts.push(String::new());
    parts.push(
        "Next step: query_resource_data for tabular files, or download_and_parse_resource \
         for raw CSV/JSON/ZIP files."
            .to_string(),
    );

    parts.join("\n")
}

// === Data access tools ===

pub async fn query_resource_data(
    client: &DatagouvClient,
    question: &str,
    resource_id: &str,
    page: i64,
    page_size: i64,
) -> String {
    // Metadata lines are context, fetched best-effort
    let mut resource_title = "Unknown".to_string();
    let mut dataset_id: Option<String> = None;
    if let Ok(meta) = client.catalog().resource_metadata(resource_id).await {
        if let Some(title) = meta.title {
            resource_title = title;
        }
        dataset_id = meta.dataset_id;
    }

    let mut dataset_title = "Unknown".to_string();
    if let Some(dataset_id) = &dataset_id {
        if let Ok(dataset) = client.catalog().dataset(dataset_id).await {
            if let Some(title) = dataset.display_title() {
                dataset_title = title.to_string();
            }
        }
    }

    let mut parts = vec![
        format!("Querying resource: {resource_title}"),
        format!("Resource ID: {resource_id}"),
    ];
    if let Some(dataset_id) = &dataset_id {
        parts.push(format!("Dataset: {dataset_title} (ID: {dataset_id})"));
    }
    parts.push(format!("Question: {question}"));
    parts.push(String::new());

    tracing::info!(
        "querying tabular API for resource {resource_id} (page {page}, page_size {page_size})"
    );

    match client.fetch_resource_data(resource_id, page, page_size).await {
        Ok(data) => {
            if data.rows.is_empty() {
                parts.push("⚠️  No rows available (resource may be empty or filtered).".to_string());
                return parts.join("\n");
            }
            if let Some(total) = data.total {
                parts.push(format!("Total rows (tabular API): {total}"));
            }
            parts.push(format!("Retrieved: {} row(s)", data.rows.len()));
            parts.push(format!(
                "Page info: page {} (page size {})",
                data.page, data.page_size
            ));
            parts.push(String::new());
            parts.push(render_rows_preview(&data.rows, SAMPLE_ROWS));
            if data.has_next {
                parts.push(String::new());
                parts.push(
                    "More data available via the tabular API (next page link provided)."
                        .to_string(),
                );
            }
        }
        Err(DatagouvError::ResourceNotAvailable(message)) => {
            tracing::warn!("resource not available: {resource_id} - {message}");
            parts.push(format!("⚠️  {message}"));
            // The exception list explains permanent exclusions; checking
            // it is best-effort context only
            if let Ok(exceptions) = client.resource_exceptions(false).await {
                if exceptions.contains(resource_id) {
                    parts.push(
                        "This resource is on the tabular API exception list \
                         (excluded from parsing)."
                            .to_string(),
                    );
                }
            }
            parts.push("Try download_and_parse_resource to read the raw file instead.".to_string());
        }
        Err(DatagouvError::Http { status, message }) => {
            tracing::error!("tabular API HTTP error for resource {resource_id}: {status}");
            parts.push(format!("❌ Tabular API error (HTTP {status}: {message})"));
        }
        Err(err) => {
            tracing::error!("unexpected error querying resource {resource_id}: {err}");
            parts.push(format!("❌ Error querying resource: {err}"));
        }
    }

    parts.join("\n")
}

pub async fn download_and_parse_resource(
    client: &DatagouvClient,
    resource_id: &str,
    max_rows: usize,
) -> String {
    let max_rows = max_rows.clamp(1, MAX_KEPT_ROWS);

    let meta = match client.catalog().resource_metadata(resource_id).await {
        Ok(meta) => meta,
        Err(err) => {
            return render_catalog_error(
                err,
                format!("Error: Resource with ID '{resource_id}' not found."),
            );
        }
    };

    let Some(url) = meta.url.clone() else {
        return "Error: Resource has no downloadable URL.".to_string();
    };

    let mut parts = vec![
        format!(
            "Downloading resource: {}",
            meta.title.as_deref().unwrap_or("Unknown")
        ),
        format!("Resource ID: {resource_id}"),
        format!("URL: {url}"),
        String::new(),
    ];

    let payload = match client.download_resource(&url).await {
        Ok(payload) => payload,
        Err(err) => {
            parts.push(render_error(&err));
            return parts.join("\n");
        }
    };

    let format = detect_format(&payload.filename, payload.content_type.as_deref());
    let gzipped = is_gzipped(&payload.filename);
    parts.push(format!(
        "Downloaded file: {} ({})",
        payload.filename,
        format_file_size(payload.bytes.len() as u64)
    ));
    parts.push(format!("Detected format: {}", format.label()));

    let parsed = match format {
        FileFormat::Csv => parse_csv(&payload.bytes, gzipped).map(|rows| (rows, None)),
        FileFormat::Json => parse_json(&payload.bytes, gzipped).map(|rows| (rows, None)),
        FileFormat::Zip => parse_zip(&payload.bytes).map(|(rows, inner)| (rows, Some(inner))),
        // A bare .gz hides its inner format; CSV is by far the most
        // common on the platform, JSON the only other candidate
        FileFormat::Gzip => parse_csv(&payload.bytes, true)
            .or_else(|_| parse_json(&payload.bytes, true))
            .map(|rows| (rows, None)),
        FileFormat::Xlsx | FileFormat::Xls | FileFormat::Xml | FileFormat::Unknown => {
            parts.push(String::new());
            parts.push(format!(
                "⚠️  Files of this type are not parsed inline. Download the file directly: {url}"
            ));
            return parts.join("\n");
        }
    };

    let (mut rows, inner_filename) = match parsed {
        Ok(result) => result,
        Err(err) => {
            parts.push(render_error(&err));
            return parts.join("\n");
        }
    };
    if let Some(inner_filename) = inner_filename {
        parts.push(format!("Extracted from archive: {inner_filename}"));
    }

    let parsed_total = rows.len();
    rows.truncate(max_rows);
    parts.push(format!(
        "Parsed {parsed_total} row(s); keeping the first {}",
        rows.len()
    ));
    parts.push(String::new());

    if rows.is_empty() {
        parts.push("⚠️  No rows parsed (file may be empty).".to_string());
    } else {
        parts.push(render_rows_preview(&rows, SAMPLE_ROWS));
    }

    parts.join("\n")
}

// === Metrics tool ===

pub async fn get_metrics(
    client: &DatagouvClient,
    model: &str,
    id: &str,
    limit: i64,
    sort_order: &str,
    as_csv: bool,
) -> String {
    let model = model.trim().to_lowercase();
    if !METRIC_MODELS.contains(&model.as_str()) {
        return format!(
            "Error: Invalid model '{model}'.\nValid values are: {}",
            METRIC_MODELS.join(", ")
        );
    }

    let sort_order = sort_order.trim().to_lowercase();
    if sort_order != "asc" && sort_order != "desc" {
        return format!("Error: Invalid sort_order '{sort_order}'.\nValid values are: asc, desc");
    }

    let options = MetricsOptions {
        limit,
        sort_order,
        ..Default::default()
    };

    if as_csv {
        return match client.get_metrics_csv(&model, id, &options).await {
            Ok(csv) => format!("Metrics for {model} '{}' (CSV):\n\n{csv}", id.trim()),
            Err(err) => render_error(&err),
        };
    }

    match client.get_metrics(&model, id, &options).await {
        Ok(records) if records.is_empty() => {
            format!("No metrics found for {model} with ID '{}'.", id.trim())
        }
        Ok(records) => {
            let mut parts = vec![
                format!(
                    "Metrics for {model} '{}' ({} record(s), monthly):",
                    id.trim(),
                    records.len()
                ),
                String::new(),
            ];
            for record in &records {
                let month = record
                    .get("metric_month")
                    .map(display_value)
                    .unwrap_or_else(|| "?".to_string());
                let fields: Vec<String> = record
                    .iter()
                    .filter(|(key, _)| {
                        key.as_str() != "metric_month"
                            && key.as_str() != "__id"
                            && !key.ends_with("_id")
                    })
                    .map(|(key, value)| format!("{key}: {}", display_value(value)))
                    .collect();
                parts.push(format!("  {month}: {}", fields.join(", ")));
            }
            parts.join("\n")
        }
        Err(err) => render_error(&err),
    }
}

// === Write tool ===

pub async fn create_dataset(
    client: &DatagouvClient,
    title: &str,
    description: &str,
    frequency: &str,
    organization: Option<String>,
    license: &str,
    tags: Option<Vec<String>>,
    private: bool,
) -> String {
    // All validation happens before any network call
    if client.config().catalog.api_key.is_none() {
        return "Error: No API key configured.\n\
                Set the DATAGOUV_API_KEY environment variable to publish datasets.\n\
                You can get your API key from your data.gouv.fr profile settings:\n\
                https://www.data.gouv.fr/fr/admin/me"
            .to_string();
    }

    if !VALID_FREQUENCIES.contains(&frequency) {
        let mut valid: Vec<&str> = VALID_FREQUENCIES.to_vec();
        valid.sort_unstable();
        return format!(
            "Error: Invalid frequency '{frequency}'.\nValid values are: {}",
            valid.join(", ")
        );
    }

    if title.trim().is_empty() {
        return "Error: title is required and cannot be empty.".to_string();
    }
    if description.trim().is_empty() {
        return "Error: description is required and cannot be empty.".to_string();
    }

    let env_label = match client.config().environment {
        Environment::Demo => "demo.data.gouv.fr",
        Environment::Prod => "www.data.gouv.fr (PRODUCTION)",
    };

    let for_organization = organization.is_some();
    let request = CreateDatasetRequest {
        title: title.trim().to_string(),
        description: description.trim().to_string(),
        frequency: frequency.to_string(),
        organization,
        license: license.to_string(),
        tags,
        private,
    };

    match client.catalog().create_dataset(&request).await {
        Ok(result) => {
            let dataset_id = result.id.as_deref().unwrap_or("unknown");
            let slug = result.slug.as_deref().unwrap_or(dataset_id);
            let site_url = format!("{}datasets/{slug}/", site_base(client));
            let created_private = result.private.unwrap_or(true);
            let status = if created_private {
                "PRIVATE (draft)"
            } else {
                "PUBLIC"
            };

            let mut parts = vec![
                format!("Dataset created successfully on {env_label}:"),
                String::new(),
                format!("  Title: {}", result.title.as_deref().unwrap_or(title)),
                format!("  ID: {dataset_id}"),
                format!("  Slug: {slug}"),
                format!("  URL: {site_url}"),
                format!("  Status: {status}"),
                format!(
                    "  License: {}",
                    result.license.as_deref().unwrap_or(request.license.as_str())
                ),
                format!(
                    "  Frequency: {}",
                    result
                        .frequency
                        .as_deref()
                        .unwrap_or(request.frequency.as_str())
                ),
            ];

            if let Some(name) = result
                .organization
                .as_ref()
                .and_then(|org| org.name.as_deref())
            {
                parts.push(format!("  Organization: {name}"));
            }

            if created_private {
                parts.push(String::new());
                parts.push("Next steps:".to_string());
                parts.push(
                    "  - When ready, set private=false to make it publicly visible".to_string(),
                );
            }

            tracing::info!(
                "dataset created: id={dataset_id} title='{title}' env={env_label} private={private}"
            );

            parts.join("\n")
        }
        Err(ApiError::Api { status: 401, .. }) => "Error: Authentication failed (HTTP 401).\n\
             Your API key may be invalid or expired.\n\
             Check your DATAGOUV_API_KEY environment variable."
            .to_string(),
        Err(ApiError::Api {
            status: 403,
            message,
        }) => {
            let scope = if for_organization {
                "for this organization"
            } else {
                "with this account"
            };
            format!(
                "Error: Permission denied (HTTP 403).\n\
                 You may not have permission to publish {scope}.\n\
                 Details: {message}"
            )
        }
        Err(err) => render_error(&err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::clean_search_query;

    #[test]
    fn clean_search_query_removes_generic_stop_words() {
        assert_eq!(clean_search_query("données transports csv"), "transports");
    }

    #[test]
    fn clean_search_query_keeps_specific_terms() {
        assert_eq!(
            clean_search_query("prix immobilier paris"),
            "prix immobilier paris"
        );
    }

    #[test]
    fn clean_search_query_falls_back_to_original_when_everything_is_generic() {
        assert_eq!(clean_search_query("données csv"), "données csv");
    }
}
