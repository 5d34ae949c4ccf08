use lambda_http::http::{Method, StatusCode};
use lambda_http::{tracing, Body, Error, Request, RequestExt, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{Credentials, ProxyConfig};
use crate::error::ProxyError;
use crate::upstream::{Upstream, UpstreamRequest};

#[derive(Default, Deserialize)]
struct RowWrite {
    table: Option<Value>,
    fields: Option<Value>,
    id: Option<Value>,
}

impl RowWrite {
    fn table(&self) -> Option<&str> {
        match &self.table {
            Some(Value::String(table)) if !table.is_empty() => Some(table),
            _ => None,
        }
    }

    /// Numeric ids are accepted as their decimal text.
    fn id(&self) -> Result<Option<String>, ProxyError> {
        match &self.id {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) if id.is_empty() => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(Value::Number(id)) => Ok(Some(id.to_string())),
            Some(_) => Err(ProxyError::BadRequest("id must be a string")),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, ProxyError> {
        Ok(Self {
            status,
            body: serde_json::to_string(value)?,
        })
    }
}

pub(crate) async fn function_handler<U: Upstream>(
    config: ProxyConfig,
    upstream: &U,
    event: Request,
) -> Result<Response<Body>, Error> {
    if *event.method() == Method::OPTIONS {
        return respond(StatusCode::OK, Body::Empty);
    }

    match proxy(&config, upstream, &event).await {
        Ok(reply) => respond(reply.status, Body::Text(reply.body)),
        Err(err) => error_response(&err),
    }
}

async fn proxy<U: Upstream>(
    config: &ProxyConfig,
    upstream: &U,
    event: &Request,
) -> Result<Reply, ProxyError> {
    let creds = config.credentials()?;

    match event.method().as_str() {
        "GET" => list_rows(&creds, upstream, event).await,
        "POST" | "PATCH" => write_row(&creds, upstream, event).await,
        _ => Err(ProxyError::MethodNotAllowed),
    }
}

fn query_param<'a>(event: &'a Request, name: &str) -> Option<&'a str> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .filter(|value| !value.is_empty())
}

async fn list_rows<U: Upstream>(
    creds: &Credentials<'_>,
    upstream: &U,
    event: &Request,
) -> Result<Reply, ProxyError> {
    let table = query_param(event, "table")
        .ok_or(ProxyError::BadRequest("table parameter required"))?;

    let mut url = creds.table_url(table, None)?;
    if let Some(filter) = query_param(event, "filter") {
        url.query_pairs_mut().append_pair("filterByFormula", filter);
    }
    tracing::debug!(table, url = %url, "listing rows");

    let reply = upstream
        .send(UpstreamRequest {
            method: Method::GET,
            url,
            bearer: creds.api_key.to_string(),
            body: None,
        })
        .await?;

    // The caller always sees 200 and a single page of records.
    if !reply.status.is_success() {
        tracing::warn!(
            status = reply.status.as_u16(),
            table,
            "airtable rejected list request, replying with records only"
        );
    }

    let mut data: Value = serde_json::from_str(&reply.body)?;
    if !data.is_object() {
        return Err(ProxyError::Upstream(format!(
            "unexpected airtable list response: {data}"
        )));
    }
    if data.get("offset").is_some() {
        tracing::warn!(table, "airtable has more pages, only the first is relayed");
    }
    let records = data
        .get_mut("records")
        .map(Value::take)
        .filter(|records| !records.is_null())
        .unwrap_or_else(|| Value::Array(Vec::new()));

    Reply::json(StatusCode::OK, &records)
}

async fn write_row<U: Upstream>(
    creds: &Credentials<'_>,
    upstream: &U,
    event: &Request,
) -> Result<Reply, ProxyError> {
    let raw: &[u8] = event.body().as_ref();
    let body: Value = if raw.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(raw)?
    };
    let write: RowWrite = if body.is_object() {
        serde_json::from_value(body)?
    } else {
        RowWrite::default()
    };

    let fields = write.fields.as_ref().filter(|fields| fields.is_object());
    let (Some(table), Some(fields)) = (write.table(), fields) else {
        return Err(ProxyError::BadRequest("table and fields required"));
    };
    let id = write.id()?;
    let id = id.as_deref();

    // A record id selects update, whatever the inbound method was.
    let method = if id.is_some() { Method::PATCH } else { Method::POST };
    if *event.method() == Method::PATCH && id.is_none() {
        tracing::debug!(table, "PATCH without id, creating a new record");
    }

    let url = creds.table_url(table, id)?;
    tracing::debug!(
        table,
        fields = ?fields.as_object().map(|f| f.keys().collect::<Vec<_>>()),
        method = %method,
        url = %url,
        "writing row"
    );

    let reply = upstream
        .send(UpstreamRequest {
            method,
            url,
            bearer: creds.api_key.to_string(),
            body: Some(json!({ "fields": fields })),
        })
        .await?;

    let data: Value = serde_json::from_str(&reply.body)?;
    Reply::json(reply.status, &data)
}

fn respond(status: StatusCode, body: Body) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .header("Content-Type", "application/json")
        .body(body)?)
}

fn error_response(err: &ProxyError) -> Result<Response<Body>, Error> {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(error = %err, "proxy request failed");
    }
    let body = serde_json::to_string(&ErrorResponse {
        error: err.to_string(),
    })?;
    respond(status, Body::Text(body))
}
