use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{require_filters, Backend, Collection, Filter, Select};
use crate::error::DeskError;

/// Client for a PostgREST-style hosted database (`/rest/v1/<table>`).
pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, collection: Collection, params: &[(String, String)]) -> String {
        let mut url = format!("{}/rest/v1/{}", self.base_url, collection);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Quote a value for an `in.(...)` list when it contains list syntax.
fn quote_list_value(v: &str) -> String {
    if v.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        v.to_string()
    }
}

pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(c, v) => (c.clone(), format!("eq.{v}")),
            Filter::In(c, vs) => {
                let list: Vec<String> = vs.iter().map(|v| quote_list_value(v)).collect();
                (c.clone(), format!("in.({})", list.join(",")))
            }
            Filter::Is(c, b) => (c.clone(), format!("is.{b}")),
            Filter::Contains(c, v) => (c.clone(), format!("ilike.*{v}*")),
        })
        .collect()
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, DeskError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => {
            let mut msg = body.message;
            if let Some(details) = body.details.filter(|d| !d.is_empty()) {
                msg.push_str(&format!(" ({details})"));
            }
            if let Some(hint) = body.hint.filter(|h| !h.is_empty()) {
                msg.push_str(&format!("; hint: {hint}"));
            }
            msg
        }
        Err(_) if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => text,
    };
    Err(DeskError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &str {
        "rest"
    }

    async fn select(&self, collection: Collection, query: &Select) -> Result<Vec<Value>, DeskError> {
        let mut columns = String::from("*");
        for hint in &query.expand {
            columns.push(',');
            columns.push_str(hint);
        }
        let mut params = vec![("select".to_string(), columns)];
        params.extend(filter_params(&query.filters));
        let direction = if query.order.descending { "desc" } else { "asc" };
        params.push(("order".into(), format!("{}.{direction}", query.order.column)));

        let url = self.url(collection, &params);
        tracing::debug!(%collection, %url, "select");
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        let rows: Vec<Value> = check(resp).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, DeskError> {
        let url = self.url(collection, &[]);
        tracing::debug!(%collection, "insert");
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Value> = check(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DeskError::Parse(format!("{collection} insert returned no row")))
    }

    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, DeskError> {
        require_filters("update", filters)?;
        let url = self.url(collection, &filter_params(filters));
        tracing::debug!(%collection, %url, "update");
        let resp = self
            .request(reqwest::Method::PATCH, &url)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<Vec<Value>, DeskError> {
        require_filters("delete", filters)?;
        let url = self.url(collection, &filter_params(filters));
        tracing::debug!(%collection, %url, "delete");
        let resp = self
            .request(reqwest::Method::DELETE, &url)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn count(&self, collection: Collection, filters: &[Filter]) -> Result<u64, DeskError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filters));
        let url = self.url(collection, &params);
        let resp = self
            .request(reqwest::Method::HEAD, &url)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let resp = check(resp).await?;
        let range = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DeskError::Parse(format!("{collection} count: no Content-Range header")))?;
        parse_content_range_total(range)
    }
}

/// `0-24/573` or `*/0` → total after the slash.
fn parse_content_range_total(range: &str) -> Result<u64, DeskError> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| DeskError::Parse(format!("bad Content-Range '{range}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> RestBackend {
        RestBackend::new(format!("{}/", server.uri()), "anon-key".into())
    }

    #[test]
    fn filter_params_use_postgrest_operators() {
        let params = filter_params(&[
            Filter::eq("id", "T1"),
            Filter::In("status".into(), vec!["open".into(), "on hold".into()]),
            Filter::Is("is_active".into(), true),
            Filter::Contains("title".into(), "vpn".into()),
        ]);
        assert_eq!(
            params,
            vec![
                ("id".into(), "eq.T1".into()),
                ("status".into(), "in.(open,\"on hold\")".into()),
                ("is_active".into(), "is.true".into()),
                ("title".into(), "ilike.*vpn*".into()),
            ]
        );
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-24/573").unwrap(), 573);
        assert_eq!(parse_content_range_total("*/0").unwrap(), 0);
        assert!(parse_content_range_total("0-24/*").is_err());
    }

    #[tokio::test]
    async fn select_sends_expansion_order_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/tickets"))
            .and(query_param("select", "*,comments:ticket_comments(*)"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("status", "eq.open"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "T1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let query = Select::expanding(&["comments:ticket_comments(*)"]).filter(Filter::eq("status", "open"));
        let rows = backend(&server).select(Collection::Tickets, &query).await.unwrap();
        assert_eq!(rows, vec![json!({"id": "T1"})]);
    }

    #[tokio::test]
    async fn rejected_request_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tickets"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "23502",
                "message": "null value in column \"title\"",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .insert(Collection::Tickets, json!({"description": "x"}))
            .await
            .unwrap_err();
        match err {
            DeskError::Backend { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("null value in column"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn insert_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tickets"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({"title": "New"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"id": "T9", "title": "New", "created_at": "2024-01-01T00:00:00Z"}])),
            )
            .mount(&server)
            .await;

        let row = backend(&server)
            .insert(Collection::Tickets, json!({"title": "New"}))
            .await
            .unwrap();
        assert_eq!(row["id"], "T9");
    }

    #[tokio::test]
    async fn update_and_delete_target_filtered_rows() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/tickets"))
            .and(query_param("id", "eq.T1"))
            .and(body_json(json!({"status": "resolved"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "T1", "status": "resolved"}])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/tickets"))
            .and(query_param("id", "eq.T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let b = backend(&server);
        let updated = b
            .update(Collection::Tickets, &[Filter::eq("id", "T1")], json!({"status": "resolved"}))
            .await
            .unwrap();
        assert_eq!(updated[0]["status"], "resolved");

        let deleted = b.delete(Collection::Tickets, &[Filter::eq("id", "T2")]).await.unwrap();
        assert!(deleted.is_empty());
    }

    #[tokio::test]
    async fn unfiltered_delete_is_refused_locally() {
        let server = MockServer::start().await;
        let err = backend(&server).delete(Collection::Tickets, &[]).await.unwrap_err();
        assert!(matches!(err, DeskError::Backend { status: 400, .. }));
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/knowledge_base"))
            .and(header("prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-9/42"))
            .mount(&server)
            .await;

        let n = backend(&server).count(Collection::KnowledgeBase, &[]).await.unwrap();
        assert_eq!(n, 42);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let b = RestBackend::new("http://127.0.0.1:9".into(), "k".into());
        let err = b.select(Collection::Tickets, &Select::default()).await.unwrap_err();
        assert!(matches!(err, DeskError::Network(_)));
        assert!(err.is_retryable());
    }
}
