//! Hosted backend over its PostgREST interface (`/rest/v1/<table>`).

use super::RemoteBackend;
use crate::{
    config::RemoteConfig,
    error::{LigaError, LigaResult},
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;

/// Rows fetched per page by `select_all`; matches the server's default cap.
const PAGE_SIZE: usize = 1000;

pub struct PostgrestClient {
    http:         Client,
    base_url:     String,
    anon_key:     String,
    access_token: Option<String>,
}

impl PostgrestClient {
    pub fn new(config: &RemoteConfig) -> LigaResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// Send requests as a signed-in user instead of the anonymous role.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }
}

fn check(resp: Response) -> LigaResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_else(|_| "Unknown error".to_string());
    Err(LigaError::Remote {
        status: status.as_u16(),
        body,
    })
}

fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

impl RemoteBackend for PostgrestClient {
    fn select_all(&self, table: &str) -> LigaResult<Vec<Value>> {
        let mut rows = Vec::new();
        let mut offset = 0usize;
        loop {
            let req = self.http.get(self.table_url(table)).query(&[
                ("select", "*".to_string()),
                ("offset", offset.to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ]);
            let page: Vec<Value> = check(self.authorized(req).send()?)?.json()?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }
        log::debug!("remote select {table}: {} rows", rows.len());
        Ok(rows)
    }

    fn upsert(&self, table: &str, rows: &[Value]) -> LigaResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let req = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        check(self.authorized(req).send()?)?;
        Ok(())
    }

    fn delete_eq(&self, table: &str, column: &str, value: &str) -> LigaResult<()> {
        let req = self
            .http
            .delete(self.table_url(table))
            .query(&[(column, format!("eq.{value}"))]);
        check(self.authorized(req).send()?)?;
        Ok(())
    }

    fn delete_in(&self, table: &str, column: &str, values: &[String]) -> LigaResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let req = self
            .http
            .delete(self.table_url(table))
            .query(&[(column, in_list(values))]);
        check(self.authorized(req).send()?)?;
        Ok(())
    }

    fn delete_all(&self, table: &str) -> LigaResult<()> {
        // The server refuses unfiltered deletes; match every row instead.
        let req = self
            .http
            .delete(self.table_url(table))
            .query(&[("id", "not.is.null")]);
        check(self.authorized(req).send()?)?;
        Ok(())
    }

    fn count(&self, table: &str) -> LigaResult<u64> {
        let req = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0");
        let resp = check(self.authorized(req).send()?)?;
        let total = resp
            .headers()
            .get("content-range")
            .and_then(|h| h.to_str().ok())
            .and_then(parse_content_range_total);
        total.ok_or_else(|| {
            LigaError::Other(anyhow::anyhow!("count on {table}: missing Content-Range total"))
        })
    }
}
