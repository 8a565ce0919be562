use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Result, ShopfloorError};
use crate::models::Row;
#[cfg(test)]
use crate::settings::DEFAULT_BASE_URL;
use crate::table::{Payload, TableApi, TableOp};

const ACCESS_KEY_HEADER: &str = "ApplicationAccessKey";

#[derive(Serialize)]
struct ActionBody<'a> {
    #[serde(rename = "Action")]
    action: &'a str,
    #[serde(rename = "Properties")]
    properties: Properties<'a>,
    #[serde(rename = "Rows")]
    rows: &'a [Row],
}

#[derive(Serialize)]
struct Properties<'a> {
    #[serde(rename = "Locale")]
    locale: &'a str,
}

pub struct AppSheetTable {
    client: Client,
    base_url: String,
    app_id: String,
    access_key: String,
}

impl AppSheetTable {
    pub fn new(base_url: &str, app_id: &str, access_key: &str) -> Result<Self> {
        if app_id.trim().is_empty() {
            return Err(ShopfloorError::Settings("appsheet.app_id is not set".to_string()));
        }
        if access_key.trim().is_empty() {
            return Err(ShopfloorError::Settings(
                "no access key (set SHOPFLOOR_ACCESS_KEY or run `shopfloor init`)".to_string(),
            ));
        }
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.trim().to_string(),
            access_key: access_key.trim().to_string(),
        })
    }

    pub fn action_url(&self, table: &str) -> String {
        format!("{}/apps/{}/tables/{}/Action", self.base_url, self.app_id, table)
    }
}

/// The endpoint answers Find with a bare array and mutations with `{Rows: [...]}`.
/// Anything else (an empty body included) is read as no rows.
pub fn rows_from_response(body: Value) -> Result<Vec<Row>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("Rows") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(ShopfloorError::Transport(format!("expected a row object, got {other}"))),
        })
        .collect()
}

impl TableApi for AppSheetTable {
    fn request(&self, table: &str, op: TableOp, payload: Payload) -> Result<Vec<Row>> {
        let url = self.action_url(table);
        debug!(table, %op, rows = payload.rows.len(), "remote table request");
        let body = ActionBody {
            action: op.as_str(),
            properties: Properties { locale: "vi-VN" },
            rows: &payload.rows,
        };
        let resp = self
            .client
            .post(&url)
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .json(&body)
            .send()
            .inspect_err(|e| error!(table, %op, "request failed: {e}"))?;

        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            error!(table, %op, %status, "table API rejected request");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ShopfloorError::Transport(format!("access denied ({status}): {text}"))
                }
                _ => ShopfloorError::Transport(format!("{status}: {text}")),
            });
        }
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        rows_from_response(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_url() {
        let t = AppSheetTable::new("https://example.test/api/v2/", "app-1", "key").unwrap();
        assert_eq!(t.action_url("BC"), "https://example.test/api/v2/apps/app-1/tables/BC/Action");
    }

    #[test]
    fn test_new_requires_app_and_key() {
        assert!(matches!(
            AppSheetTable::new(DEFAULT_BASE_URL, "", "key"),
            Err(ShopfloorError::Settings(_))
        ));
        assert!(matches!(
            AppSheetTable::new(DEFAULT_BASE_URL, "app", " "),
            Err(ShopfloorError::Settings(_))
        ));
    }

    #[test]
    fn test_body_shape() {
        let rows = vec![json!({"ID": "BC001"}).as_object().unwrap().clone()];
        let body = ActionBody {
            action: TableOp::Add.as_str(),
            properties: Properties { locale: "vi-VN" },
            rows: &rows,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"Action": "Add", "Properties": {"Locale": "vi-VN"}, "Rows": [{"ID": "BC001"}]})
        );
    }

    #[test]
    fn test_rows_from_response_shapes() {
        assert_eq!(rows_from_response(json!([{"ID": "BC001"}])).unwrap().len(), 1);
        assert_eq!(rows_from_response(json!({"Rows": [{"ID": "BC001"}, {"ID": "BC002"}]})).unwrap().len(), 2);
        assert!(rows_from_response(json!({})).unwrap().is_empty());
        assert!(rows_from_response(json!([1])).is_err());
    }
}
