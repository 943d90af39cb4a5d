//! [`PaymentStore`] backed by Supabase (PostgREST) RPC functions.
//!
//! Every operation is a `POST {base}/rest/v1/rpc/{function}` authenticated
//! with the service key. The insert function runs in a single transaction on
//! the database side.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::constants::{
    RPC_INSERT_PAYMENT, RPC_PAYMENT_EXISTS, RPC_PAYMENT_STATS, RPC_RECENT_PAYMENTS,
};
use crate::error::StoreError;
use crate::notification::{PaymentNotification, StpValue};
use crate::store::{InsertOutcome, PaymentStore, StatsSnapshot};

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

#[derive(Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    rpc_base: Url,
    service_key: String,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("rpc_base", &self.rpc_base.as_str())
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

impl SupabaseStore {
    /// `base_url` is the project URL, e.g. `https://abcd.supabase.co`.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        service_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| StoreError::Internal(format!("invalid backend URL {base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rpc_base = base
            .join("rest/v1/rpc/")
            .map_err(|e| StoreError::Internal(format!("invalid backend URL {base_url}: {e}")))?;

        Ok(Self {
            client,
            rpc_base,
            service_key: service_key.into(),
        })
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value, StoreError> {
        let url = self
            .rpc_base
            .join(function)
            .map_err(|e| StoreError::Internal(format!("invalid RPC name {function}: {e}")))?;

        let resp = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&params)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Unreachable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let parsed: Option<PostgrestError> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(err) => {
                    let message = match (err.message, err.details) {
                        (Some(m), Some(d)) => format!("{m} ({d})"),
                        (Some(m), None) => m,
                        (None, Some(d)) => d,
                        (None, None) => body.clone(),
                    };
                    (err.code, message)
                }
                None => (None, body),
            };
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            StoreError::UnexpectedResponse(format!("{function} returned invalid JSON: {e}"))
        })
    }
}

/// RPC arguments for `insertar_pago_stp`. Optional fields go out as null.
pub fn insert_params(n: &PaymentNotification) -> Value {
    let opt = |v: &Option<StpValue>| v.as_ref().map(StpValue::to_json).unwrap_or(Value::Null);

    json!({
        "p_claverastreo": n.tracking_key.to_json(),
        "p_concepto_pago": n.payment_concept.to_json(),
        "p_cuenta_beneficiario": n.beneficiary_account.to_json(),
        "p_cuenta_beneficiario2": opt(&n.secondary_beneficiary_account),
        "p_cuenta_ordenante": n.orderer_account.to_json(),
        "p_empresa": n.company.to_json(),
        "p_fecha_operacion": n.operation_date.to_json(),
        "p_folio_codi": opt(&n.codi_folio),
        "p_institucion_beneficiaria": n.beneficiary_institution.to_json(),
        "p_institucion_ordenante": n.ordering_institution.to_json(),
        "p_monto": n.amount.to_json(),
        "p_nombre_beneficiario": n.beneficiary_name.to_json(),
        "p_nombre_beneficiario2": opt(&n.secondary_beneficiary_name),
        "p_nombre_ordenante": n.orderer_name.to_json(),
        "p_referencia_numerica": n.numeric_reference.to_json(),
        "p_rfc_curp_beneficiario": n.beneficiary_tax_id.to_json(),
        "p_rfc_curp_ordenante": n.orderer_tax_id.to_json(),
        "p_stp_id": n.id.to_json(),
        "p_tipo_cuenta_beneficiario": n.beneficiary_account_type.to_json(),
        "p_tipo_cuenta_beneficiario2": opt(&n.secondary_beneficiary_account_type),
        "p_tipo_cuenta_ordenante": n.orderer_account_type.to_json(),
        "p_tipo_pago": n.payment_type.to_json(),
        "p_ts_liquidacion": n.settlement_timestamp.to_json(),
    })
}

/// Functions returning a single composite row may come back wrapped in an array.
fn first_row(value: Value) -> Value {
    match value {
        Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
        other => other,
    }
}

fn number_field(row: &Value, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl PaymentStore for SupabaseStore {
    async fn payment_exists(&self, tracking_key: &str) -> Result<bool, StoreError> {
        let data = self
            .rpc(RPC_PAYMENT_EXISTS, json!({ "p_clave_rastreo": tracking_key }))
            .await?;

        match first_row(data) {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            row @ Value::Object(_) => Ok(row.get("existe").and_then(Value::as_bool).unwrap_or(false)),
            other => Err(StoreError::UnexpectedResponse(format!(
                "{RPC_PAYMENT_EXISTS} returned {other}"
            ))),
        }
    }

    async fn insert_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<InsertOutcome, StoreError> {
        match self.rpc(RPC_INSERT_PAYMENT, insert_params(notification)).await {
            Ok(data) => Ok(InsertOutcome::Inserted(data)),
            Err(e) if e.is_unique_violation() => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }

    async fn stats(&self) -> Result<StatsSnapshot, StoreError> {
        let row = first_row(self.rpc(RPC_PAYMENT_STATS, json!({})).await?);

        Ok(StatsSnapshot {
            total_transactions: number_field(&row, "total_transacciones")
                .map(|n| n.max(0.0) as u64)
                .unwrap_or(0),
            total_amount: number_field(&row, "monto_total").unwrap_or(0.0),
        })
    }

    async fn recent_payments(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, StoreError> {
        let data = self
            .rpc(
                RPC_RECENT_PAYMENTS,
                json!({ "p_limit": limit, "p_offset": offset }),
            )
            .await?;

        match first_row(data).get_mut("data").map(Value::take) {
            Some(Value::Array(rows)) => Ok(rows),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(StoreError::UnexpectedResponse(format!(
                "{RPC_RECENT_PAYMENTS} returned data of type {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::tests::sample_payload;
    use mockito::Matcher;

    fn store_for(server: &mockito::ServerGuard) -> SupabaseStore {
        SupabaseStore::new(reqwest::Client::new(), &server.url(), "service-key").unwrap()
    }

    fn notification(key: &str) -> PaymentNotification {
        PaymentNotification::from_json(sample_payload(key)).unwrap()
    }

    #[test]
    fn rpc_base_handles_trailing_slash_and_subpath() {
        let c = reqwest::Client::new();
        let a = SupabaseStore::new(c.clone(), "https://x.supabase.co", "k").unwrap();
        let b = SupabaseStore::new(c.clone(), "https://x.supabase.co/", "k").unwrap();
        let p = SupabaseStore::new(c, "https://proxy.example.com/supa", "k").unwrap();
        assert_eq!(a.rpc_base.as_str(), "https://x.supabase.co/rest/v1/rpc/");
        assert_eq!(b.rpc_base.as_str(), "https://x.supabase.co/rest/v1/rpc/");
        assert_eq!(p.rpc_base.as_str(), "https://proxy.example.com/supa/rest/v1/rpc/");
    }

    #[test]
    fn debug_redacts_service_key() {
        let s = SupabaseStore::new(reqwest::Client::new(), "https://x.supabase.co", "secret").unwrap();
        let out = format!("{s:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn insert_params_map_every_field() {
        let mut payload = sample_payload("TRK1");
        payload["folioCodi"] = serde_json::json!("F-1");
        let params = insert_params(&PaymentNotification::from_json(payload).unwrap());

        assert_eq!(params.as_object().unwrap().len(), 23);
        assert_eq!(params["p_claverastreo"], "TRK1");
        assert_eq!(params["p_monto"], 1500.75);
        assert_eq!(params["p_stp_id"], 4321987);
        assert_eq!(params["p_folio_codi"], "F-1");
        assert_eq!(params["p_nombre_beneficiario2"], Value::Null);
        assert_eq!(params["p_tipo_cuenta_beneficiario2"], Value::Null);
    }

    #[tokio::test]
    async fn payment_exists_sends_key_and_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/verificar_pago_existe")
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_body(Matcher::Json(json!({ "p_clave_rastreo": "TRK1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"existe": true}"#)
            .create_async()
            .await;

        assert!(store_for(&server).payment_exists("TRK1").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn payment_exists_accepts_wrapped_and_bare_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/verificar_pago_existe")
            .match_body(Matcher::PartialJson(json!({ "p_clave_rastreo": "A" })))
            .with_body(r#"[{"existe": false}]"#)
            .create_async()
            .await;
        server
            .mock("POST", "/rest/v1/rpc/verificar_pago_existe")
            .match_body(Matcher::PartialJson(json!({ "p_clave_rastreo": "B" })))
            .with_body("true")
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(!store.payment_exists("A").await.unwrap());
        assert!(store.payment_exists("B").await.unwrap());
    }

    #[tokio::test]
    async fn insert_returns_backend_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/insertar_pago_stp")
            .match_body(Matcher::PartialJson(json!({
                "p_claverastreo": "TRK2",
                "p_empresa": "SOZU",
                "p_cuenta_beneficiario2": null
            })))
            .with_status(200)
            .with_body(r#"{"id": 77}"#)
            .create_async()
            .await;

        let outcome = store_for(&server)
            .insert_payment(&notification("TRK2"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(json!({ "id": 77 })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn insert_unique_violation_is_duplicate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/insertar_pago_stp")
            .with_status(409)
            .with_body(
                r#"{"code":"23505","message":"duplicate key value violates unique constraint \"pagos_stp_claverastreo_key\"","details":null,"hint":null}"#,
            )
            .create_async()
            .await;

        let outcome = store_for(&server)
            .insert_payment(&notification("TRK3"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
    }

    #[tokio::test]
    async fn insert_other_errors_are_rejections() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/insertar_pago_stp")
            .with_status(404)
            .with_body(r#"{"code":"PGRST202","message":"Could not find the function","details":"public.insertar_pago_stp"}"#)
            .create_async()
            .await;

        let err = store_for(&server)
            .insert_payment(&notification("TRK4"))
            .await
            .unwrap_err();
        match err {
            StoreError::Rejected { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code.as_deref(), Some("PGRST202"));
                assert!(message.contains("public.insertar_pago_stp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported() {
        let store =
            SupabaseStore::new(reqwest::Client::new(), "http://127.0.0.1:1", "k").unwrap();
        let err = store.stats().await.unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
    }

    #[tokio::test]
    async fn stats_reads_totals_with_defaults() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/obtener_stats_pagos")
            .with_body(r#"{"total_transacciones": 12, "monto_total": "9850.25"}"#)
            .create_async()
            .await;

        let stats = store_for(&server).stats().await.unwrap();
        assert_eq!(stats.total_transactions, 12);
        assert_eq!(stats.total_amount, 9850.25);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/obtener_stats_pagos")
            .with_body(r#"{"total_transacciones": null}"#)
            .create_async()
            .await;
        assert_eq!(store_for(&server).stats().await.unwrap(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn recent_payments_passes_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/obtener_transacciones_recientes")
            .match_body(Matcher::Json(json!({ "p_limit": 5, "p_offset": 10 })))
            .with_body(r#"{"data": [{"claverastreo": "A"}, {"claverastreo": "B"}]}"#)
            .create_async()
            .await;

        let rows = store_for(&server).recent_payments(5, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["claverastreo"], "B");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn recent_payments_null_data_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/obtener_transacciones_recientes")
            .with_body(r#"{"data": null}"#)
            .create_async()
            .await;

        assert!(store_for(&server).recent_payments(10, 0).await.unwrap().is_empty());
    }
}
