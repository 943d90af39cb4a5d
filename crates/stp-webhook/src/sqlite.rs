use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::notification::{PaymentNotification, StpValue};
use crate::store::{InsertOutcome, PaymentStore, StatsSnapshot};

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Columns written on insert, in bind order.
const PAYMENT_COLUMNS: [&str; 23] = [
    "stp_id",
    "fecha_operacion",
    "institucion_ordenante",
    "institucion_beneficiaria",
    "claverastreo",
    "monto",
    "cuenta_beneficiario",
    "nombre_ordenante",
    "tipo_cuenta_ordenante",
    "cuenta_ordenante",
    "rfc_curp_ordenante",
    "nombre_beneficiario",
    "tipo_cuenta_beneficiario",
    "rfc_curp_beneficiario",
    "concepto_pago",
    "referencia_numerica",
    "empresa",
    "tipo_pago",
    "ts_liquidacion",
    "nombre_beneficiario2",
    "tipo_cuenta_beneficiario2",
    "cuenta_beneficiario2",
    "folio_codi",
];

/// Embedded [`PaymentStore`] on a single SQLite connection.
///
/// Uniqueness of the tracking key is a table constraint, and inserts use
/// `ON CONFLICT DO NOTHING`, so concurrent submissions of one key store one row.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `":memory:"` works for tests.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        // WAL is not available for in-memory databases; the pragma is then a no-op
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pagos_stp (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stp_id TEXT NOT NULL,
                fecha_operacion TEXT NOT NULL,
                institucion_ordenante TEXT NOT NULL,
                institucion_beneficiaria TEXT NOT NULL,
                claverastreo TEXT NOT NULL UNIQUE,
                monto REAL NOT NULL,
                cuenta_beneficiario TEXT NOT NULL,
                nombre_ordenante TEXT NOT NULL,
                tipo_cuenta_ordenante TEXT NOT NULL,
                cuenta_ordenante TEXT NOT NULL,
                rfc_curp_ordenante TEXT NOT NULL,
                nombre_beneficiario TEXT NOT NULL,
                tipo_cuenta_beneficiario TEXT NOT NULL,
                rfc_curp_beneficiario TEXT NOT NULL,
                concepto_pago TEXT NOT NULL,
                referencia_numerica TEXT NOT NULL,
                empresa TEXT NOT NULL,
                tipo_pago TEXT NOT NULL,
                ts_liquidacion TEXT NOT NULL,
                nombre_beneficiario2 TEXT,
                tipo_cuenta_beneficiario2 TEXT,
                cuenta_beneficiario2 TEXT,
                folio_codi TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pagos_stp_created ON pagos_stp(created_at);
            "#,
        )?;

        Ok(())
    }
}

fn to_sql(value: &StpValue) -> SqlValue {
    match value {
        StpValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        StpValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn optional_to_sql(value: &Option<StpValue>) -> SqlValue {
    value.as_ref().map(to_sql).unwrap_or(SqlValue::Null)
}

fn row_values(n: &PaymentNotification) -> [SqlValue; 23] {
    [
        to_sql(&n.id),
        to_sql(&n.operation_date),
        to_sql(&n.ordering_institution),
        to_sql(&n.beneficiary_institution),
        to_sql(&n.tracking_key),
        to_sql(&n.amount),
        to_sql(&n.beneficiary_account),
        to_sql(&n.orderer_name),
        to_sql(&n.orderer_account_type),
        to_sql(&n.orderer_account),
        to_sql(&n.orderer_tax_id),
        to_sql(&n.beneficiary_name),
        to_sql(&n.beneficiary_account_type),
        to_sql(&n.beneficiary_tax_id),
        to_sql(&n.payment_concept),
        to_sql(&n.numeric_reference),
        to_sql(&n.company),
        to_sql(&n.payment_type),
        to_sql(&n.settlement_timestamp),
        optional_to_sql(&n.secondary_beneficiary_name),
        optional_to_sql(&n.secondary_beneficiary_account_type),
        optional_to_sql(&n.secondary_beneficiary_account),
        optional_to_sql(&n.codi_folio),
    ]
}

fn sql_to_json(value: SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => i.into(),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Text(s) => s.into(),
        SqlValue::Blob(_) => serde_json::Value::Null,
    }
}

#[async_trait]
impl PaymentStore for SqliteStore {
    async fn payment_exists(&self, tracking_key: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pagos_stp WHERE claverastreo = ?1)",
            params![tracking_key],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    async fn insert_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<InsertOutcome, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();

        let placeholders: Vec<String> = (1..=PAYMENT_COLUMNS.len() + 1)
            .map(|i| format!("?{i}"))
            .collect();
        let sql = format!(
            "INSERT INTO pagos_stp ({}, created_at) VALUES ({}) ON CONFLICT(claverastreo) DO NOTHING",
            PAYMENT_COLUMNS.join(", "),
            placeholders.join(", ")
        );

        let mut values = row_values(notification).to_vec();
        values.push(SqlValue::Integer(now));

        let inserted = conn.execute(&sql, params_from_iter(values))?;
        if inserted == 0 {
            return Ok(InsertOutcome::Duplicate);
        }

        Ok(InsertOutcome::Inserted(serde_json::json!({
            "id": conn.last_insert_rowid(),
        })))
    }

    async fn stats(&self) -> Result<StatsSnapshot, StoreError> {
        let conn = self.lock()?;
        let (count, total) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(monto), 0.0) FROM pagos_stp",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )?;

        Ok(StatsSnapshot {
            total_transactions: count.max(0) as u64,
            total_amount: total,
        })
    }

    async fn recent_payments(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, {}, created_at FROM pagos_stp ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            PAYMENT_COLUMNS.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map(params![limit, offset], |row| {
                let mut record = serde_json::Map::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), sql_to_json(row.get::<_, SqlValue>(i)?));
                }
                Ok(serde_json::Value::Object(record))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::tests::sample_payload;

    fn notification(key: &str) -> PaymentNotification {
        PaymentNotification::from_json(sample_payload(key)).unwrap()
    }

    #[tokio::test]
    async fn insert_then_exists() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert!(!store.payment_exists("K1").await.unwrap());

        let outcome = store.insert_payment(&notification("K1")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        assert!(store.payment_exists("K1").await.unwrap());
        assert!(!store.payment_exists("K2").await.unwrap());
    }

    #[tokio::test]
    async fn second_insert_of_same_key_is_duplicate() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.insert_payment(&notification("K1")).await.unwrap();

        let outcome = store.insert_payment(&notification("K1")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(store.stats().await.unwrap().total_transactions, 1);
    }

    #[tokio::test]
    async fn stats_sum_amounts() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert_eq!(store.stats().await.unwrap(), StatsSnapshot::default());

        let mut text_amount = sample_payload("K2");
        text_amount["monto"] = serde_json::json!("99.25");
        store.insert_payment(&notification("K1")).await.unwrap();
        store
            .insert_payment(&PaymentNotification::from_json(text_amount).unwrap())
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_transactions, 2);
        assert!((stats.total_amount - 1600.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recent_payments_pages_newest_first() {
        let store = SqliteStore::open(":memory:").unwrap();
        for key in ["K1", "K2", "K3", "K4"] {
            store.insert_payment(&notification(key)).await.unwrap();
        }

        let page = store.recent_payments(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["claverastreo"], "K4");
        assert_eq!(page[1]["claverastreo"], "K3");
        assert_eq!(page[0]["monto"], 1500.75);
        assert_eq!(page[0]["folio_codi"], serde_json::Value::Null);

        let page = store.recent_payments(10, 3).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["claverastreo"], "K1");
    }
}
