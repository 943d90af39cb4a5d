use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A single notification field. STP sends identifiers, dates and amounts as
/// either JSON numbers or strings, so both are accepted and preserved as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StpValue {
    Number(serde_json::Number),
    Text(String),
}

impl StpValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StpValue::Number(n) => n.as_f64(),
            StpValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, StpValue::Text(s) if s.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StpValue::Number(n) => serde_json::Value::Number(n.clone()),
            StpValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for StpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StpValue::Number(n) => write!(f, "{}", n),
            StpValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StpValue {
    fn from(s: &str) -> Self {
        StpValue::Text(s.to_string())
    }
}

impl From<i64> for StpValue {
    fn from(n: i64) -> Self {
        StpValue::Number(n.into())
    }
}

/// Incoming SPEI payment notification.
///
/// Field names on the wire follow STP's camelCase Spanish naming. Unknown
/// fields are kept in `extra`. Blank optional fields are normalised to `None`
/// for persistence; the body as received is kept separately for the partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// STP's own identifier for the transfer.
    pub id: StpValue,
    #[serde(rename = "fechaOperacion")]
    pub operation_date: StpValue,
    #[serde(rename = "institucionOrdenante")]
    pub ordering_institution: StpValue,
    #[serde(rename = "institucionBeneficiaria")]
    pub beneficiary_institution: StpValue,
    /// Business-unique key used for deduplication.
    #[serde(rename = "claveRastreo")]
    pub tracking_key: StpValue,
    #[serde(rename = "monto")]
    pub amount: StpValue,
    #[serde(rename = "cuentaBeneficiario")]
    pub beneficiary_account: StpValue,
    #[serde(rename = "nombreOrdenante")]
    pub orderer_name: StpValue,
    #[serde(rename = "tipoCuentaOrdenante")]
    pub orderer_account_type: StpValue,
    #[serde(rename = "cuentaOrdenante")]
    pub orderer_account: StpValue,
    #[serde(rename = "rfcCurpOrdenante")]
    pub orderer_tax_id: StpValue,
    #[serde(rename = "nombreBeneficiario")]
    pub beneficiary_name: StpValue,
    #[serde(rename = "tipoCuentaBeneficiario")]
    pub beneficiary_account_type: StpValue,
    #[serde(rename = "rfcCurpBeneficiario")]
    pub beneficiary_tax_id: StpValue,
    #[serde(rename = "conceptoPago")]
    pub payment_concept: StpValue,
    #[serde(rename = "referenciaNumerica")]
    pub numeric_reference: StpValue,
    /// STP company (cost centre) the transfer was credited to.
    #[serde(rename = "empresa")]
    pub company: StpValue,
    #[serde(rename = "tipoPago")]
    pub payment_type: StpValue,
    #[serde(rename = "tsLiquidacion")]
    pub settlement_timestamp: StpValue,

    #[serde(
        rename = "nombreBeneficiario2",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary_beneficiary_name: Option<StpValue>,
    #[serde(
        rename = "tipoCuentaBeneficiario2",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary_beneficiary_account_type: Option<StpValue>,
    #[serde(
        rename = "cuentaBeneficiario2",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary_beneficiary_account: Option<StpValue>,
    /// CoDi folio, present only for payments initiated from the CoDi app.
    #[serde(
        rename = "folioCodi",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub codi_folio: Option<StpValue>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    received: serde_json::Value,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<StpValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<StpValue>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_blank()))
}

impl PaymentNotification {
    /// Parse an already presence-validated JSON payload.
    pub fn from_json(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut notification: Self = serde_json::from_value(payload.clone())?;
        notification.received = payload;
        Ok(notification)
    }

    /// The notification exactly as STP sent it, falling back to the typed
    /// fields when it was not built through [`from_json`](Self::from_json).
    pub fn as_received(&self) -> Cow<'_, serde_json::Value> {
        if self.received.is_null() {
            Cow::Owned(serde_json::to_value(self).unwrap_or_default())
        } else {
            Cow::Borrowed(&self.received)
        }
    }

    pub fn tracking_key(&self) -> String {
        self.tracking_key.to_string()
    }
}
