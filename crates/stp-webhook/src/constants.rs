use std::time::Duration;

/// Fields every STP notification must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 19] = [
    "id",
    "fechaOperacion",
    "institucionOrdenante",
    "institucionBeneficiaria",
    "claveRastreo",
    "monto",
    "cuentaBeneficiario",
    "nombreOrdenante",
    "tipoCuentaOrdenante",
    "cuentaOrdenante",
    "rfcCurpOrdenante",
    "nombreBeneficiario",
    "tipoCuentaBeneficiario",
    "rfcCurpBeneficiario",
    "conceptoPago",
    "referenciaNumerica",
    "empresa",
    "tipoPago",
    "tsLiquidacion",
];

/// Supabase RPC that inserts one payment atomically.
pub const RPC_INSERT_PAYMENT: &str = "insertar_pago_stp";
/// Supabase RPC answering `{"existe": bool}` for a tracking key.
pub const RPC_PAYMENT_EXISTS: &str = "verificar_pago_existe";
/// Supabase RPC returning `{"total_transacciones", "monto_total"}`.
pub const RPC_PAYMENT_STATS: &str = "obtener_stats_pagos";
/// Supabase RPC returning `{"data": [...]}` ordered newest first.
pub const RPC_RECENT_PAYMENTS: &str = "obtener_transacciones_recientes";

/// Postgres SQLSTATE for unique_violation.
pub const PG_UNIQUE_VIOLATION: &str = "23505";

pub const DEFAULT_PARTNER_API_URL: &str = "https://apitest.sozu.com/api/admin/pagosSTP";
pub const PARTNER_TIMEOUT: Duration = Duration::from_secs(30);
pub const FORWARDER_USER_AGENT: &str = concat!("STP-Webhook-Forwarder/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 500;
