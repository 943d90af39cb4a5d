use actix_web::{web, HttpResponse};
use std::time::Instant;
use stp::{Actions, ForwardOutcome, ProcessError, ProcessFailure, ProcessOutcome};

use crate::metrics::{BACKEND_ERRORS, PARTNER_FORWARDS, WEBHOOKS_TOTAL, WEBHOOK_DURATION};
use crate::state::AppState;

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// POST /webhook/pagos-stp - ingest one STP payment notification
pub async fn receive_payment(body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    let start = Instant::now();

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "notification rejected: body is not valid JSON");
            WEBHOOKS_TOTAL.with_label_values(&["invalid"]).inc();
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": "Payload inválido",
                "details": "request body is not valid JSON",
                "processingTime": elapsed_ms(start),
                "actions": Actions::default(),
            }));
        }
    };
    tracing::debug!(payload = %payload, "STP notification received");

    let result = state.processor.process(payload).await;
    WEBHOOK_DURATION.observe(start.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => success_response(outcome, start),
        Err(failure) => failure_response(failure, start),
    }
}

fn success_response(outcome: ProcessOutcome, start: Instant) -> HttpResponse {
    let actions = outcome.actions();
    match outcome {
        ProcessOutcome::Duplicate(notification) => {
            WEBHOOKS_TOTAL.with_label_values(&["duplicate"]).inc();
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Registro ya existe",
                "id": notification.id.to_json(),
                "claveRastreo": notification.tracking_key.to_json(),
                "duplicate": true,
                "processingTime": elapsed_ms(start),
                "actions": actions,
            }))
        }
        ProcessOutcome::Processed {
            notification,
            forward,
        } => {
            WEBHOOKS_TOTAL.with_label_values(&["processed"]).inc();
            let forward_result = match forward {
                ForwardOutcome::Delivered { .. } => "delivered",
                ForwardOutcome::Bypassed => "bypassed",
            };
            PARTNER_FORWARDS.with_label_values(&[forward_result]).inc();

            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Webhook procesado exitosamente",
                "id": notification.id.to_json(),
                "claveRastreo": notification.tracking_key.to_json(),
                "monto": notification.amount.to_json(),
                "empresa": notification.company.to_json(),
                "processingTime": elapsed_ms(start),
                "actions": actions,
            }))
        }
    }
}

fn failure_response(failure: ProcessFailure, start: Instant) -> HttpResponse {
    let ProcessFailure { error, actions } = failure;

    match &error {
        ProcessError::MissingFields(missing) => {
            WEBHOOKS_TOTAL.with_label_values(&["invalid"]).inc();
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": "Payload inválido",
                "camposFaltantes": missing,
                "processingTime": elapsed_ms(start),
                "actions": actions,
            }));
        }
        ProcessError::Malformed(_) => {
            WEBHOOKS_TOTAL.with_label_values(&["invalid"]).inc();
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": "Payload inválido",
                "details": error.public_message(),
                "processingTime": elapsed_ms(start),
                "actions": actions,
            }));
        }
        ProcessError::DuplicateCheck(_) => {
            BACKEND_ERRORS.with_label_values(&["exists"]).inc();
        }
        ProcessError::Persistence(_) => {
            BACKEND_ERRORS.with_label_values(&["insert"]).inc();
        }
        ProcessError::Forwarding(_) => {
            PARTNER_FORWARDS.with_label_values(&["failed"]).inc();
        }
    }

    WEBHOOKS_TOTAL.with_label_values(&["failed"]).inc();
    HttpResponse::InternalServerError().json(serde_json::json!({
        "success": false,
        "error": "Error procesando webhook",
        "details": error.public_message(),
        "processingTime": elapsed_ms(start),
        "actions": actions,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/webhook/pagos-stp", web::post().to(receive_payment));
}
