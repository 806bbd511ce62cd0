use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::{FileStorage, Mailer, PaymentGateway};
use crate::auth::authenticate;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::domain::signature::verify_checkout_signature;
use crate::domain::{OrderStatus, PaymentStatus};
use crate::errors::AppError;
use crate::fulfilment;
use crate::models::order::Order;
use crate::models::payment::{NewPayment, Payment};
use crate::schema::{orders, payments};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentOrderRequest {
    pub order_ref: String,
    /// ISO currency code; defaults to INR.
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentOrderResponse {
    pub payment_id: Uuid,
    pub gateway_order_id: String,
    /// Amount in minor units (paise), as the checkout widget expects.
    pub amount: i64,
    pub currency: String,
    /// Public key id for the hosted checkout widget.
    pub key_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentFailureRequest {
    pub gateway_order_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentHistoryEntry {
    pub payment_id: Uuid,
    pub order_ref: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub created_at: String,
}

/// Convert a catalog amount (rupees, scale 2) to gateway minor units.
fn to_minor_units(amount: &BigDecimal) -> Result<i64, AppError> {
    (amount.clone() * BigDecimal::from(100))
        .with_scale(0)
        .to_i64()
        .ok_or_else(|| AppError::Internal(format!("amount out of range: {amount}")))
}

/// Point an order's payment row at a freshly opened gateway order.
///
/// An existing row is only reset while it is still unsettled; if a concurrent
/// verification captured it between the payable check and this write, the
/// guarded update matches zero rows and the reset is refused instead of wiping
/// the captured payment.
pub fn reset_or_insert_payment(
    conn: &mut PgConnection,
    order_id: Uuid,
    user_id: Uuid,
    gateway_order_id: &str,
    amount: &BigDecimal,
    currency: &str,
) -> Result<Uuid, AppError> {
    let existing = payments::table
        .filter(payments::order_id.eq(order_id))
        .select(Payment::as_select())
        .first::<Payment>(conn)
        .optional()?;

    match existing {
        Some(p) => {
            let updated = diesel::update(
                payments::table.filter(payments::id.eq(p.id)).filter(
                    payments::status.ne_all(vec![
                        PaymentStatus::Captured.as_str(),
                        PaymentStatus::Authorized.as_str(),
                    ]),
                ),
            )
            .set((
                payments::gateway_order_id.eq(Some(gateway_order_id)),
                payments::gateway_payment_id.eq(None::<String>),
                payments::amount.eq(amount),
                payments::currency.eq(currency),
                payments::status.eq(PaymentStatus::Created.as_str()),
                payments::method.eq(None::<String>),
                payments::bank.eq(None::<String>),
                payments::wallet.eq(None::<String>),
                payments::failure_reason.eq(None::<String>),
                payments::paid_at.eq(None::<chrono::DateTime<Utc>>),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(AppError::Conflict(
                    "payment was settled while opening the gateway order".to_string(),
                ));
            }
            Ok(p.id)
        }
        None => {
            let id = Uuid::new_v4();
            diesel::insert_into(payments::table)
                .values(&NewPayment {
                    id,
                    order_id,
                    user_id,
                    gateway_order_id: Some(gateway_order_id.to_string()),
                    amount: amount.clone(),
                    currency: currency.to_string(),
                    status: PaymentStatus::Created.as_str().to_string(),
                })
                .execute(conn)?;
            Ok(id)
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /payments/order
///
/// Creates (or reuses) the Payment record for an order and opens a remote
/// gateway order for the hosted checkout widget. The charged amount is read
/// from the stored order; the client never supplies it.
#[utoipa::path(
    post,
    path = "/payments/order",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 201, description = "Gateway order opened", body = CreatePaymentOrderResponse),
        (status = 403, description = "Not the order's owner"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already has a settled payment"),
        (status = 502, description = "Gateway unavailable"),
    ),
    tag = "payments"
)]
pub async fn create_payment_order(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    body: web::Json<CreatePaymentOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &config.jwt_secret)?;
    let body = body.into_inner();
    let currency = body.currency.unwrap_or_else(|| "INR".to_string());
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::Validation(format!(
            "invalid currency '{currency}'"
        )));
    }

    // Phase 1: load the order, refuse double payment, reopen failed orders.
    let check_pool = pool.clone();
    let order_ref = body.order_ref.clone();
    let is_admin = claims.is_admin();
    let user_id = claims.sub;
    let order: Order = web::block(move || {
        let mut conn = check_pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let order = orders::table
                .filter(orders::order_ref.eq(&order_ref))
                .select(Order::as_select())
                .first::<Order>(conn)
                .optional()?
                .ok_or(AppError::NotFound)?;

            if order.user_id != user_id && !is_admin {
                return Err(AppError::Forbidden);
            }

            if let Some(existing) = payments::table
                .filter(payments::order_id.eq(order.id))
                .select(Payment::as_select())
                .first::<Payment>(conn)
                .optional()?
            {
                let status = PaymentStatus::from_str(&existing.status)?;
                if status.is_settled() {
                    return Err(AppError::Conflict(format!(
                        "order {} already has a {} payment",
                        order.order_ref, existing.status
                    )));
                }
            }

            let status = OrderStatus::from_str(&order.status)?;
            match status {
                OrderStatus::Pending => Ok(order),
                // A failed payment attempt reopens the order for another try.
                OrderStatus::PaymentFailed => {
                    let next = status.transition_to(OrderStatus::Pending)?;
                    let reopened = diesel::update(orders::table.filter(orders::id.eq(order.id)))
                        .set(orders::status.eq(next.as_str()))
                        .get_result::<Order>(conn)?;
                    Ok(reopened)
                }
                _ => Err(AppError::Conflict(format!(
                    "order {} is not payable (status: {})",
                    order.order_ref, order.status
                ))),
            }
        })
    })
    .await??;

    // Phase 2: open the remote order.
    let amount_minor = to_minor_units(&order.total_amount)?;
    let gateway_order = gateway
        .create_order(amount_minor, &currency, &order.order_ref)
        .await?;

    // Phase 3: persist, resetting any stale payment row for this order.
    let persist_pool = pool.clone();
    let gw_order_id = gateway_order.id.clone();
    let gw_currency = gateway_order.currency.clone();
    let total = order.total_amount.clone();
    let order_id = order.id;
    let payment_id: Uuid = web::block(move || {
        let mut conn = persist_pool.get()?;
        reset_or_insert_payment(&mut conn, order_id, user_id, &gw_order_id, &total, &gw_currency)
    })
    .await??;

    Ok(HttpResponse::Created().json(CreatePaymentOrderResponse {
        payment_id,
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        key_id: config.gateway_key_id.clone(),
    }))
}

/// POST /payments/verify
///
/// Validates the checkout signature and, on first success, captures the
/// payment, marks the order Paid and dispatches exactly one confirmation
/// email (fire-and-forget; a mail failure never rolls back Paid). Replays
/// with the same valid signature are acknowledged without side effects.
#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment captured (or already captured)"),
        (status = 400, description = "Signature mismatch"),
        (status = 404, description = "No payment for this gateway order"),
        (status = 409, description = "Order not in a payable state"),
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    storage: web::Data<dyn FileStorage>,
    mailer: web::Data<dyn Mailer>,
    body: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    authenticate(&req, &config.jwt_secret)?;
    let body = body.into_inner();

    // The signature check gates every state change. Mismatch: 400, nothing
    // written.
    if !verify_checkout_signature(
        &config.gateway_key_secret,
        &body.gateway_order_id,
        &body.gateway_payment_id,
        &body.signature,
    ) {
        return Err(AppError::Validation("payment signature mismatch".into()));
    }

    // Load the payment; a replayed verification returns early.
    let load_pool = pool.clone();
    let gw_order_id = body.gateway_order_id.clone();
    let payment: Payment = web::block(move || {
        let mut conn = load_pool.get()?;
        payments::table
            .filter(payments::gateway_order_id.eq(&gw_order_id))
            .select(Payment::as_select())
            .first::<Payment>(&mut conn)
            .optional()?
            .ok_or(AppError::NotFound)
    })
    .await??;

    if PaymentStatus::from_str(&payment.status)?.is_settled() {
        let order_ref = order_ref_for(&pool, payment.order_id).await?;
        return Ok(HttpResponse::Ok().json(json!({
            "verified": true,
            "already_processed": true,
            "order_ref": order_ref,
        })));
    }

    // Best-effort metadata fetch. The signature has already been verified
    // locally, so a gateway outage degrades to a capture without metadata
    // rather than blocking the buyer.
    let details = match gateway.fetch_payment(&body.gateway_payment_id).await {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!(
                "gateway fetch for payment {} failed, capturing from signature alone: {e}",
                body.gateway_payment_id
            );
            None
        }
    };

    // Capture payment and mark the order Paid in one transaction.
    let write_pool = pool.clone();
    let payment_id = payment.id;
    let order_id = payment.order_id;
    let gw_payment_id = body.gateway_payment_id.clone();
    let order_ref: String = web::block(move || {
        let mut conn = write_pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let now = Utc::now();
            let (method, bank, wallet) = details
                .map(|d| (d.method, d.bank, d.wallet))
                .unwrap_or_default();

            diesel::update(payments::table.filter(payments::id.eq(payment_id)))
                .set((
                    payments::status.eq(PaymentStatus::Captured.as_str()),
                    payments::gateway_payment_id.eq(Some(gw_payment_id.as_str())),
                    payments::method.eq(method),
                    payments::bank.eq(bank),
                    payments::wallet.eq(wallet),
                    payments::paid_at.eq(Some(now)),
                ))
                .execute(conn)?;

            let order = orders::table
                .filter(orders::id.eq(order_id))
                .select(Order::as_select())
                .first::<Order>(conn)?;
            let next = OrderStatus::from_str(&order.status)?.transition_to(OrderStatus::Paid)?;
            diesel::update(orders::table.filter(orders::id.eq(order.id)))
                .set((
                    orders::status.eq(next.as_str()),
                    orders::gateway_payment_id.eq(Some(gw_payment_id.as_str())),
                    orders::paid_at.eq(Some(now)),
                ))
                .execute(conn)?;

            Ok(order.order_ref)
        })
    })
    .await??;

    // Exactly one dispatch per verification; the pipeline's claim step makes
    // replays and concurrent retries no-ops.
    let email_pool = pool.get_ref().clone();
    let email_storage = Arc::clone(&storage.into_inner());
    let email_mailer = Arc::clone(&mailer.into_inner());
    let sender = config.mail_sender.clone();
    let email_ref = order_ref.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = fulfilment::send_confirmation_email(
            email_pool,
            email_storage,
            email_mailer,
            sender,
            email_ref.clone(),
        )
        .await
        {
            log::error!("confirmation email for order {email_ref} failed: {e}");
        }
    });

    Ok(HttpResponse::Ok().json(json!({
        "verified": true,
        "order_ref": order_ref,
        "status": OrderStatus::Paid.as_str(),
    })))
}

/// POST /payments/failure
///
/// Records a failed checkout attempt reported by the widget: payment goes to
/// `failed` with the reason, the order to Payment Failed.
#[utoipa::path(
    post,
    path = "/payments/failure",
    request_body = PaymentFailureRequest,
    responses(
        (status = 200, description = "Failure recorded"),
        (status = 403, description = "Not the payment's owner"),
        (status = 404, description = "No payment for this gateway order"),
    ),
    tag = "payments"
)]
pub async fn payment_failure(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Json<PaymentFailureRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &config.jwt_secret)?;
    let body = body.into_inner();

    let order_ref: String = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let payment = payments::table
                .filter(payments::gateway_order_id.eq(&body.gateway_order_id))
                .select(Payment::as_select())
                .first::<Payment>(conn)
                .optional()?
                .ok_or(AppError::NotFound)?;

            if payment.user_id != claims.sub && !claims.is_admin() {
                return Err(AppError::Forbidden);
            }

            if PaymentStatus::from_str(&payment.status)?.is_settled() {
                return Err(AppError::Conflict(
                    "payment already settled; failure report ignored".into(),
                ));
            }

            diesel::update(payments::table.filter(payments::id.eq(payment.id)))
                .set((
                    payments::status.eq(PaymentStatus::Failed.as_str()),
                    payments::failure_reason.eq(body.reason.as_deref()),
                ))
                .execute(conn)?;

            let order = orders::table
                .filter(orders::id.eq(payment.order_id))
                .select(Order::as_select())
                .first::<Order>(conn)?;
            let current = OrderStatus::from_str(&order.status)?;
            // Repeated failure reports for an already-failed order are fine.
            if current != OrderStatus::PaymentFailed {
                let next = current.transition_to(OrderStatus::PaymentFailed)?;
                diesel::update(orders::table.filter(orders::id.eq(order.id)))
                    .set(orders::status.eq(next.as_str()))
                    .execute(conn)?;
            }
            Ok(order.order_ref)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "order_ref": order_ref,
        "status": OrderStatus::PaymentFailed.as_str(),
    })))
}

/// GET /payments/status/{order_ref}
///
/// Polling endpoint for the checkout page: one compact view of the order,
/// payment and email states.
#[utoipa::path(
    get,
    path = "/payments/status/{order_ref}",
    params(("order_ref" = String, Path, description = "Order reference")),
    responses(
        (status = 200, description = "Combined status"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found"),
    ),
    tag = "payments"
)]
pub async fn payment_status(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &config.jwt_secret)?;
    let order_ref = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let order = orders::table
            .filter(orders::order_ref.eq(&order_ref))
            .select(Order::as_select())
            .first::<Order>(&mut conn)
            .optional()?
            .ok_or(AppError::NotFound)?;

        if order.user_id != claims.sub && !claims.is_admin() {
            return Err(AppError::Forbidden);
        }

        let payment_status = payments::table
            .filter(payments::order_id.eq(order.id))
            .select(payments::status)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(json!({
            "order_ref": order.order_ref,
            "order_status": order.status,
            "payment_status": payment_status,
            "email_status": order.email_status,
            "email_sent": order.email_sent,
        }))
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /payments/history
///
/// The caller's payments, newest first.
#[utoipa::path(
    get,
    path = "/payments/history",
    responses(
        (status = 200, description = "Payment history", body = [PaymentHistoryEntry]),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "payments"
)]
pub async fn payment_history(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &config.jwt_secret)?;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows: Vec<(Payment, String)> = payments::table
            .inner_join(orders::table)
            .filter(payments::user_id.eq(claims.sub))
            .select((Payment::as_select(), orders::order_ref))
            .order(payments::created_at.desc())
            .load(&mut conn)?;

        Ok::<_, AppError>(
            rows.into_iter()
                .map(|(p, order_ref)| PaymentHistoryEntry {
                    payment_id: p.id,
                    order_ref,
                    amount: p.amount.to_string(),
                    currency: p.currency,
                    status: p.status,
                    method: p.method,
                    created_at: p.created_at.to_rfc3339(),
                })
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

async fn order_ref_for(pool: &web::Data<DbPool>, order_id: Uuid) -> Result<String, AppError> {
    let pool = pool.clone();
    let order_ref = web::block(move || {
        let mut conn = pool.get()?;
        Ok::<_, AppError>(
            orders::table
                .filter(orders::id.eq(order_id))
                .select(orders::order_ref)
                .first::<String>(&mut conn)?,
        )
    })
    .await??;
    Ok(order_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minor_units_conversion_is_exact_for_scale_two() {
        let amount = BigDecimal::from_str("499.00").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 49900);

        let amount = BigDecimal::from_str("0.50").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 50);

        let amount = BigDecimal::from_str("1234.56").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 123456);
    }

    #[test]
    fn minor_units_of_zero_is_zero() {
        assert_eq!(to_minor_units(&BigDecimal::from(0)).unwrap(), 0);
    }

    #[test]
    fn verify_request_deserializes_from_widget_payload() {
        let body = r#"{
            "gateway_order_id": "order_abc",
            "gateway_payment_id": "pay_xyz",
            "signature": "deadbeef"
        }"#;
        let req: VerifyPaymentRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.gateway_order_id, "order_abc");
        assert_eq!(req.gateway_payment_id, "pay_xyz");
        assert_eq!(req.signature, "deadbeef");
    }

    #[test]
    fn create_request_defaults_currency_to_none() {
        let req: CreatePaymentOrderRequest =
            serde_json::from_str(r#"{"order_ref": "ORD-1"}"#).unwrap();
        assert!(req.currency.is_none());
    }
}
