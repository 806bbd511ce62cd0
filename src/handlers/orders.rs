use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::{FileStorage, Mailer};
use crate::auth::{authenticate, authenticate_admin};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::domain::order_ref::{candidate_order_ref, MAX_ORDER_REF_ATTEMPTS};
use crate::domain::{retry_allowed, DomainError, EmailStatus, MachineType, OrderStatus};
use crate::errors::AppError;
use crate::fulfilment::{self, EmailOutcome};
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};
use crate::models::product::{Product, ProductDesignFile};
use crate::schema::{order_lines, orders, product_design_files, products};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutLineRequest {
    pub product_id: Uuid,
    pub machine_type: MachineType,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub machine_type: String,
    /// Decimal price as a string to avoid floating-point issues, e.g. "499.00"
    pub unit_price: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_ref: String,
    pub status: String,
    pub total_amount: String,
    pub email_sent: bool,
    pub email_status: String,
    pub created_at: String,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of "Pending", "Mail Sent", "Cancelled".
    pub status: String,
}

fn order_response(order: Order, lines: Vec<OrderLine>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_ref: order.order_ref,
        status: order.status,
        total_amount: order.total_amount.to_string(),
        email_sent: order.email_sent,
        email_status: order.email_status,
        created_at: order.created_at.to_rfc3339(),
        lines: lines
            .into_iter()
            .map(|l| OrderLineResponse {
                product_id: l.product_id,
                product_name: l.product_name,
                machine_type: l.machine_type,
                unit_price: l.unit_price.to_string(),
                quantity: l.quantity,
            })
            .collect(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Checkout: turns the submitted product/machine-type selections into a
/// Pending order. Prices come from the catalog (`product_design_files`), not
/// from the client, and the snapshot lines plus the order row are written in
/// one transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Empty cart, bad quantity, or no design file for the machine type"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown product"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &config.jwt_secret)?;
    let body = body.into_inner();

    if body.lines.is_empty() {
        return Err(AppError::Validation("order has no lines".into()));
    }
    if body.lines.iter().any(|l| l.quantity <= 0) {
        return Err(AppError::Validation("quantity must be positive".into()));
    }

    let user_id = claims.sub;
    let result = web::block(move || {
        let mut conn = pool.get()?;

        conn.transaction::<_, AppError, _>(|conn| {
            // Resolve every line against the catalog. The design-file slot
            // carries the authoritative price for its machine type.
            let mut new_lines = Vec::with_capacity(body.lines.len());
            let mut total = BigDecimal::from(0);
            for line in &body.lines {
                let product = products::table
                    .filter(products::id.eq(line.product_id))
                    .select(Product::as_select())
                    .first::<Product>(conn)
                    .optional()?
                    .ok_or(AppError::NotFound)?;

                let slot = product_design_files::table
                    .filter(product_design_files::product_id.eq(line.product_id))
                    .filter(
                        product_design_files::machine_type.eq(line.machine_type.as_str()),
                    )
                    .select(ProductDesignFile::as_select())
                    .first::<ProductDesignFile>(conn)
                    .optional()?
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "'{}' has no {} design file",
                            product.product_name, line.machine_type
                        ))
                    })?;

                total += slot.price.clone() * BigDecimal::from(line.quantity);
                new_lines.push((product.product_name, slot.price, line));
            }

            // Allocate a unique human-facing reference, bounded retries.
            let order_ref = allocate_order_ref(conn, candidate_order_ref)?;

            let order_id = Uuid::new_v4();
            diesel::insert_into(orders::table)
                .values(&NewOrder {
                    id: order_id,
                    order_ref: order_ref.clone(),
                    user_id,
                    total_amount: total,
                    status: OrderStatus::Pending.as_str().to_string(),
                    email_status: EmailStatus::Pending.as_str().to_string(),
                })
                .execute(conn)?;

            let rows: Vec<NewOrderLine> = new_lines
                .into_iter()
                .map(|(product_name, unit_price, line)| NewOrderLine {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: line.product_id,
                    product_name,
                    machine_type: line.machine_type.as_str().to_string(),
                    unit_price,
                    quantity: line.quantity,
                })
                .collect();
            diesel::insert_into(order_lines::table)
                .values(&rows)
                .execute(conn)?;

            let order = orders::table
                .filter(orders::id.eq(order_id))
                .select(Order::as_select())
                .first::<Order>(conn)?;
            let lines = order_lines::table
                .filter(order_lines::order_id.eq(order_id))
                .select(OrderLine::as_select())
                .load::<OrderLine>(conn)?;
            Ok(order_response(order, lines))
        })
    })
    .await??;

    Ok(HttpResponse::Created().json(result))
}

/// Try up to [`MAX_ORDER_REF_ATTEMPTS`] candidates before giving up. A race
/// that slips past the existence check still hits the UNIQUE constraint and
/// surfaces as a 409 rather than being retried silently.
pub fn allocate_order_ref(
    conn: &mut PgConnection,
    mut candidates: impl FnMut() -> String,
) -> Result<String, AppError> {
    use diesel::dsl::exists;
    use diesel::select;

    for _ in 0..MAX_ORDER_REF_ATTEMPTS {
        let candidate = candidates();
        let taken: bool = select(exists(
            orders::table.filter(orders::order_ref.eq(&candidate)),
        ))
        .get_result(conn)?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(DomainError::OrderRefExhausted.into())
}

/// GET /orders
///
/// Admin: paginated list of all orders, newest first, without lines.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 403, description = "Admin only"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    authenticate_admin(&req, &config.jwt_secret)?;
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let total: i64 = orders::table.count().get_result(&mut conn)?;
        let rows = orders::table
            .select(Order::as_select())
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)?;

        Ok::<_, AppError>(ListOrdersResponse {
            items: rows.into_iter().map(|o| order_response(o, vec![])).collect(),
            total,
            page,
            limit,
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /orders/pending
///
/// Admin: orders still awaiting payment.
#[utoipa::path(
    get,
    path = "/orders/pending",
    responses(
        (status = 200, description = "Pending orders", body = [OrderResponse]),
        (status = 403, description = "Admin only"),
    ),
    tag = "orders"
)]
pub async fn pending_orders(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    authenticate_admin(&req, &config.jwt_secret)?;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows = orders::table
            .filter(orders::status.eq(OrderStatus::Pending.as_str()))
            .select(Order::as_select())
            .order(orders::created_at.desc())
            .load(&mut conn)?;
        Ok::<_, AppError>(
            rows.into_iter()
                .map(|o| order_response(o, vec![]))
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /orders/{order_ref}
///
/// Returns the order with its lines. Owners see their own orders; admins see
/// everything.
#[utoipa::path(
    get,
    path = "/orders/{order_ref}",
    params(("order_ref" = String, Path, description = "Order reference, e.g. ORD-...")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
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

        let lines = order_lines::table
            .filter(order_lines::order_id.eq(order.id))
            .select(OrderLine::as_select())
            .load::<OrderLine>(&mut conn)?;
        Ok(order_response(order, lines))
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// PUT /orders/{order_ref}/status
///
/// Admin override, limited to the targets the dashboard exposes and checked
/// against the transition table: Cancelled and Mail Sent orders cannot be
/// moved again, and a failed payment can only go back to Pending or to
/// Cancelled.
#[utoipa::path(
    put,
    path = "/orders/{order_ref}/status",
    params(("order_ref" = String, Path, description = "Order reference")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 400, description = "Unknown or unsupported target status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Illegal transition"),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    authenticate_admin(&req, &config.jwt_secret)?;
    let order_ref = path.into_inner();

    let target = OrderStatus::from_str(&body.status)?;
    if !matches!(
        target,
        OrderStatus::Pending | OrderStatus::MailSent | OrderStatus::Cancelled
    ) {
        return Err(AppError::Validation(format!(
            "'{target}' is not an admin-settable status"
        )));
    }

    let result = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let order = orders::table
                .filter(orders::order_ref.eq(&order_ref))
                .select(Order::as_select())
                .first::<Order>(conn)
                .optional()?
                .ok_or(AppError::NotFound)?;

            let current = OrderStatus::from_str(&order.status)?;
            let next = current.transition_to(target)?;

            let updated = diesel::update(orders::table.filter(orders::id.eq(order.id)))
                .set(orders::status.eq(next.as_str()))
                .get_result::<Order>(conn)?;
            Ok(order_response(updated, vec![]))
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /orders/{order_ref}/retry-email
///
/// Admin: re-run the confirmation-email pipeline for an order whose previous
/// send failed (or never happened). Orders outside the enumerated retry set
/// get a 400 so the dashboard cannot spam buyers.
#[utoipa::path(
    post,
    path = "/orders/{order_ref}/retry-email",
    params(("order_ref" = String, Path, description = "Order reference")),
    responses(
        (status = 200, description = "Email sent (or already sent)"),
        (status = 400, description = "Retry not needed for this order"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Mail or file-storage provider failed"),
    ),
    tag = "orders"
)]
pub async fn retry_order_email(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    storage: web::Data<dyn FileStorage>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    authenticate_admin(&req, &config.jwt_secret)?;
    let order_ref = path.into_inner();

    // Eligibility gate, separate from the pipeline's own claim so callers get
    // a clear 400 instead of a generic conflict.
    let gate_pool = pool.clone();
    let gate_ref = order_ref.clone();
    let order = web::block(move || {
        let mut conn = gate_pool.get()?;
        orders::table
            .filter(orders::order_ref.eq(&gate_ref))
            .select(Order::as_select())
            .first::<Order>(&mut conn)
            .optional()?
            .ok_or(AppError::NotFound)
    })
    .await??;

    let status = OrderStatus::from_str(&order.status)?;
    let email_status = EmailStatus::from_str(&order.email_status)?;
    if !retry_allowed(status, email_status, order.email_sent) {
        return Err(AppError::Validation(format!(
            "retry not needed: order {} is {} with email {}",
            order.order_ref, order.status, order.email_status
        )));
    }

    let outcome = fulfilment::send_confirmation_email(
        pool.get_ref().clone(),
        Arc::clone(&storage.into_inner()),
        Arc::clone(&mailer.into_inner()),
        config.mail_sender.clone(),
        order_ref.clone(),
    )
    .await?;

    let body = match outcome {
        EmailOutcome::Sent {
            message_id,
            attachments,
        } => json!({
            "order_ref": order_ref,
            "sent": true,
            "message_id": message_id,
            "attachments": attachments,
        }),
        EmailOutcome::AlreadySent => json!({
            "order_ref": order_ref,
            "sent": false,
            "already_sent": true,
        }),
    };
    Ok(HttpResponse::Ok().json(body))
}
