//! Confirmation-email pipeline: after an order is paid, mail the buyer the
//! design files for the machine types they purchased.
//!
//! The pipeline is single-flight per order. The first step atomically claims
//! the order (`email_sent = false AND status = 'Paid'` → `Sending Email`), so
//! concurrent verify/retry calls cannot produce a second email.

use std::str::FromStr;
use std::sync::Arc;

use actix_web::web;
use diesel::prelude::*;
use uuid::Uuid;

use crate::adapters::{EmailAttachment, EmailMessage, FileStorage, Mailer};
use crate::db::DbPool;
use crate::domain::{EmailStatus, MachineType, OrderStatus};
use crate::errors::AppError;
use crate::models::order::{Order, OrderLine};
use crate::models::product::ProductDesignFile;
use crate::models::user::User;
use crate::schema::{order_lines, orders, product_design_files, users};

#[derive(Debug, PartialEq, Eq)]
pub enum EmailOutcome {
    Sent {
        message_id: String,
        attachments: usize,
    },
    /// The order already had its confirmation email; nothing was sent.
    AlreadySent,
}

/// Design-file coordinates for one order line, resolved against
/// `product_design_files`. `file_ref` is `None` when the product has no file
/// for the purchased machine type.
struct ResolvedLine {
    product_name: String,
    machine_type: String,
    file_ref: Option<String>,
    file_name: Option<String>,
}

pub async fn send_confirmation_email(
    pool: DbPool,
    storage: Arc<dyn FileStorage>,
    mailer: Arc<dyn Mailer>,
    sender: String,
    order_ref: String,
) -> Result<EmailOutcome, AppError> {
    // 1. Claim the order. Zero rows updated means someone else got there
    //    first (or the order is not in a sendable state).
    let claim_pool = pool.clone();
    let claim_ref = order_ref.clone();
    let claimed: Option<Order> = web::block(move || {
        let mut conn = claim_pool.get()?;
        let updated = diesel::update(
            orders::table
                .filter(orders::order_ref.eq(&claim_ref))
                .filter(orders::email_sent.eq(false))
                .filter(orders::status.eq(OrderStatus::Paid.as_str())),
        )
        .set(orders::status.eq(OrderStatus::SendingEmail.as_str()))
        .get_result::<Order>(&mut conn)
        .optional()?;

        if updated.is_some() {
            return Ok(updated);
        }

        // Distinguish "already sent" from "no such order / wrong state".
        let existing = orders::table
            .filter(orders::order_ref.eq(&claim_ref))
            .select(Order::as_select())
            .first::<Order>(&mut conn)
            .optional()?;
        match existing {
            None => Err(AppError::NotFound),
            Some(o) if o.email_sent => Ok(None),
            Some(o) => Err(AppError::Conflict(format!(
                "order {} is not awaiting its confirmation email (status: {})",
                claim_ref, o.status
            ))),
        }
    })
    .await??;

    let Some(order) = claimed else {
        return Ok(EmailOutcome::AlreadySent);
    };

    match deliver(&pool, &storage, &mailer, &sender, &order).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log::warn!(
                "confirmation email for order {} failed: {e}",
                order.order_ref
            );
            finalize(
                &pool,
                order.id,
                false,
                EmailStatus::Failed,
                OrderStatus::Paid,
            )
            .await?;
            Err(e)
        }
    }
}

async fn deliver(
    pool: &DbPool,
    storage: &Arc<dyn FileStorage>,
    mailer: &Arc<dyn Mailer>,
    sender: &str,
    order: &Order,
) -> Result<EmailOutcome, AppError> {
    // 2. Load the recipient and the purchased lines with their file slots.
    let load_pool = pool.clone();
    let order_id = order.id;
    let user_id = order.user_id;
    let (user, resolved): (User, Vec<ResolvedLine>) = web::block(move || {
        let mut conn = load_pool.get()?;

        let user = users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first::<User>(&mut conn)?;

        let lines = order_lines::table
            .filter(order_lines::order_id.eq(order_id))
            .select(OrderLine::as_select())
            .load::<OrderLine>(&mut conn)?;

        let resolved = lines
            .into_iter()
            .map(|line| {
                let slot = product_design_files::table
                    .filter(product_design_files::product_id.eq(line.product_id))
                    .filter(product_design_files::machine_type.eq(&line.machine_type))
                    .select(ProductDesignFile::as_select())
                    .first::<ProductDesignFile>(&mut conn)
                    .optional()?;
                Ok(ResolvedLine {
                    product_name: line.product_name,
                    machine_type: line.machine_type,
                    file_ref: slot.as_ref().map(|s| s.file_ref.clone()),
                    file_name: slot.map(|s| s.file_name),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok::<_, AppError>((user, resolved))
    })
    .await??;

    // 3. Pull the design files into memory. A missing slot is logged and
    //    skipped; the buyer still gets the receipt.
    let mut attachments = Vec::new();
    for line in &resolved {
        let Some(file_ref) = &line.file_ref else {
            log::warn!(
                "order {}: no {} file stored for '{}'",
                order.order_ref,
                line.machine_type,
                line.product_name
            );
            continue;
        };
        let content = storage.download(file_ref).await?;
        let file_name = line
            .file_name
            .clone()
            .unwrap_or_else(|| attachment_name(&line.product_name, &line.machine_type));
        attachments.push(EmailAttachment { content, file_name });
    }

    // 4. Send.
    let attachment_count = attachments.len();
    let message = EmailMessage {
        to: user.email.clone(),
        from: sender.to_string(),
        subject: format!("Your embroidery designs — order {}", order.order_ref),
        html_body: compose_receipt_html(order, &user, &resolved),
        attachments,
    };
    let message_id = mailer.send(&message).await?;

    // 5. Finalize. The order only reaches Mail Sent when files actually went
    //    out; a receipt-only email keeps it at Paid.
    let final_status = if attachment_count > 0 {
        OrderStatus::MailSent
    } else {
        OrderStatus::Paid
    };
    finalize(pool, order.id, true, EmailStatus::Sent, final_status).await?;

    log::info!(
        "order {}: confirmation email sent ({} attachment(s), message id {})",
        order.order_ref,
        attachment_count,
        message_id
    );
    Ok(EmailOutcome::Sent {
        message_id,
        attachments: attachment_count,
    })
}

async fn finalize(
    pool: &DbPool,
    order_id: Uuid,
    email_sent: bool,
    email_status: EmailStatus,
    status: OrderStatus,
) -> Result<(), AppError> {
    let pool = pool.clone();
    web::block(move || {
        let mut conn = pool.get()?;
        diesel::update(orders::table.filter(orders::id.eq(order_id)))
            .set((
                orders::email_sent.eq(email_sent),
                orders::email_status.eq(email_status.as_str()),
                orders::status.eq(status.as_str()),
            ))
            .execute(&mut conn)?;
        Ok::<_, AppError>(())
    })
    .await??;
    Ok(())
}

fn attachment_name(product_name: &str, machine_type: &str) -> String {
    let stem: String = product_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let ext = MachineType::from_str(machine_type)
        .map(|m| m.extension())
        .unwrap_or("bin");
    format!("{stem}.{ext}")
}

fn compose_receipt_html(order: &Order, user: &User, lines: &[ResolvedLine]) -> String {
    let rows: String = lines
        .iter()
        .map(|l| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                l.product_name, l.machine_type
            )
        })
        .collect();
    format!(
        "<html><body>\
         <h2>Thank you for your purchase, {username}!</h2>\
         <p>Order <strong>{order_ref}</strong> is confirmed. Your design files \
         are attached to this email.</p>\
         <table border=\"1\" cellpadding=\"6\">\
         <tr><th>Design</th><th>Machine format</th></tr>{rows}</table>\
         <p>Total paid: ₹{total}</p>\
         </body></html>",
        username = user.username,
        order_ref = order.order_ref,
        rows = rows,
        total = order.total_amount,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            order_ref: "ORD-17000000000001234".into(),
            user_id: Uuid::new_v4(),
            total_amount: BigDecimal::from_str("499.00").unwrap(),
            status: OrderStatus::SendingEmail.as_str().into(),
            email_sent: false,
            email_status: EmailStatus::Pending.as_str().into(),
            gateway_payment_id: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "stitcher".into(),
            email: "stitcher@example.com".into(),
            role: "user".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn receipt_lists_every_line_and_the_total() {
        let order = sample_order();
        let user = sample_user();
        let lines = vec![
            ResolvedLine {
                product_name: "Peacock Motif".into(),
                machine_type: "brother-pes".into(),
                file_ref: Some("file-1".into()),
                file_name: Some("peacock.pes".into()),
            },
            ResolvedLine {
                product_name: "Rose Border".into(),
                machine_type: "tajima-dst".into(),
                file_ref: None,
                file_name: None,
            },
        ];
        let html = compose_receipt_html(&order, &user, &lines);
        assert!(html.contains("ORD-17000000000001234"));
        assert!(html.contains("Peacock Motif"));
        assert!(html.contains("Rose Border"));
        assert!(html.contains("brother-pes"));
        assert!(html.contains("₹499.00"));
        assert!(html.contains("stitcher"));
    }

    #[test]
    fn attachment_names_use_the_machine_extension() {
        assert_eq!(
            attachment_name("Peacock Motif", "brother-pes"),
            "Peacock_Motif.pes"
        );
        assert_eq!(
            attachment_name("Rose Border", "husqvarna-vp3"),
            "Rose_Border.vp3"
        );
        // Unknown machine strings cannot normally reach here, but are still
        // given a safe fallback.
        assert_eq!(attachment_name("X", "mystery"), "X.bin");
    }
}
