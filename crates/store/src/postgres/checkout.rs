use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    EventId, OrderId, PaymentId, PromoCodeId, SeatId, SectionId, TicketId, TicketTypeId, UserId,
};
use domain::{
    BuyerInfo, Discount, Event, Money, Order, OrderNumber, OrderReservation, OrderStatus, Payment,
    PromoCode, Seat, Section, Ticket, TicketType,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{CatalogSeeder, CheckoutStore, OrderCommit, Result, StoreError};

const ORDER_COLUMNS: &str = r#"
    id, order_number, status, user_id, event_id, buyer, currency, quantity,
    base_amount, discount_amount, commission_amount, total_amount,
    ticket_type_id, promo_code_id, reservation, created_at, updated_at, paid_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, order_id, token, transaction_id, amount, currency, status,
    authorization_code, response_code, payment_type_code, transaction_date,
    created_at, updated_at
"#;

/// PostgreSQL-backed checkout store.
#[derive(Clone)]
pub struct PostgresCheckoutStore {
    pool: PgPool,
}

impl PostgresCheckoutStore {
    /// Creates a new PostgreSQL checkout store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let order_number = OrderNumber::parse(row.try_get::<String, _>("order_number")?)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let buyer: Json<BuyerInfo> = row.try_get("buyer")?;
        let reservation: Option<Json<OrderReservation>> = row.try_get("reservation")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number,
            status: parse(row.try_get("status")?)?,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            buyer: buyer.0,
            currency: parse(row.try_get("currency")?)?,
            quantity: to_u32(row.try_get("quantity")?)?,
            base_amount: Money::new(row.try_get("base_amount")?),
            discount_amount: Money::new(row.try_get("discount_amount")?),
            commission_amount: Money::new(row.try_get("commission_amount")?),
            total_amount: Money::new(row.try_get("total_amount")?),
            ticket_type_id: row
                .try_get::<Option<Uuid>, _>("ticket_type_id")?
                .map(TicketTypeId::from_uuid),
            promo_code_id: row
                .try_get::<Option<Uuid>, _>("promo_code_id")?
                .map(PromoCodeId::from_uuid),
            reservation: reservation.map(|r| r.0),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            paid_at: row.try_get("paid_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            token: row.try_get("token")?,
            transaction_id: row.try_get("transaction_id")?,
            amount: Money::new(row.try_get("amount")?),
            currency: parse(row.try_get("currency")?)?,
            status: parse(row.try_get("status")?)?,
            authorization_code: row.try_get("authorization_code")?,
            response_code: row.try_get("response_code")?,
            payment_type_code: row.try_get("payment_type_code")?,
            transaction_date: row.try_get("transaction_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_ticket(row: PgRow) -> Result<Ticket> {
        Ok(Ticket {
            id: TicketId::from_uuid(row.try_get::<Uuid, _>("id")?),
            qr_code: row.try_get("qr_code")?,
            status: parse(row.try_get("status")?)?,
            is_used: row.try_get("is_used")?,
            used_at: row.try_get("used_at")?,
            seat_id: row.try_get::<Option<String>, _>("seat_id")?.map(SeatId::new),
            ticket_type_id: row
                .try_get::<Option<Uuid>, _>("ticket_type_id")?
                .map(TicketTypeId::from_uuid),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_seat(row: PgRow) -> Result<Seat> {
        Ok(Seat {
            id: SeatId::new(row.try_get::<String, _>("id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            section_id: SectionId::from_uuid(row.try_get::<Uuid, _>("section_id")?),
            label: row.try_get("label")?,
            price: row.try_get::<Option<i64>, _>("price")?.map(Money::new),
            status: parse(row.try_get("status")?)?,
        })
    }

    fn row_to_ticket_type(row: PgRow) -> Result<TicketType> {
        Ok(TicketType {
            id: TicketTypeId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            name: row.try_get("name")?,
            price: Money::new(row.try_get("price")?),
            capacity: to_u32(row.try_get("capacity")?)?,
            tickets_generated: to_u32(row.try_get("tickets_generated")?)?,
            sold_units: to_u32(row.try_get("sold_units")?)?,
        })
    }

    fn row_to_promo_code(row: PgRow) -> Result<PromoCode> {
        let discount: Json<Discount> = row.try_get("discount")?;
        Ok(PromoCode {
            id: PromoCodeId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            code: row.try_get("code")?,
            discount: discount.0,
            max_uses: row
                .try_get::<Option<i32>, _>("max_uses")?
                .map(to_u32)
                .transpose()?,
            used_count: to_u32(row.try_get("used_count")?)?,
            valid_from: row.try_get("valid_from")?,
            valid_until: row.try_get("valid_until")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

fn parse<T: FromStr<Err = String>>(value: String) -> Result<T> {
    value.parse().map_err(StoreError::Decode)
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("negative count: {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("count out of range: {value}")))
}

#[async_trait]
impl CheckoutStore for PostgresCheckoutStore {
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query("SELECT id, title, is_published, currency FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Event {
                id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
                title: row.try_get("title")?,
                is_published: row.try_get("is_published")?,
                currency: parse(row.try_get("currency")?)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_sections(&self, section_ids: &[SectionId]) -> Result<Vec<Section>> {
        let ids: Vec<Uuid> = section_ids.iter().map(SectionId::as_uuid).collect();
        let rows = sqlx::query("SELECT id, event_id, name, price FROM sections WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Section {
                    id: SectionId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
                    name: row.try_get("name")?,
                    price: Money::new(row.try_get("price")?),
                })
            })
            .collect()
    }

    async fn get_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>> {
        let ids: Vec<&str> = seat_ids.iter().map(SeatId::as_str).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, section_id, label, price, status
            FROM event_seats
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_seat).collect()
    }

    async fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> Result<Option<TicketType>> {
        let row = sqlx::query(
            r#"
            SELECT id, event_id, name, price, capacity, tickets_generated, sold_units
            FROM ticket_types
            WHERE id = $1
            "#,
        )
        .bind(ticket_type_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_ticket_type).transpose()
    }

    async fn ticket_types_for_event(&self, event_id: EventId) -> Result<Vec<TicketType>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, name, price, capacity, tickets_generated, sold_units
            FROM ticket_types
            WHERE event_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_ticket_type).collect()
    }

    async fn find_promo_code(&self, event_id: EventId, code: &str) -> Result<Option<PromoCode>> {
        let row = sqlx::query(
            r#"
            SELECT id, event_id, code, discount, max_uses, used_count,
                   valid_from, valid_until, is_active
            FROM promo_codes
            WHERE event_id = $1 AND LOWER(code) = LOWER($2)
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_promo_code).transpose()
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, status, user_id, event_id, buyer, currency, quantity,
                base_amount, discount_amount, commission_amount, total_amount,
                ticket_type_id, promo_code_id, reservation, created_at, updated_at, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.status.as_str())
        .bind(order.user_id.as_str())
        .bind(order.event_id.as_uuid())
        .bind(Json(&order.buyer))
        .bind(order.currency.as_str())
        .bind(to_i32(order.quantity)?)
        .bind(order.base_amount.amount())
        .bind(order.discount_amount.amount())
        .bind(order.commission_amount.amount())
        .bind(order.total_amount.amount())
        .bind(order.ticket_type_id.map(|id| id.as_uuid()))
        .bind(order.promo_code_id.map(|id| id.as_uuid()))
        .bind(order.reservation.as_ref().map(Json))
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::AlreadyExists {
                    entity: "order number",
                    id: order.order_number.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO payments ({PAYMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(&payment.token)
        .bind(&payment.transaction_id)
        .bind(payment.amount.amount())
        .bind(payment.currency.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.authorization_code)
        .bind(payment.response_code)
        .bind(&payment.payment_type_code)
        .bind(payment.transaction_date)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_payment_token")
            {
                return StoreError::AlreadyExists {
                    entity: "payment token",
                    id: payment.token.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn find_payment_by_token(&self, token: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(
            r#"
            SELECT id, qr_code, status, is_used, used_at, seat_id, ticket_type_id,
                   user_id, order_id, event_id, created_at
            FROM tickets
            WHERE order_id = $1
            ORDER BY created_at ASC, qr_code ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_ticket).collect()
    }

    #[tracing::instrument(
        skip(self, commit),
        fields(order_id = %commit.order.id, status = %commit.order.status, tickets = commit.tickets.len())
    )]
    async fn commit_order(&self, commit: OrderCommit) -> Result<()> {
        let order = &commit.order;
        let mut tx = self.pool.begin().await?;

        // The guarded status flip goes first so a losing request holds no
        // row locks beyond the order itself.
        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3, paid_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(commit.expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(order.id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return match actual {
                Some(actual) => Err(StoreError::ConcurrencyConflict {
                    order_id: order.id,
                    expected: commit.expected_status,
                    actual: parse::<OrderStatus>(actual)?,
                }),
                None => Err(StoreError::not_found("order", order.id)),
            };
        }

        for ticket in &commit.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (
                    id, qr_code, status, is_used, used_at, seat_id, ticket_type_id,
                    user_id, order_id, event_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(ticket.id.as_uuid())
            .bind(&ticket.qr_code)
            .bind(ticket.status.as_str())
            .bind(ticket.is_used)
            .bind(ticket.used_at)
            .bind(ticket.seat_id.as_ref().map(SeatId::as_str))
            .bind(ticket.ticket_type_id.map(|id| id.as_uuid()))
            .bind(ticket.user_id.as_str())
            .bind(ticket.order_id.as_uuid())
            .bind(ticket.event_id.as_uuid())
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_ticket_qr_code")
                {
                    return StoreError::DuplicateQrCode(ticket.qr_code.clone());
                }
                StoreError::Database(e)
            })?;
        }

        if !commit.seats_to_mark_sold.is_empty() {
            let mut ids: Vec<&str> = commit
                .seats_to_mark_sold
                .iter()
                .map(SeatId::as_str)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            let sold = sqlx::query(
                "UPDATE event_seats SET status = 'SOLD' WHERE id = ANY($1) AND status = 'AVAILABLE'",
            )
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
            if sold.rows_affected() != ids.len() as u64 {
                tx.rollback().await?;
                return Err(StoreError::SoldOut(format!(
                    "{} of {} seats are no longer available",
                    ids.len() as u64 - sold.rows_affected(),
                    ids.len()
                )));
            }
        }

        if let Some((ticket_type_id, units)) = commit.ticket_type_units {
            let claimed = sqlx::query(
                r#"
                UPDATE ticket_types SET sold_units = sold_units + $2
                WHERE id = $1 AND sold_units + $2 <= capacity
                "#,
            )
            .bind(ticket_type_id.as_uuid())
            .bind(to_i32(units)?)
            .execute(&mut *tx)
            .await?;
            if claimed.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::SoldOut(format!(
                    "ticket type {ticket_type_id} cannot fit {units} more units"
                )));
            }
        }

        if let Some(promo_code_id) = commit.promo_code_id {
            let redeemed = sqlx::query(
                r#"
                UPDATE promo_codes SET used_count = used_count + 1
                WHERE id = $1 AND (max_uses IS NULL OR used_count < max_uses)
                "#,
            )
            .bind(promo_code_id.as_uuid())
            .execute(&mut *tx)
            .await?;
            if redeemed.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::SoldOut(format!(
                    "promo code {promo_code_id} reached its usage limit"
                )));
            }
        }

        for payment in &commit.payments {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = $2, authorization_code = $3, response_code = $4,
                    payment_type_code = $5, transaction_date = $6, updated_at = $7
                WHERE id = $1
                "#,
            )
            .bind(payment.id.as_uuid())
            .bind(payment.status.as_str())
            .bind(&payment.authorization_code)
            .bind(payment.response_code)
            .bind(&payment.payment_type_code)
            .bind(payment.transaction_date)
            .bind(payment.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl CatalogSeeder for PostgresCheckoutStore {
    async fn save_event(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, title, is_published, currency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                is_published = EXCLUDED.is_published,
                currency = EXCLUDED.currency
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(event.is_published)
        .bind(event.currency.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_section(&self, section: &Section) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sections (id, event_id, name, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, price = EXCLUDED.price
            "#,
        )
        .bind(section.id.as_uuid())
        .bind(section.event_id.as_uuid())
        .bind(&section.name)
        .bind(section.price.amount())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_seat(&self, seat: &Seat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_seats (id, event_id, section_id, label, price, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                label = EXCLUDED.label,
                price = EXCLUDED.price,
                status = EXCLUDED.status
            "#,
        )
        .bind(seat.id.as_str())
        .bind(seat.event_id.as_uuid())
        .bind(seat.section_id.as_uuid())
        .bind(&seat.label)
        .bind(seat.price.map(|p| p.amount()))
        .bind(seat.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_types (id, event_id, name, price, capacity, tickets_generated, sold_units)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                capacity = EXCLUDED.capacity,
                tickets_generated = EXCLUDED.tickets_generated,
                sold_units = EXCLUDED.sold_units
            "#,
        )
        .bind(ticket_type.id.as_uuid())
        .bind(ticket_type.event_id.as_uuid())
        .bind(&ticket_type.name)
        .bind(ticket_type.price.amount())
        .bind(to_i32(ticket_type.capacity)?)
        .bind(to_i32(ticket_type.tickets_generated)?)
        .bind(to_i32(ticket_type.sold_units)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_promo_code(&self, promo_code: &PromoCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, event_id, code, discount, max_uses, used_count,
                valid_from, valid_until, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                discount = EXCLUDED.discount,
                max_uses = EXCLUDED.max_uses,
                used_count = EXCLUDED.used_count,
                valid_from = EXCLUDED.valid_from,
                valid_until = EXCLUDED.valid_until,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(promo_code.id.as_uuid())
        .bind(promo_code.event_id.as_uuid())
        .bind(&promo_code.code)
        .bind(Json(promo_code.discount))
        .bind(promo_code.max_uses.map(to_i32).transpose()?)
        .bind(to_i32(promo_code.used_count)?)
        .bind(promo_code.valid_from)
        .bind(promo_code.valid_until)
        .bind(promo_code.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
