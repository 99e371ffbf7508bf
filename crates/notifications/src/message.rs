//! Notification payloads and their rendered text.

use common::{Money, OrderId};
use serde::{Deserialize, Serialize};

/// Everything a dispatcher needs to tell people about a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotice {
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub total: Money,
    pub lines: Vec<NoticeLine>,
}

/// One order line as shown in a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeLine {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A unit of work for the notification workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Customer SMS confirmation plus admin email alert.
    OrderPlaced(OrderNotice),
    /// Password reset link for `email`.
    PasswordReset { email: String, token: String },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced(_) => "order_placed",
            Notification::PasswordReset { .. } => "password_reset",
        }
    }
}

impl OrderNotice {
    /// First eight characters of the order id, as quoted to humans.
    pub fn short_id(&self) -> String {
        self.order_id.to_string().chars().take(8).collect()
    }

    pub fn confirmation_sms(&self) -> String {
        format!(
            "Thank you for your order #{}. Total: {}. We'll process it right away!",
            self.short_id(),
            self.total
        )
    }

    pub fn admin_subject(&self) -> String {
        format!("New Order #{}", self.short_id())
    }

    pub fn admin_body(&self) -> String {
        let mut body = format!(
            "New order received:\n\nOrder ID: {}\nCustomer: {} ({})\nTotal: {}\n\nItems:\n",
            self.short_id(),
            self.customer_name,
            self.customer_email,
            self.total
        );
        for line in &self.lines {
            body.push_str(&format!(
                "- {}x {} ({} each)\n",
                line.quantity, line.product_name, line.unit_price
            ));
        }
        body
    }
}

/// Body of the password reset email.
pub fn password_reset_body(client_url: &str, token: &str) -> String {
    format!(
        "You have requested to reset your password. Click the link below to reset your password:\n\n\
         {}/reset-password/{}\n\
         If you did not request a password reset, please ignore this email.\n",
        client_url.trim_end_matches('/'),
        token
    )
}
