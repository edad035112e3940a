use serde::Deserialize;
use serde_json::json;

use super::{check_status, http_client, transport_error, IntegrationError};
use crate::config::PayPalConfig;

pub const CURRENCY: &str = "USD";

/// Online price per service, in cents. Services not listed are deposit-only.
const PRICE_SCHEDULE: &[(&str, u32)] = &[
    ("Routine Annual Blood Draw", 8_500),
    ("Vital Signs", 4_500),
    ("Prenatal Lab Testing", 12_000),
    ("Full Blood Test Panels", 15_000),
    ("Cholesterol Testing", 6_000),
    ("ECG", 9_500),
    ("COVID, HIV & STD Screening", 11_000),
    ("HCG & Pregnancy Testing", 5_500),
    ("Drug & Food Allergy Sensitivity Testing", 17_500),
];

pub fn service_price_cents(service: &str) -> Option<u32> {
    PRICE_SCHEDULE
        .iter()
        .find(|(name, _)| *name == service.trim())
        .map(|(_, cents)| *cents)
}

/// "85.00" for 8500.
pub fn format_cents(cents: u32) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Inverse of [`format_cents`]; `None` for anything that is not a plain
/// amount with at most two decimals.
pub fn parse_cents(value: &str) -> Option<u32> {
    let (whole, fraction) = value.trim().split_once('.').unwrap_or((value.trim(), ""));
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: u32 = whole.parse().ok()?;
    let fraction: u32 = format!("{fraction:0<2}").parse().ok()?;
    whole.checked_mul(100)?.checked_add(fraction)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOrder {
    pub id: String,
    pub status: String,
    /// Where the payer approves the order, when the processor returns one.
    pub approve_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub order_id: String,
    pub status: String,
}

impl CaptureResult {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// What the processor reports for an existing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub id: String,
    pub status: String,
    pub amount_cents: Option<u32>,
    pub currency: Option<String>,
}

impl OrderDetails {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

pub trait PaymentGateway: Send + Sync {
    fn create_order(&self, amount_cents: u32, description: &str) -> Result<PaymentOrder, IntegrationError>;
    fn capture_order(&self, order_id: &str) -> Result<CaptureResult, IntegrationError>;
    /// Look an order up at the processor. Unknown ids surface as a 404 `Status` error.
    fn order_details(&self, order_id: &str) -> Result<OrderDetails, IntegrationError>;
}

/// PayPal Orders v2 client using client-credentials OAuth.
pub struct PayPalClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    return_url: String,
    cancel_url: String,
    brand_name: String,
}

impl PayPalClient {
    pub fn new(config: &PayPalConfig, public_url: &str, brand_name: &str) -> Self {
        let public_url = public_url.trim_end_matches('/');
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            return_url: format!("{public_url}/booking/paid"),
            cancel_url: format!("{public_url}/booking/cancelled"),
            brand_name: brand_name.to_string(),
        }
    }

    fn access_token(&self, client: &reqwest::blocking::Client) -> Result<String, IntegrationError> {
        let url = format!("{}/v1/oauth2/token", self.base_url);
        let response = client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .map_err(|e| transport_error("PayPal", &url, e))?;

        let parsed: TokenResponse = check_status("PayPal", response)?
            .json()
            .map_err(|e| IntegrationError::ResponseParsing(e.to_string()))?;
        Ok(parsed.access_token)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OrderLink {
    href: String,
    rel: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<OrderLink>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    amount: Option<OrderAmount>,
}

#[derive(Deserialize)]
struct OrderAmount {
    currency_code: String,
    value: String,
}

impl From<OrderResponse> for OrderDetails {
    fn from(order: OrderResponse) -> Self {
        let amount = order.purchase_units.into_iter().find_map(|unit| unit.amount);
        Self {
            amount_cents: amount.as_ref().and_then(|a| parse_cents(&a.value)),
            currency: amount.map(|a| a.currency_code),
            id: order.id,
            status: order.status,
        }
    }
}

impl PaymentGateway for PayPalClient {
    fn create_order(&self, amount_cents: u32, description: &str) -> Result<PaymentOrder, IntegrationError> {
        let client = http_client()?;
        let token = self.access_token(&client)?;
        let url = format!("{}/v2/checkout/orders", self.base_url);
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "description": description,
                "amount": { "currency_code": CURRENCY, "value": format_cents(amount_cents) },
            }],
            "application_context": {
                "brand_name": self.brand_name,
                "return_url": self.return_url,
                "cancel_url": self.cancel_url,
            },
        });

        let response = client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .map_err(|e| transport_error("PayPal", &url, e))?;
        let order: OrderResponse = check_status("PayPal", response)?
            .json()
            .map_err(|e| IntegrationError::ResponseParsing(e.to_string()))?;

        let approve_url = order
            .links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone());
        tracing::info!(order_id = %order.id, amount = %format_cents(amount_cents), "Created PayPal order");

        Ok(PaymentOrder {
            id: order.id,
            status: order.status,
            approve_url,
        })
    }

    fn capture_order(&self, order_id: &str) -> Result<CaptureResult, IntegrationError> {
        let client = http_client()?;
        let token = self.access_token(&client)?;
        let url = format!("{}/v2/checkout/orders/{}/capture", self.base_url, order_id);

        let response = client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .map_err(|e| transport_error("PayPal", &url, e))?;
        let order: OrderResponse = check_status("PayPal", response)?
            .json()
            .map_err(|e| IntegrationError::ResponseParsing(e.to_string()))?;

        tracing::info!(order_id = %order.id, status = %order.status, "Captured PayPal order");
        Ok(CaptureResult {
            order_id: order.id,
            status: order.status,
        })
    }

    fn order_details(&self, order_id: &str) -> Result<OrderDetails, IntegrationError> {
        let client = http_client()?;
        let token = self.access_token(&client)?;
        let url = format!("{}/v2/checkout/orders/{}", self.base_url, order_id);

        let response = client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .map_err(|e| transport_error("PayPal", &url, e))?;
        let order: OrderResponse = check_status("PayPal", response)?
            .json()
            .map_err(|e| IntegrationError::ResponseParsing(e.to_string()))?;
        Ok(order.into())
    }
}
