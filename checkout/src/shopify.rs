//! Shopify checkout state machine: `find → cart → create_checkout →
//! submit_info → submit_shipping → submit_payment → confirm`.

use std::time::Duration;

use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use common::domain::Profile;
use task::TaskResult;

use crate::error::CheckoutError;
use crate::http::CheckoutHttp;
use crate::sleeper::Sleeper;
use crate::types::ShopifyCheckoutSession;

const MAX_CHECKPOINT_RETRIES: u32 = 3;
const VAULT_URL: &str = "https://deposit.shopifycs.com/sessions";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 20;
const COMMON_STOREFRONT_PASSWORDS: &[&str] = &["sneakers", "password", "letmein", "early", "access"];

fn now_ms() -> u64 {
    common::time::now_ms()
}

fn ok(mut result: TaskResult) -> TaskResult {
    result.timestamp_ms = now_ms();
    result
}

fn failed(message: impl Into<String>) -> TaskResult {
    ok(TaskResult { success: false, error_message: Some(message.into()), ..Default::default() })
}

fn declined(message: impl Into<String>) -> TaskResult {
    // Declined is its own terminal status at the scheduler level; the
    // engine reports it through the same `TaskResult` shape with
    // `success=false` and a message the caller can match on.
    failed(format!("declined: {}", message.into()))
}

fn succeeded(order_number: String, checkout_url: String) -> TaskResult {
    ok(TaskResult {
        success: true,
        order_number: Some(order_number),
        checkout_url: Some(checkout_url),
        ..Default::default()
    })
}

/// Checks the landing page for a storefront password gate and, if
/// present, attempts three bypasses in order.
/// Returns `Ok(())` if the store is (now) accessible, `Err` if all
/// bypasses were exhausted.
async fn bypass_password_gate_if_present(
    http: &dyn CheckoutHttp,
    store_url: &str,
) -> Result<(), CheckoutError> {
    let landing = http.get(store_url).await?;
    let gated = landing.url.contains("/password") || landing.body.contains(r#"name="password""#);
    if !gated {
        return Ok(());
    }

    warn!(store_url, "storefront password gate detected, attempting bypass");

    for probe in ["products.json", "collections.json", "cart.js"] {
        let probe_url = format!("{}/{}", store_url.trim_end_matches('/'), probe);
        if let Ok(resp) = http.get(&probe_url).await {
            if resp.status == 200 {
                return Ok(());
            }
        }
    }

    let token = scrape_authenticity_token(&landing.body);
    if let Some(token) = token {
        let password_url = format!("{}/password", store_url.trim_end_matches('/'));
        for candidate in COMMON_STOREFRONT_PASSWORDS {
            let form = [("form_type", "storefront_password"), ("password", candidate), ("authenticity_token", &token)];
            if let Ok(resp) = http.post_form(&password_url, &form).await {
                if !resp.body.contains(r#"name="password""#) {
                    return Ok(());
                }
            }
        }
    }

    let preview_url = format!("{}?preview_theme_id=current", store_url.trim_end_matches('/'));
    if let Ok(resp) = http.get(&preview_url).await {
        if resp.status == 200 && !resp.body.contains(r#"name="password""#) {
            return Ok(());
        }
    }

    Err(CheckoutError::UnexpectedResponse("password gate bypass exhausted".to_string()))
}

fn scrape_authenticity_token(body: &str) -> Option<String> {
    let re = Regex::new(r#"name="authenticity_token"\s+value="([^"]+)""#).ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn is_checkpoint(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("checkpoint") && lower.contains("verify you are human")
}

fn checkout_token_and_shop(url: &str) -> Option<(String, String)> {
    let re = Regex::new(r"/(\d+)/checkouts/([A-Za-z0-9]+)").ok()?;
    let caps = re.captures(url)?;
    Some((caps.get(2)?.as_str().to_string(), caps.get(1)?.as_str().to_string()))
}

async fn create_checkout(
    http: &dyn CheckoutHttp,
    sleeper: &dyn Sleeper,
    store_url: &str,
) -> Result<ShopifyCheckoutSession, TaskResult> {
    for attempt in 1..=MAX_CHECKPOINT_RETRIES {
        let checkout_url = format!("{}/checkout", store_url.trim_end_matches('/'));
        let resp = match http.get(&checkout_url).await {
            Ok(resp) => resp,
            Err(err) => return Err(failed(err.to_string())),
        };

        if is_checkpoint(&resp.body) {
            sleeper.sleep(Duration::from_secs(2 + 3 * attempt as u64)).await;
            continue;
        }

        if let Some((token, shop_id)) = checkout_token_and_shop(&resp.url) {
            return Ok(ShopifyCheckoutSession {
                checkout_url: resp.url,
                checkout_token: token,
                shop_id,
                shipping_rate_id: None,
                total: None,
            });
        }

        return Err(failed("checkout redirect did not contain a checkout token"));
    }

    Err(failed("checkpoint retries exhausted"))
}

fn scrape_shipping_rate(body: &str) -> Option<String> {
    let re = Regex::new(r#"data-shipping-method="([^"]+)""#).ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn scrape_gateway_id(body: &str) -> String {
    Regex::new(r#"data-select-gateway="([^"]+)""#)
        .ok()
        .and_then(|re| re.captures(body))
        .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| "credit_card".to_string())
}

fn scrape_error_notice(body: &str) -> Option<String> {
    let re = Regex::new(r#"notice--error[^>]*>([^<]+)<"#).ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string())
}

fn extract_order_number(body: &str) -> Option<String> {
    let re = Regex::new(r"Order\s*#?\s*(\d+)").ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

async fn vault_card(http: &dyn CheckoutHttp, profile: &Profile) -> Result<String, CheckoutError> {
    let card = &profile.card;
    let payload = json!({
        "credit_card": {
            "number": card.number,
            "name": card.holder,
            "month": card.expiry_month.parse::<u32>().unwrap_or(1),
            "year": card.expiry_year_full.parse::<u32>().unwrap_or(2030),
            "verification_value": card.cvv,
        }
    });
    let resp = http.post_json(VAULT_URL, &payload).await?;
    let parsed: serde_json::Value = serde_json::from_str(&resp.body)
        .map_err(|e| CheckoutError::UnexpectedResponse(e.to_string()))?;
    parsed
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CheckoutError::UnexpectedResponse("vault response missing id".to_string()))
}

async fn poll_processing(http: &dyn CheckoutHttp, sleeper: &dyn Sleeper, poll_url: &str) -> TaskResult {
    for _ in 0..MAX_POLLS {
        sleeper.sleep(POLL_INTERVAL).await;
        let resp = match http.get(poll_url).await {
            Ok(resp) => resp,
            Err(err) => return failed(err.to_string()),
        };
        if resp.url.contains("thank_you") || resp.url.contains("orders/") {
            let order_number = extract_order_number(&resp.body).unwrap_or_default();
            return succeeded(order_number, resp.url);
        }
        let lower = resp.body.to_lowercase();
        if lower.contains("stock_problems") || lower.contains("declined") {
            return declined("payment declined while processing");
        }
    }
    failed("payment processing poll exhausted without resolution")
}

/// Runs the full state machine for one checkout attempt.
pub async fn run(
    http: &dyn CheckoutHttp,
    sleeper: &dyn Sleeper,
    store_url: &str,
    variant_id: &str,
    profile: &Profile,
) -> TaskResult {
    if let Err(err) = bypass_password_gate_if_present(http, store_url).await {
        return failed(err.to_string());
    }

    let add_to_cart_url = format!("{}/cart/add.js", store_url.trim_end_matches('/'));
    let cart_resp = match http
        .post_json(&add_to_cart_url, &json!({"items": [{"id": variant_id, "quantity": 1}]}))
        .await
    {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };
    if !(200..300).contains(&cart_resp.status) {
        return failed(format!("cart/add.js returned {}", cart_resp.status));
    }

    let mut session = match create_checkout(http, sleeper, store_url).await {
        Ok(session) => session,
        Err(result) => return result,
    };
    info!(checkout_token = %session.checkout_token, "checkout session created");

    let shipping_resp = match http.get(&session.checkout_url).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };
    let shipping_rate_id = match scrape_shipping_rate(&shipping_resp.body) {
        Some(rate) => rate,
        None => return failed("could not scrape a shipping rate from the checkout page"),
    };
    session.shipping_rate_id = Some(shipping_rate_id.clone());

    let vault_session_id = match vault_card(http, profile).await {
        Ok(id) => id,
        Err(err) => return failed(err.to_string()),
    };
    let gateway_id = scrape_gateway_id(&shipping_resp.body);

    let billing_same = if profile.billing_same_as_shipping { "true" } else { "false" };
    let form: Vec<(&str, &str)> = vec![
        ("checkout[email]", &profile.email),
        ("checkout[shipping_address][first_name]", &profile.shipping.first_name),
        ("checkout[shipping_address][last_name]", &profile.shipping.last_name),
        ("checkout[shipping_rate][id]", &shipping_rate_id),
        ("checkout[payment_gateway]", &gateway_id),
        ("checkout[credit_card][vault]", "false"),
        ("checkout[different_billing_address]", billing_same),
        ("complete", "1"),
        ("checkout[client_details][browser_width]", "1920"),
        ("checkout[client_details][browser_height]", "1080"),
        ("checkout[client_details][javascript_enabled]", "1"),
        ("s", &vault_session_id),
    ];

    let payment_resp = match http.post_form(&session.checkout_url, &form).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };

    if payment_resp.url.contains("thank_you") || payment_resp.url.contains("orders/") {
        let order_number = extract_order_number(&payment_resp.body).unwrap_or_default();
        return succeeded(order_number, payment_resp.url);
    }
    if payment_resp.url.contains("processing") {
        return poll_processing(http, sleeper, &payment_resp.url).await;
    }
    let lower_body = payment_resp.body.to_lowercase();
    if lower_body.contains("declined") {
        return declined("card declined");
    }
    if lower_body.contains("error") {
        let notice = scrape_error_notice(&payment_resp.body).unwrap_or_else(|| "unknown error".to_string());
        return failed(notice);
    }

    failed("payment submission returned an unrecognized state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::NoopSleeper;
    use std::sync::Mutex;

    struct ScriptedHttp {
        gets: Mutex<Vec<Vec<crate::http::HttpResponse>>>,
        index: Mutex<usize>,
    }

    fn resp(status: u16, url: &str, body: &str) -> crate::http::HttpResponse {
        crate::http::HttpResponse { status, url: url.to_string(), body: body.to_string() }
    }

    fn sample_profile() -> Profile {
        use common::domain::{Address, Card};
        let addr = Address {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            address1: "1 Main St".into(),
            address2: "".into(),
            city: "Portland".into(),
            state: "OR".into(),
            zip_code: "97201".into(),
            country: "US".into(),
        };
        Profile {
            id: "p1".into(),
            email: "jane@example.com".into(),
            phone: "5555555555".into(),
            shipping: addr.clone(),
            billing: addr,
            billing_same_as_shipping: true,
            card: Card {
                number: "4111111111111111".into(),
                holder: "Jane Doe".into(),
                expiry_month: "03".into(),
                expiry_year_full: "2030".into(),
                cvv: "737".into(),
            },
        }
    }

    #[async_trait::async_trait]
    impl CheckoutHttp for ScriptedHttp {
        async fn get(&self, url: &str) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next_for(url)
        }
        async fn post_form(&self, url: &str, _form: &[(&str, &str)]) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next_for(url)
        }
        async fn post_json(&self, url: &str, _json: &serde_json::Value) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next_for(url)
        }
    }

    impl ScriptedHttp {
        fn next_for(&self, _url: &str) -> Result<crate::http::HttpResponse, CheckoutError> {
            let mut idx = self.index.lock().unwrap();
            let calls = self.gets.lock().unwrap();
            let r = calls[0][*idx].clone();
            *idx += 1;
            Ok(r)
        }
    }

    fn scripted(sequence: Vec<crate::http::HttpResponse>) -> ScriptedHttp {
        ScriptedHttp { gets: Mutex::new(vec![sequence]), index: Mutex::new(0) }
    }

    #[tokio::test]
    async fn e1_shopify_success() {
        let http = scripted(vec![
            resp(200, "https://store.example.com", "<html></html>"),
            resp(200, "https://store.example.com/cart/add.js", "{}"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", "<html></html>"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", r#"<div data-shipping-method="ship-rate-std"></div>"#),
            resp(200, VAULT_URL, r#"{"id":"vault-session-1"}"#),
            resp(200, "https://store.example.com/.../thank_you", "Order #5551234"),
        ]);
        let result = run(&http, &NoopSleeper, "https://store.example.com", "variant-1", &sample_profile()).await;
        assert!(result.success);
        assert_eq!(result.order_number.as_deref(), Some("5551234"));
    }

    #[tokio::test]
    async fn e3_declined_card() {
        let http = scripted(vec![
            resp(200, "https://store.example.com", "<html></html>"),
            resp(200, "https://store.example.com/cart/add.js", "{}"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", "<html></html>"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", r#"<div data-shipping-method="ship-rate-std"></div>"#),
            resp(200, VAULT_URL, r#"{"id":"vault-session-1"}"#),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", "Your card was declined."),
        ]);
        let result = run(&http, &NoopSleeper, "https://store.example.com", "variant-1", &sample_profile()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn e2_checkpoint_resolves_after_two_retries() {
        let http = scripted(vec![
            resp(200, "https://store.example.com", "<html></html>"),
            resp(200, "https://store.example.com/cart/add.js", "{}"),
            resp(200, "https://store.example.com/checkout", "checkpoint: verify you are human"),
            resp(200, "https://store.example.com/checkout", "checkpoint: verify you are human"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", "<html></html>"),
            resp(200, "https://store.example.com/12345/checkouts/abcdef01", r#"<div data-shipping-method="ship-rate-std"></div>"#),
            resp(200, VAULT_URL, r#"{"id":"vault-session-1"}"#),
            resp(200, "https://store.example.com/.../thank_you", "Order #5559999"),
        ]);
        let result = run(&http, &NoopSleeper, "https://store.example.com", "variant-1", &sample_profile()).await;
        assert!(result.success);
        assert_eq!(result.order_number.as_deref(), Some("5559999"));
    }

    #[test]
    fn checkpoint_detection_requires_both_markers() {
        assert!(is_checkpoint("Please wait, checkpoint: verify you are human"));
        assert!(!is_checkpoint("just a checkpoint page"));
    }

    #[test]
    fn extracts_token_and_shop_id_from_redirect() {
        let (token, shop) = checkout_token_and_shop("https://store.example.com/12345/checkouts/abcdef01").unwrap();
        assert_eq!(token, "abcdef01");
        assert_eq!(shop, "12345");
    }

    #[test]
    fn extracts_order_number() {
        assert_eq!(extract_order_number("Order #5551234").as_deref(), Some("5551234"));
    }
}
