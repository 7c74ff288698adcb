//! Footsites-family (Foot Locker, Champs, Eastbay, Finish Line) checkout
//! state machine: `find → cart → create_checkout_session → submit_shipping
//! → submit_payment`, with a queue/waiting-room poll inserted wherever the
//! storefront returns one.

use std::time::Duration;

use regex::Regex;
use serde_json::{Value, json};
use tracing::info;

use common::domain::Profile;
use task::TaskResult;

use crate::adyen::AdyenEncryptor;
use crate::error::CheckoutError;
use crate::http::CheckoutHttp;
use crate::sleeper::Sleeper;
use crate::types::FootsitesBrandConfig;

const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(3);
const MAX_QUEUE_POLLS: u32 = 60;

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

fn is_queue_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("queue") || lower.contains("waiting room")
}

/// Polls a landing/checkout URL with the same cookie jar until it stops
/// serving a queue/waiting-room page.
async fn wait_out_queue(
    http: &dyn CheckoutHttp,
    sleeper: &dyn Sleeper,
    url: &str,
) -> Result<crate::http::HttpResponse, CheckoutError> {
    let mut resp = http.get(url).await?;
    let mut polls = 0;
    while is_queue_page(&resp.body) && polls < MAX_QUEUE_POLLS {
        sleeper.sleep(QUEUE_POLL_INTERVAL).await;
        resp = http.get(url).await?;
        polls += 1;
    }
    Ok(resp)
}

#[derive(Debug, Clone)]
struct SearchedProduct {
    id: String,
}

fn parse_search_results(body: &str) -> Vec<SearchedProduct> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    parsed
        .get("products")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|p| p.get("id").and_then(|id| id.as_str()).map(|id| SearchedProduct { id: id.to_string() }))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct ProductVariant {
    variant_id: String,
    size: String,
}

fn parse_variants(body: &str) -> Vec<ProductVariant> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    parsed
        .get("variants")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    let id = v.get("id").and_then(|id| id.as_str())?;
                    let size = v.get("size").and_then(|s| s.as_str())?;
                    Some(ProductVariant { variant_id: id.to_string(), size: size.to_string() })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn select_variant(variants: &[ProductVariant], requested_size: &str) -> Option<ProductVariant> {
    variants
        .iter()
        .find(|v| v.size.eq_ignore_ascii_case(requested_size) || v.size.contains(requested_size))
        .cloned()
}

fn scrape_adyen_public_key(body: &str) -> Option<String> {
    let re = Regex::new(r#"adyenPublicKey["']?\s*[:=]\s*["']([0-9a-fA-F]+\|[0-9a-fA-F]+)["']"#).ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn extract_order_number(body: &str) -> Option<String> {
    let re = Regex::new(r"Order\s*#?\s*(\d+)").ok()?;
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

async fn find_variant(
    http: &dyn CheckoutHttp,
    brand: &FootsitesBrandConfig,
    monitor_input: &str,
    size: &str,
) -> Result<ProductVariant, TaskResult> {
    let search_url = format!("{}/products/search?query={}&limit=24", brand.api_base, monitor_input);
    let search_resp = http.get(&search_url).await.map_err(|e| failed(e.to_string()))?;
    let products = parse_search_results(&search_resp.body);
    if products.is_empty() {
        return Err(failed("no products matched the search query"));
    }

    for product in products {
        let product_url = format!("{}/products/{}", brand.api_base, product.id);
        let product_resp = match http.get(&product_url).await {
            Ok(resp) => resp,
            Err(_) => continue,
        };
        let variants = parse_variants(&product_resp.body);
        if let Some(variant) = select_variant(&variants, size) {
            return Ok(variant);
        }
    }

    Err(failed(format!("no in-stock variant found for size {size}")))
}

/// Runs the full state machine for one Footsites checkout attempt.
pub async fn run(
    http: &dyn CheckoutHttp,
    sleeper: &dyn Sleeper,
    brand: &FootsitesBrandConfig,
    monitor_input: &str,
    size: &str,
    profile: &Profile,
) -> TaskResult {
    let landing = match wait_out_queue(http, sleeper, &format!("https://www.{}", brand.domain)).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };

    let variant = match find_variant(http, brand, monitor_input, size).await {
        Ok(variant) => variant,
        Err(result) => return result,
    };
    info!(variant_id = %variant.variant_id, "footsites variant selected");

    let cart_resp = match http
        .post_json(&brand.cart_api, &json!({"variantId": variant.variant_id, "quantity": 1}))
        .await
    {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };
    if !(200..300).contains(&cart_resp.status) {
        return failed(format!("cart api returned {}", cart_resp.status));
    }

    let checkout_resp = match wait_out_queue(http, sleeper, &brand.checkout_api).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };

    let public_key_hex = match scrape_adyen_public_key(&checkout_resp.body).or_else(|| scrape_adyen_public_key(&landing.body)) {
        Some(key) => key,
        None => return failed("could not scrape an adyen public key from the checkout page"),
    };
    let encryptor = match AdyenEncryptor::new(&public_key_hex) {
        Ok(encryptor) => encryptor,
        Err(err) => return failed(err.to_string()),
    };
    let encrypted_card = match encryptor.encrypt_card(
        &profile.card.number,
        &profile.card.expiry_month,
        &profile.card.expiry_year_full,
        &profile.card.cvv,
        Some(&profile.card.holder),
    ) {
        Ok(payload) => payload,
        Err(err) => return failed(err.to_string()),
    };

    let shipping_payload = json!({
        "email": profile.email,
        "phone": profile.phone,
        "shippingAddress": {
            "firstName": profile.shipping.first_name,
            "lastName": profile.shipping.last_name,
            "address1": profile.shipping.address1,
            "city": profile.shipping.city,
            "state": profile.shipping.state,
            "zipCode": profile.shipping.zip_code,
            "country": profile.shipping.country,
        },
    });
    let shipping_resp = match http.post_json(&brand.checkout_api, &shipping_payload).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };
    if !(200..300).contains(&shipping_resp.status) {
        return failed(format!("shipping submission returned {}", shipping_resp.status));
    }

    let payment_payload = json!({
        "paymentMethod": {
            "type": "scheme",
            "encryptedCardNumber": encrypted_card,
        },
    });
    let payment_resp = match http.post_json(&brand.checkout_api, &payment_payload).await {
        Ok(resp) => resp,
        Err(err) => return failed(err.to_string()),
    };

    if payment_resp.url.contains("confirmation") || payment_resp.url.contains("thank") {
        let order_number = extract_order_number(&payment_resp.body).unwrap_or_default();
        return succeeded(order_number, payment_resp.url);
    }
    let lower = payment_resp.body.to_lowercase();
    if lower.contains("declined") || lower.contains("refused") {
        return declined("adyen refused the payment");
    }

    failed("payment submission returned an unrecognized state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::NoopSleeper;
    use rsa::{RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
    use std::sync::Mutex;

    fn encode_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn sample_key_hex() -> String {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
        let public = RsaPublicKey::from(&private);
        format!("{}|{}", encode_hex(&public.e().to_bytes_be()), encode_hex(&public.n().to_bytes_be()))
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

    struct ScriptedHttp {
        sequence: Mutex<Vec<crate::http::HttpResponse>>,
        index: Mutex<usize>,
    }

    fn resp(status: u16, url: &str, body: &str) -> crate::http::HttpResponse {
        crate::http::HttpResponse { status, url: url.to_string(), body: body.to_string() }
    }

    #[async_trait::async_trait]
    impl CheckoutHttp for ScriptedHttp {
        async fn get(&self, _url: &str) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next()
        }
        async fn post_form(&self, _url: &str, _form: &[(&str, &str)]) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next()
        }
        async fn post_json(&self, _url: &str, _json: &Value) -> Result<crate::http::HttpResponse, CheckoutError> {
            self.next()
        }
    }

    impl ScriptedHttp {
        fn next(&self) -> Result<crate::http::HttpResponse, CheckoutError> {
            let mut idx = self.index.lock().unwrap();
            let seq = self.sequence.lock().unwrap();
            let r = seq[*idx].clone();
            *idx += 1;
            Ok(r)
        }
    }

    fn scripted(sequence: Vec<crate::http::HttpResponse>) -> ScriptedHttp {
        ScriptedHttp { sequence: Mutex::new(sequence), index: Mutex::new(0) }
    }

    #[tokio::test]
    async fn successful_footsites_checkout() {
        let key_hex = sample_key_hex();
        let checkout_body = format!(r#"<script>var adyenPublicKey = "{key_hex}";</script>"#);
        let http = scripted(vec![
            resp(200, "https://www.footlocker.com", "<html>landing</html>"),
            resp(200, "search", r#"{"products":[{"id":"p1"}]}"#),
            resp(200, "product", r#"{"variants":[{"id":"v1","size":"10"}]}"#),
            resp(200, "cart", "{}"),
            resp(200, "checkout", &checkout_body),
            resp(200, "checkout", "{}"),
            resp(200, "https://www.footlocker.com/checkout/confirmation", "Order #998877"),
        ]);
        let brand = FootsitesBrandConfig::foot_locker();
        let result = run(&http, &NoopSleeper, &brand, "air force 1", "10", &sample_profile()).await;
        assert!(result.success);
        assert_eq!(result.order_number.as_deref(), Some("998877"));
    }

    #[test]
    fn queue_page_detection_is_case_insensitive() {
        assert!(is_queue_page("You are in the Queue"));
        assert!(is_queue_page("Welcome to our waiting room"));
        assert!(!is_queue_page("<html>product page</html>"));
    }

    #[test]
    fn selects_variant_by_size_match() {
        let variants = vec![
            ProductVariant { variant_id: "a".into(), size: "9".into() },
            ProductVariant { variant_id: "b".into(), size: "10".into() },
        ];
        let picked = select_variant(&variants, "10").unwrap();
        assert_eq!(picked.variant_id, "b");
    }

    #[test]
    fn brand_configs_use_the_right_domains() {
        assert_eq!(FootsitesBrandConfig::champs().domain, "champssports.com");
        assert_eq!(FootsitesBrandConfig::eastbay().domain, "eastbay.com");
        assert_eq!(FootsitesBrandConfig::finish_line().domain, "finishline.com");
    }
}
