//! Shopify checkout session state: URL, token, shop id, and whatever
//! gets scraped off the checkout page as the attempt progresses.

#[derive(Debug, Clone, Default)]
pub struct ShopifyCheckoutSession {
    pub checkout_url: String,
    pub checkout_token: String,
    pub shop_id: String,
    pub shipping_rate_id: Option<String>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ShopifyVariant {
    pub variant_id: String,
    pub size: String,
}

#[derive(Debug, Clone)]
pub struct FootsitesBrandConfig {
    pub domain: String,
    pub api_base: String,
    pub cart_api: String,
    pub checkout_api: String,
}

impl FootsitesBrandConfig {
    pub fn foot_locker() -> Self {
        Self {
            domain: "footlocker.com".into(),
            api_base: "https://www.footlocker.com/api".into(),
            cart_api: "https://www.footlocker.com/api/cart".into(),
            checkout_api: "https://www.footlocker.com/api/checkout".into(),
        }
    }

    pub fn champs() -> Self {
        Self {
            domain: "champssports.com".into(),
            api_base: "https://www.champssports.com/api".into(),
            cart_api: "https://www.champssports.com/api/cart".into(),
            checkout_api: "https://www.champssports.com/api/checkout".into(),
        }
    }

    pub fn eastbay() -> Self {
        Self {
            domain: "eastbay.com".into(),
            api_base: "https://www.eastbay.com/api".into(),
            cart_api: "https://www.eastbay.com/api/cart".into(),
            checkout_api: "https://www.eastbay.com/api/checkout".into(),
        }
    }

    pub fn finish_line() -> Self {
        Self {
            domain: "finishline.com".into(),
            api_base: "https://www.finishline.com/api".into(),
            cart_api: "https://www.finishline.com/api/cart".into(),
            checkout_api: "https://www.finishline.com/api/checkout".into(),
        }
    }
}
