pub const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const QR_SIZE: &str = "250x250";

/// Builds the customer payment link and the QR image request that encodes it.
#[derive(Debug, Clone)]
pub struct CheckoutLinks {
    origin: String,
}

impl CheckoutLinks {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin: String = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// `<origin>/pay/<intentId>`, consumed verbatim by the payment page route.
    pub fn checkout_url(&self, intent_id: &str) -> String {
        format!("{}/pay/{}", self.origin, intent_id)
    }

    pub fn qr_image_url(&self, checkout_url: &str) -> String {
        format!(
            "{QR_SERVICE_URL}?size={QR_SIZE}&data={}",
            urlencoding::encode(checkout_url)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_url_is_origin_pay_id() {
        let links = CheckoutLinks::new("https://pos.example.com/");
        assert_eq!(
            links.checkout_url("pi_3Qabc"),
            "https://pos.example.com/pay/pi_3Qabc"
        );
    }

    #[test]
    fn qr_request_percent_encodes_the_link() {
        let links = CheckoutLinks::new("http://localhost:3000");
        let url = links.qr_image_url(&links.checkout_url("pi_1"));
        assert_eq!(
            url,
            "https://api.qrserver.com/v1/create-qr-code/?size=250x250&data=http%3A%2F%2Flocalhost%3A3000%2Fpay%2Fpi_1"
        );
    }
}
