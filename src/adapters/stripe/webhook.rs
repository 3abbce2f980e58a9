use crate::ports::{SignatureError, WebhookVerifier};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Stripe署名（`Stripe-Signature: t=<unix>,v1=<hex>`）の検証
///
/// 期待値は HMAC-SHA256(secret, "<t>.<raw body>")。
/// 比較は定数時間で行い、タイムスタンプが許容幅を外れていれば拒否する。
pub struct StripeWebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    pub fn new(secret: String, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// 現在時刻を指定して検証する
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader);
        }

        if (now - issued_at).abs() > self.tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        for signature in signatures {
            let Ok(provided) = hex::decode(signature) else {
                continue;
            };
            let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                .map_err(|_| SignatureError::Mismatch)?;
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(payload);
            if mac.verify_slice(&provided).is_ok() {
                return Ok(());
            }
        }

        Err(SignatureError::Mismatch)
    }
}

impl WebhookVerifier for StripeWebhookVerifier {
    fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }
}

/// Stripeと同じ形式の署名ヘッダーを作る
///
/// ローカルでのWebhook再生やテストに使う。
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMACは任意長の鍵を受け付ける
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
