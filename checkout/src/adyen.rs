//! Adyen Client-Side Encryption (CSE) v0_1_25: RSA-OAEP(SHA-1)-wraps a
//! fresh AES-256-CBC key/IV around a small JSON payload per card field,
//! using the RustCrypto family (`aes`, `cbc`, `rsa`, `sha1`, `base64`).

use aes::cipher::{BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use rand::rngs::OsRng;
use rsa::{BigUint, Oaep, RsaPublicKey};
use serde_json::{Map, Value};
use sha1::Sha1;
use thiserror::Error;

const PREFIX: &str = "adyenjs_0_1_25$";

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

#[derive(Debug, Error)]
pub enum AdyenError {
    #[error("invalid adyen public key format, expected 'exponent_hex|modulus_hex'")]
    InvalidKeyFormat,

    #[error("hex decode error: {0}")]
    HexDecode(String),

    #[error("rsa encryption failed: {0}")]
    RsaEncrypt(rsa::Error),
}

pub struct AdyenEncryptor {
    public_key: RsaPublicKey,
}

impl AdyenEncryptor {
    /// Parses `"<exponent_hex>|<modulus_hex>"` as scraped from the
    /// checkout page's `adyenKey`/`publicKey` JS assignment.
    pub fn new(public_key_hex: &str) -> Result<Self, AdyenError> {
        let (exponent_hex, modulus_hex) =
            public_key_hex.split_once('|').ok_or(AdyenError::InvalidKeyFormat)?;

        let exponent = hex_to_biguint(exponent_hex)?;
        let modulus = hex_to_biguint(modulus_hex)?;
        let public_key = RsaPublicKey::new(modulus, exponent).map_err(AdyenError::RsaEncrypt)?;

        Ok(Self { public_key })
    }

    pub fn encrypt_card(
        &self,
        number: &str,
        expiry_month: &str,
        expiry_year_full: &str,
        cvv: &str,
        holder_name: Option<&str>,
    ) -> Result<String, AdyenError> {
        let mut data = Map::new();
        let cleaned_number: String = number.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
        data.insert("number".to_string(), Value::String(cleaned_number));
        data.insert("cvc".to_string(), Value::String(cvv.to_string()));
        data.insert("expiryMonth".to_string(), Value::String(format!("{:0>2}", expiry_month)));
        data.insert("expiryYear".to_string(), Value::String(expiry_year_full.to_string()));
        data.insert("generationtime".to_string(), Value::String(generation_time()));
        if let Some(holder) = holder_name {
            if !holder.is_empty() {
                data.insert("holderName".to_string(), Value::String(holder.to_string()));
            }
        }
        self.encrypt_field(data)
    }

    pub fn encrypt_single_field(&self, field_name: &str, value: &str) -> Result<String, AdyenError> {
        let mut data = Map::new();
        data.insert(field_name.to_string(), Value::String(value.to_string()));
        data.insert("generationtime".to_string(), Value::String(generation_time()));
        self.encrypt_field(data)
    }

    fn encrypt_field(&self, data: Map<String, Value>) -> Result<String, AdyenError> {
        let plaintext = serde_json::to_vec(&Value::Object(data)).expect("map serializes");

        let mut aes_key = [0u8; 32];
        let mut iv = [0u8; 16];
        rand::RngCore::fill_bytes(&mut OsRng, &mut aes_key);
        rand::RngCore::fill_bytes(&mut OsRng, &mut iv);

        let ciphertext = Aes256CbcEnc::new(&aes_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(&plaintext);

        let padding = Oaep::new::<Sha1>();
        let encrypted_key = self
            .public_key
            .encrypt(&mut OsRng, padding, &aes_key)
            .map_err(AdyenError::RsaEncrypt)?;

        let b64_key = BASE64.encode(encrypted_key);
        let mut iv_and_ciphertext = iv.to_vec();
        iv_and_ciphertext.extend_from_slice(&ciphertext);
        let b64_payload = BASE64.encode(iv_and_ciphertext);

        Ok(format!("{PREFIX}{b64_key}${b64_payload}"))
    }
}

fn generation_time() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn hex_to_biguint(hex: &str) -> Result<BigUint, AdyenError> {
    let bytes = hex_decode(hex).map_err(AdyenError::HexDecode)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err(format!("odd-length hex string: {hex}"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use rsa::{RsaPrivateKey, pkcs1::EncodeRsaPublicKey};

    fn encode_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn sample_key_hex() -> (String, RsaPrivateKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
        let public = RsaPublicKey::from(&private);
        let exponent = public.e().to_bytes_be();
        let modulus = public.n().to_bytes_be();
        (format!("{}|{}", encode_hex(&exponent), encode_hex(&modulus)), private)
    }

    #[test]
    fn encrypted_payload_has_three_dollar_separated_parts_with_adyen_prefix() {
        let (key_hex, _private) = sample_key_hex();
        let encryptor = AdyenEncryptor::new(&key_hex).unwrap();
        let payload = encryptor
            .encrypt_card("4111111111111111", "03", "2030", "737", Some("Jane Doe"))
            .unwrap();

        let parts: Vec<&str> = payload.split('$').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "adyenjs_0_1_25");
    }

    #[test]
    fn rejects_malformed_key_format() {
        assert!(AdyenEncryptor::new("not-a-valid-key").is_err());
    }

    #[test]
    fn pkcs1_encode_is_reachable_for_key_round_trip_sanity() {
        let (_key_hex, private) = sample_key_hex();
        let public = RsaPublicKey::from(&private);
        assert!(public.to_pkcs1_der().is_ok());
    }
}
