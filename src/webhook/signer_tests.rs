//! Tests for request signers.

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::{
    ConfigurationError, DefaultSigner, PayloadSigner, SIGNATURE_HEADER, Signer, signer_by_name,
};

const HOOK_URL: &str = "https://example.com/hook";

fn reference_hmac(message: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

mod default_signer {
    use super::*;

    #[test]
    fn header_name_is_signature() {
        assert_eq!(DefaultSigner.signature_header_name(), SIGNATURE_HEADER);
        assert_eq!(SIGNATURE_HEADER, "Signature");
    }

    #[test]
    fn identical_inputs_give_identical_signatures() {
        let payload = json!({ "event": "ping", "nested": { "a": [1, 2, 3] } });

        let first = DefaultSigner.calculate_signature(HOOK_URL, &payload, "secret");
        let second = DefaultSigner.calculate_signature(HOOK_URL, &payload, "secret");

        assert_eq!(first, second);
    }

    #[test]
    fn signs_url_and_compact_payload() {
        let payload = json!({ "a": 1 });
        let expected = reference_hmac(b"https://example.com/hook\n{\"a\":1}", "secret");

        let signature = DefaultSigner.calculate_signature(HOOK_URL, &payload, "secret");

        assert_eq!(signature, expected);
    }

    #[test]
    fn signature_is_lowercase_hex_sha256() {
        let signature = DefaultSigner.calculate_signature("https://example.com", &json!({}), "k");

        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn url_change_changes_signature() {
        let payload = json!({ "a": 1 });

        let one = DefaultSigner.calculate_signature("https://example.com/a", &payload, "secret");
        let two = DefaultSigner.calculate_signature("https://example.com/b", &payload, "secret");

        assert_ne!(one, two);
    }

    #[test]
    fn payload_change_changes_signature() {
        let one = DefaultSigner.calculate_signature("https://example.com", &json!({ "a": 1 }), "s");
        let two = DefaultSigner.calculate_signature("https://example.com", &json!({ "a": 2 }), "s");

        assert_ne!(one, two);
    }

    #[test]
    fn secret_change_changes_signature() {
        let payload = json!({ "a": 1 });

        let one = DefaultSigner.calculate_signature("https://example.com", &payload, "s1");
        let two = DefaultSigner.calculate_signature("https://example.com", &payload, "s2");

        assert_ne!(one, two);
    }
}

mod payload_signer {
    use super::*;

    #[test]
    fn ignores_url() {
        let payload = json!({ "a": 1 });

        let one = PayloadSigner.calculate_signature("https://example.com/a", &payload, "secret");
        let two = PayloadSigner.calculate_signature("https://example.com/b", &payload, "secret");

        assert_eq!(one, two);
    }

    #[test]
    fn signs_compact_payload_only() {
        let expected = reference_hmac(b"{\"a\":1}", "secret");

        let signature =
            PayloadSigner.calculate_signature("https://example.com", &json!({ "a": 1 }), "secret");

        assert_eq!(signature, expected);
    }
}

mod lookup_by_name {
    use super::*;

    #[test]
    fn default_names_resolve() {
        for name in ["default", "hmac-sha256", "DEFAULT"] {
            let signer = signer_by_name(name).unwrap();
            assert_eq!(signer.signature_header_name(), SIGNATURE_HEADER, "name: {name}");
        }
    }

    #[test]
    fn payload_name_resolves_to_payload_signer() {
        let signer = signer_by_name("payload").unwrap();
        let payload = json!({ "a": 1 });

        assert_eq!(
            signer.calculate_signature("https://x.test", &payload, "k"),
            PayloadSigner.calculate_signature("https://x.test", &payload, "k")
        );
    }

    #[test]
    fn unknown_name_is_configuration_error() {
        let err = signer_by_name("md5").unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidSigner("md5".to_string()));
    }
}

#[test]
fn signers_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultSigner>();
    assert_send_sync::<PayloadSigner>();
}
