//! Request fingerprints.
//!
//! A fingerprint identifies "the same translation" across calls: two requests
//! with equal kind, language pair, context and content always hash to the
//! same value, on any device.

use medsync_types::{Fingerprint, TranslationRequest};
use sha2::{Digest, Sha256};

const DOMAIN_TAG: &[u8] = b"medsync-fingerprint-v1";

/// Compute the fingerprint of a translation request.
///
/// SHA-256 over a domain tag followed by each field as a big-endian `u64`
/// length and its bytes. Language codes are compared case-insensitively.
pub fn fingerprint(request: &TranslationRequest) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);

    let source = request.source_language.to_ascii_lowercase();
    let target = request.target_language.to_ascii_lowercase();
    let fields: [&[u8]; 5] = [
        request.kind().as_str().as_bytes(),
        source.as_bytes(),
        target.as_bytes(),
        request.context.as_bytes(),
        request.content().as_bytes(),
    ];
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }

    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Fingerprint::from_digest(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_requests_share_fingerprint() {
        let a = TranslationRequest::text("Take two tablets daily", "en", "es");
        let b = TranslationRequest::text("Take two tablets daily", "en", "es");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn language_case_is_ignored() {
        let a = TranslationRequest::text("hello", "EN", "es");
        let b = TranslationRequest::text("hello", "en", "ES");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn every_field_contributes() {
        let base = TranslationRequest::text("hello", "en", "es");
        let variants = [
            TranslationRequest::text("hello!", "en", "es"),
            TranslationRequest::text("hello", "fr", "es"),
            TranslationRequest::text("hello", "en", "fr"),
            TranslationRequest::text("hello", "en", "es").with_context("cardiology"),
            TranslationRequest::audio("hello", "en", "es"),
        ];
        for variant in &variants {
            assert_ne!(fingerprint(&base), fingerprint(variant), "{:?}", variant);
        }
    }

    #[test]
    fn length_prefix_prevents_boundary_shift() {
        // Same concatenated bytes, different field split.
        let a = TranslationRequest::text("b", "en", "esa").with_context("c");
        let b = TranslationRequest::text("b", "en", "es").with_context("ac");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
