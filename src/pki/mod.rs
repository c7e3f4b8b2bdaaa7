//! Certificate parsing and matching for route TLS validation
//!
//! This module decodes PEM-encoded leaf certificates into a structured
//! identity record and provides the two predicates the route aggregator
//! needs: does a host match the certificate's identity, and does a private
//! key pair with the certificate's public key.
//!
//! # Scope
//!
//! Only structural and identity consistency of a single leaf certificate
//! is checked. No chain building, no CA trust, no revocation. Both
//! fallible operations return typed errors so the caller can degrade a
//! single route's fields instead of failing the batch.

use aws_lc_rs::digest;
use rcgen::KeyPair;
use serde::Serialize;
use thiserror::Error;
use x509_parser::prelude::*;

/// Certificate validation errors
#[derive(Debug, Error)]
pub enum CertError {
    /// Certificate material could not be decoded
    #[error("certificate parsing error: {0}")]
    Parse(String),

    /// Private key material could not be decoded or uses an unsupported algorithm
    #[error("private key error: {0}")]
    Key(String),
}

/// Identity record extracted from a successfully parsed X.509 certificate
///
/// Only ever produced from a structurally valid certificate. A route whose
/// certificate fails to parse carries no `CertificateInfo` at all, never a
/// zeroed one.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject distinguished name as rendered by the X.509 decoder
    pub subject: String,
    /// Issuer distinguished name as rendered by the X.509 decoder
    pub issuer: String,
    /// Start of the validity period, in the certificate's native representation
    pub valid_from: String,
    /// End of the validity period, in the certificate's native representation
    pub valid_to: String,
    /// Serial number as colon-separated hex
    pub serial_number: String,
    /// SHA-1 fingerprint of the DER encoding, colon-separated uppercase hex
    pub fingerprint: String,
    /// SAN entries with type prefixes (`DNS:`, `IP:`, ...), in declaration
    /// order; `None` when the certificate carries no SAN extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_alt_names: Option<Vec<String>>,
}

/// Parse PEM-encoded data and return the DER bytes
fn parse_pem(pem_data: &str) -> Result<Vec<u8>, CertError> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| CertError::Parse(format!("failed to parse PEM: {}", e)))?;
    Ok(pem_obj.contents().to_vec())
}

/// Parse a PEM-encoded leaf certificate into a [`CertificateInfo`]
///
/// Decodes exactly one certificate; any trailing chain material in the PEM
/// blob is ignored. Fails with [`CertError::Parse`] on malformed base64 or
/// ASN.1, carrying the underlying decode diagnostic.
pub fn parse_certificate(certificate_pem: &str) -> Result<CertificateInfo, CertError> {
    let der = parse_pem(certificate_pem)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| CertError::Parse(format!("failed to parse certificate: {}", e)))?;

    let subject_alt_names = cert
        .subject_alternative_name()
        .map_err(|e| CertError::Parse(format!("invalid SAN extension: {}", e)))?
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .filter_map(format_general_name)
                .collect()
        });

    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        valid_from: cert.validity().not_before.to_string(),
        valid_to: cert.validity().not_after.to_string(),
        serial_number: cert.raw_serial_as_string(),
        fingerprint: sha1_fingerprint(&der),
        subject_alt_names,
    })
}

/// Render a SAN general name with its type prefix, skipping name forms the
/// matcher has no use for (directory names, registered OIDs, ...)
fn format_general_name(name: &GeneralName) -> Option<String> {
    match name {
        GeneralName::DNSName(dns) => Some(format!("DNS:{}", dns)),
        GeneralName::RFC822Name(email) => Some(format!("EMAIL:{}", email)),
        GeneralName::URI(uri) => Some(format!("URI:{}", uri)),
        GeneralName::IPAddress(bytes) => Some(format!("IP:{}", format_ip(bytes))),
        _ => None,
    }
}

fn format_ip(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        std::net::Ipv4Addr::from(octets).to_string()
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        std::net::Ipv6Addr::from(octets).to_string()
    } else {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn sha1_fingerprint(der: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, der);
    hash.as_ref()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Check whether `host` matches the certificate's subject CN or any SAN entry
///
/// The CN check is a literal substring match for `CN=<host>` on the rendered
/// subject string, not a parsed-DN field comparison. Consumers depend on
/// that exact behavior, quirks included, so it must not be tightened here.
///
/// SAN entries are compared after stripping a leading `TYPE:` prefix (one or
/// more uppercase ASCII letters followed by a colon). A `*.domain` wildcard
/// matches exactly one additional left-most label: `*.example.com` matches
/// `api.example.com` but neither `a.b.example.com` nor `example.com`.
pub fn host_matches_certificate(host: &str, cert: &CertificateInfo) -> bool {
    let cn_match = cert.subject.contains(&format!("CN={}", host));

    let san_match = cert
        .subject_alt_names
        .as_ref()
        .map(|sans| {
            sans.iter().any(|san| {
                let clean = strip_san_type_prefix(san);
                if let Some(domain) = clean.strip_prefix("*.") {
                    host.ends_with(domain)
                        && host.split('.').count() == domain.split('.').count() + 1
                } else {
                    clean == host
                }
            })
        })
        .unwrap_or(false);

    cn_match || san_match
}

/// Strip a leading `TYPE:` prefix from a SAN entry, where TYPE is one or
/// more uppercase ASCII letters
fn strip_san_type_prefix(san: &str) -> &str {
    match san.split_once(':') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_uppercase()) => {
            rest
        }
        _ => san,
    }
}

/// Check whether a private key pairs with a certificate's public key
///
/// Both sides are canonicalized to the same SubjectPublicKeyInfo PEM
/// encoding before comparison: the certificate's embedded SPKI on one side,
/// the SPKI re-derived from the private key on the other. Raw key material
/// is never compared directly, so equivalent keys with different source
/// formatting still compare equal.
///
/// Fails with a typed error when either blob cannot be decoded or the key
/// algorithm is unsupported; callers must treat that as "match unknown",
/// not "no match".
pub fn private_key_matches_certificate(
    certificate_pem: &str,
    private_key_pem: &str,
) -> Result<bool, CertError> {
    let der = parse_pem(certificate_pem)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| CertError::Parse(format!("failed to parse certificate: {}", e)))?;

    let cert_public_pem = ::pem::encode(&::pem::Pem::new(
        "PUBLIC KEY",
        cert.public_key().raw.to_vec(),
    ));

    let key_pair = KeyPair::from_pem(private_key_pem)
        .map_err(|e| CertError::Key(format!("failed to parse private key: {}", e)))?;
    let key_public_pem = ::pem::encode(&::pem::Pem::new("PUBLIC KEY", key_pair.public_key_der()));

    Ok(cert_public_pem == key_public_pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{
        Ia5String, CertificateParams, DistinguishedName, DnType, DnValue, SanType,
    };

    /// Generate a self-signed certificate with the given CN and DNS SANs,
    /// returning (certificate PEM, private key PEM)
    fn generate_cert(cn: &str, sans: &[&str]) -> (String, String) {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
        params.distinguished_name = dn;

        params.subject_alt_names = sans
            .iter()
            .map(|san| SanType::DnsName(Ia5String::try_from(*san).unwrap()))
            .collect();

        let cert = params.self_signed(&key_pair).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    fn cert_info(subject: &str, sans: Option<&[&str]>) -> CertificateInfo {
        CertificateInfo {
            subject: subject.to_string(),
            issuer: "CN=test-issuer".to_string(),
            valid_from: "2024-01-01 0:00:00.0 +00:00:00".to_string(),
            valid_to: "2034-01-01 0:00:00.0 +00:00:00".to_string(),
            serial_number: "01".to_string(),
            fingerprint: "AA:BB".to_string(),
            subject_alt_names: sans.map(|s| s.iter().map(|v| v.to_string()).collect()),
        }
    }

    #[test]
    fn parse_round_trip_yields_identity_fields() {
        let (cert_pem, _) = generate_cert("app1.example.com", &["app1.example.com"]);

        let info = parse_certificate(&cert_pem).unwrap();

        assert!(info.subject.contains("CN=app1.example.com"));
        assert!(!info.issuer.is_empty());
        assert!(!info.serial_number.is_empty());
        assert!(!info.valid_from.is_empty());
        assert!(!info.valid_to.is_empty());
        // SHA-1 fingerprint: 20 bytes as colon-separated uppercase hex
        assert_eq!(info.fingerprint.len(), 59);
        assert!(info.fingerprint.chars().all(|c| c.is_ascii_hexdigit()
            && !c.is_ascii_lowercase()
            || c == ':'));
    }

    #[test]
    fn san_entries_carry_type_prefix_in_order() {
        let (cert_pem, _) = generate_cert("irrelevant", &["a.example.com", "b.example.com"]);

        let info = parse_certificate(&cert_pem).unwrap();

        assert_eq!(
            info.subject_alt_names,
            Some(vec![
                "DNS:a.example.com".to_string(),
                "DNS:b.example.com".to_string()
            ])
        );
    }

    #[test]
    fn certificate_without_san_extension_has_absent_field() {
        let (cert_pem, _) = generate_cert("no-san.example.com", &[]);

        let info = parse_certificate(&cert_pem).unwrap();

        assert!(info.subject_alt_names.is_none());
    }

    #[test]
    fn malformed_pem_is_a_typed_parse_error() {
        let result = parse_certificate("not a certificate at all");

        assert!(matches!(result, Err(CertError::Parse(_))));
    }

    #[test]
    fn valid_pem_with_garbage_der_is_a_typed_parse_error() {
        // Valid base64, not a certificate
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";

        let result = parse_certificate(pem);

        assert!(matches!(result, Err(CertError::Parse(_))));
    }

    #[test]
    fn wildcard_matches_exactly_one_extra_label() {
        let info = cert_info("CN=irrelevant", Some(&["DNS:*.example.com"]));

        assert!(host_matches_certificate("api.example.com", &info));
        assert!(!host_matches_certificate("a.b.example.com", &info));
        assert!(!host_matches_certificate("example.com", &info));
    }

    #[test]
    fn exact_san_entry_matches_after_prefix_strip() {
        let info = cert_info("CN=irrelevant", Some(&["DNS:app.example.com"]));

        assert!(host_matches_certificate("app.example.com", &info));
        assert!(!host_matches_certificate("other.example.com", &info));
    }

    #[test]
    fn san_entry_without_type_prefix_still_matches() {
        let info = cert_info("CN=irrelevant", Some(&["app.example.com"]));

        assert!(host_matches_certificate("app.example.com", &info));
    }

    #[test]
    fn lowercase_prefix_is_not_stripped() {
        // Only `UPPERCASE:` prefixes are type tags
        let info = cert_info("CN=irrelevant", Some(&["dns:app.example.com"]));

        assert!(!host_matches_certificate("app.example.com", &info));
        assert!(host_matches_certificate("dns:app.example.com", &info));
    }

    #[test]
    fn common_name_matches_without_san() {
        let info = cert_info("CN=app1.example.com", None);

        assert!(host_matches_certificate("app1.example.com", &info));
        assert!(!host_matches_certificate("app2.example.com", &info));
    }

    #[test]
    fn common_name_check_is_a_raw_substring_match() {
        // The CN comparison is a substring scan over the whole subject, so a
        // host appearing in another DN component also matches. Kept as-is
        // for compatibility with existing consumers.
        let info = cert_info("CN=real.example.com, OU=CN=other.example.com", None);

        assert!(host_matches_certificate("other.example.com", &info));
    }

    #[test]
    fn parsed_wildcard_certificate_matches_end_to_end() {
        let (cert_pem, _) = generate_cert("irrelevant", &["*.example.com"]);
        let info = parse_certificate(&cert_pem).unwrap();

        assert!(host_matches_certificate("api.example.com", &info));
        assert!(!host_matches_certificate("a.b.example.com", &info));
    }

    #[test]
    fn private_key_matches_its_own_certificate() {
        let (cert_pem, key_pem) = generate_cert("app.example.com", &[]);

        let result = private_key_matches_certificate(&cert_pem, &key_pem).unwrap();

        assert!(result);
    }

    #[test]
    fn unrelated_private_key_does_not_match() {
        let (cert_pem, _) = generate_cert("app.example.com", &[]);
        let other_key = KeyPair::generate().unwrap();

        let result =
            private_key_matches_certificate(&cert_pem, &other_key.serialize_pem()).unwrap();

        assert!(!result);
    }

    #[test]
    fn garbage_private_key_is_a_typed_key_error() {
        let (cert_pem, _) = generate_cert("app.example.com", &[]);

        let result = private_key_matches_certificate(&cert_pem, "not a key");

        assert!(matches!(result, Err(CertError::Key(_))));
    }

    #[test]
    fn garbage_certificate_is_a_typed_parse_error() {
        let (_, key_pem) = generate_cert("app.example.com", &[]);

        let result = private_key_matches_certificate("not a cert", &key_pem);

        assert!(matches!(result, Err(CertError::Parse(_))));
    }

    #[test]
    fn key_comparison_uses_derived_public_keys_not_raw_material() {
        // Re-serializing the key through a parse round trip must not change
        // the comparison outcome: only the derived SPKI matters.
        let (cert_pem, key_pem) = generate_cert("app.example.com", &[]);
        let reparsed = KeyPair::from_pem(&key_pem).unwrap().serialize_pem();

        let result = private_key_matches_certificate(&cert_pem, &reparsed).unwrap();

        assert!(result);
    }

    #[test]
    fn certificate_info_serializes_in_camel_case() {
        let info = cert_info("CN=app.example.com", Some(&["DNS:app.example.com"]));

        let json = serde_json::to_value(&info).unwrap();

        assert!(json.get("serialNumber").is_some());
        assert!(json.get("subjectAltNames").is_some());
        assert!(json.get("validFrom").is_some());
    }

    #[test]
    fn absent_san_field_is_omitted_from_json() {
        let info = cert_info("CN=app.example.com", None);

        let json = serde_json::to_value(&info).unwrap();

        assert!(json.get("subjectAltNames").is_none());
    }
}
