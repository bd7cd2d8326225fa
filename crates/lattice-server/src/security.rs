//! The session security layer: proof-of-possession signatures, identity
//! token decryption and certificate checks.

use async_trait::async_trait;
use lattice_ua::service::SignatureData;
use lattice_ua::{
    ByteString, EncryptionScheme, NodeId, SecurityPolicy, SignatureScheme, StatusCode,
    UserIdentity,
};
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// Errors of the security layer, each mapping onto the status code the
/// service reports.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// A signature could not be produced or did not verify.
    #[error("signature error: {0}")]
    Signature(String),
    /// An identity token was malformed.
    #[error("identity token invalid: {0}")]
    TokenInvalid(String),
    /// An identity token was well-formed but rejected.
    #[error("identity token rejected: {0}")]
    TokenRejected(String),
    /// A certificate could not be parsed or did not match.
    #[error("certificate error: {0}")]
    Certificate(String),
}

/// Fills `buf.len()` bytes of cryptographic randomness.
pub fn next_nonce(length: usize) -> Vec<u8> {
    let mut buf = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

// =============================================================================
// Signatures
// =============================================================================

fn hash_sha1(data: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    for part in data {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

fn hash_sha256(data: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for part in data {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Signs `certificate || nonce` with the server key under the policy's
/// signature scheme: SHA-1 PKCS#1 v1.5 for the legacy policies, SHA-256
/// PKCS#1 v1.5 for the Sha256 policies, SHA-256 PSS for RsaPss.
pub fn create_signature(
    policy: SecurityPolicy,
    key: &RsaPrivateKey,
    certificate: &[u8],
    nonce: &[u8],
) -> Result<SignatureData, SecurityError> {
    let signature = match policy.signature_scheme() {
        SignatureScheme::None => return Ok(SignatureData::default()),
        SignatureScheme::Pkcs1Sha1 => {
            let hashed = hash_sha1(&[certificate, nonce]);
            key.sign(Pkcs1v15Sign::new::<Sha1>(), &hashed)
                .map_err(|e| SecurityError::Signature(e.to_string()))?
        }
        SignatureScheme::Pkcs1Sha256 => {
            let hashed = hash_sha256(&[certificate, nonce]);
            key.sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
                .map_err(|e| SecurityError::Signature(e.to_string()))?
        }
        SignatureScheme::PssSha256 => {
            let hashed = hash_sha256(&[certificate, nonce]);
            key.sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &hashed)
                .map_err(|e| SecurityError::Signature(e.to_string()))?
        }
    };
    Ok(SignatureData {
        signature: ByteString::from(signature),
        algorithm: policy.signature_algorithm().to_string(),
    })
}

/// Verifies a client signature over `certificate || nonce` under the
/// policy's signature scheme.
pub fn verify_signature(
    policy: SecurityPolicy,
    key: &RsaPublicKey,
    certificate: &[u8],
    nonce: &[u8],
    signature: &[u8],
) -> Result<(), SecurityError> {
    match policy.signature_scheme() {
        SignatureScheme::None => Ok(()),
        SignatureScheme::Pkcs1Sha1 => {
            let hashed = hash_sha1(&[certificate, nonce]);
            key.verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, signature)
                .map_err(|e| SecurityError::Signature(e.to_string()))
        }
        SignatureScheme::Pkcs1Sha256 => {
            let hashed = hash_sha256(&[certificate, nonce]);
            key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
                .map_err(|e| SecurityError::Signature(e.to_string()))
        }
        SignatureScheme::PssSha256 => {
            let hashed = hash_sha256(&[certificate, nonce]);
            key.verify(Pss::new::<Sha256>(), &hashed, signature)
                .map_err(|e| SecurityError::Signature(e.to_string()))
        }
    }
}

// =============================================================================
// Password decryption
// =============================================================================

/// Decrypts a user-name token's password blob.
///
/// The blob is a sequence of RSA blocks of the key's size. The decrypted
/// plaintext starts with a 4-byte little-endian length covering the
/// password plus the 32-byte server nonce appended by the client; lengths
/// outside `[32, 96]` are rejected.
pub fn decrypt_password(
    policy: SecurityPolicy,
    key: &RsaPrivateKey,
    declared_algorithm: &str,
    cipher: &[u8],
) -> Result<Vec<u8>, SecurityError> {
    let scheme = policy.encryption_scheme();
    if scheme == EncryptionScheme::None {
        // None policy: the password travels in the clear inside the channel.
        return Ok(cipher.to_vec());
    }
    if declared_algorithm != policy.encryption_algorithm() {
        return Err(SecurityError::TokenInvalid(format!(
            "encryption algorithm '{}' does not match the policy",
            declared_algorithm
        )));
    }

    let block_size = key.size();
    if cipher.is_empty() || cipher.len() % block_size != 0 {
        return Err(SecurityError::TokenInvalid(
            "cipher length is not a multiple of the key size".to_string(),
        ));
    }

    let mut plain = Vec::with_capacity(cipher.len());
    for block in cipher.chunks(block_size) {
        let part = match scheme {
            EncryptionScheme::Pkcs1 => key.decrypt(Pkcs1v15Encrypt, block),
            EncryptionScheme::OaepSha1 => key.decrypt(Oaep::new::<Sha1>(), block),
            EncryptionScheme::OaepSha256 => key.decrypt(Oaep::new::<Sha256>(), block),
            EncryptionScheme::None => unreachable!(),
        }
        .map_err(|e| SecurityError::TokenRejected(e.to_string()))?;
        plain.extend_from_slice(&part);
    }

    if plain.len() < 4 {
        return Err(SecurityError::TokenRejected("plaintext too short".to_string()));
    }
    let declared = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]) as usize;
    if !(32..=96).contains(&declared) {
        return Err(SecurityError::TokenRejected(format!(
            "declared token length {} out of range",
            declared
        )));
    }
    if plain.len() < 4 + declared {
        return Err(SecurityError::TokenRejected("plaintext shorter than declared".to_string()));
    }
    // strip the 32-byte server nonce appended after the password
    Ok(plain[4..4 + declared - 32].to_vec())
}

// =============================================================================
// Certificate checks
// =============================================================================

/// Verifies that the host of `endpoint_url` appears among the
/// certificate's DNS or IP subject alternative names.
pub fn verify_certificate_hostname(
    certificate_der: &[u8],
    endpoint_url: &str,
) -> Result<(), SecurityError> {
    let (_, cert) = X509Certificate::from_der(certificate_der)
        .map_err(|e| SecurityError::Certificate(e.to_string()))?;
    let host = host_of(endpoint_url)
        .ok_or_else(|| SecurityError::Certificate("endpoint url has no host".to_string()))?;

    for san in san_entries(&cert) {
        match san {
            GeneralName::DNSName(name) if name.eq_ignore_ascii_case(&host) => return Ok(()),
            GeneralName::IPAddress(ip) if ip_matches(ip, &host) => return Ok(()),
            _ => {}
        }
    }
    Err(SecurityError::Certificate(format!(
        "host '{}' not present in certificate subject alternative names",
        host
    )))
}

/// Verifies that `application_uri` appears among the certificate's URI
/// subject alternative names.
pub fn verify_certificate_application_uri(
    certificate_der: &[u8],
    application_uri: &str,
) -> Result<(), SecurityError> {
    if application_uri.is_empty() {
        return Err(SecurityError::Certificate("empty application uri".to_string()));
    }
    let (_, cert) = X509Certificate::from_der(certificate_der)
        .map_err(|e| SecurityError::Certificate(e.to_string()))?;
    for san in san_entries(&cert) {
        if let GeneralName::URI(uri) = san {
            if *uri == application_uri {
                return Ok(());
            }
        }
    }
    Err(SecurityError::Certificate(format!(
        "application uri '{}' not present in certificate",
        application_uri
    )))
}

/// Extracts the RSA public key of a DER certificate.
pub fn certificate_public_key(certificate_der: &[u8]) -> Result<RsaPublicKey, SecurityError> {
    use rsa::pkcs8::DecodePublicKey;
    let (_, cert) = X509Certificate::from_der(certificate_der)
        .map_err(|e| SecurityError::Certificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| SecurityError::Certificate(e.to_string()))
}

fn san_entries<'a>(cert: &'a X509Certificate<'a>) -> Vec<&'a GeneralName<'a>> {
    cert.subject_alternative_name()
        .ok()
        .flatten()
        .map(|ext| ext.value.general_names.iter().collect())
        .unwrap_or_default()
}

fn host_of(url: &str) -> Option<String> {
    // opc.tcp://host:port/path
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = after_scheme.split(['/', '?']).next()?;
    let host = authority.rsplit_once(':').map(|(h, _)| h).unwrap_or(authority);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn ip_matches(ip: &[u8], host: &str) -> bool {
    match ip.len() {
        4 => {
            let parsed: Result<Vec<u8>, _> = host.split('.').map(str::parse).collect();
            matches!(parsed, Ok(octets) if octets == ip)
        }
        _ => false,
    }
}

// =============================================================================
// Authenticators and roles
// =============================================================================

/// Authenticates user-name identities against an external backend.
#[async_trait]
pub trait UserNameAuthenticator: Send + Sync {
    /// Returns Good to accept the identity.
    async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
        application_uri: &str,
        endpoint_url: &str,
    ) -> StatusCode;
}

/// Authenticates X.509 identities against an external trust store.
#[async_trait]
pub trait X509Authenticator: Send + Sync {
    /// Returns Good to accept the identity.
    async fn authenticate(
        &self,
        certificate_der: &[u8],
        application_uri: &str,
        endpoint_url: &str,
    ) -> StatusCode;
}

/// Authenticates issued-token identities against an external issuer.
#[async_trait]
pub trait IssuedTokenAuthenticator: Send + Sync {
    /// Returns Good to accept the identity.
    async fn authenticate(
        &self,
        token_data: &[u8],
        application_uri: &str,
        endpoint_url: &str,
    ) -> StatusCode;
}

/// Maps a validated identity to its role node ids.
#[async_trait]
pub trait RolesProvider: Send + Sync {
    /// The roles granted to `identity`.
    async fn get_roles(
        &self,
        identity: &UserIdentity,
        application_uri: &str,
        endpoint_url: &str,
    ) -> Result<Vec<NodeId>, StatusCode>;
}

/// Grants Anonymous to anonymous identities and AuthenticatedUser plus
/// Operator to everyone else.
pub struct DefaultRolesProvider;

#[async_trait]
impl RolesProvider for DefaultRolesProvider {
    async fn get_roles(
        &self,
        identity: &UserIdentity,
        _application_uri: &str,
        _endpoint_url: &str,
    ) -> Result<Vec<NodeId>, StatusCode> {
        use lattice_ua::ids::role_id;
        Ok(match identity {
            UserIdentity::Anonymous => vec![role_id::ANONYMOUS],
            _ => vec![role_id::AUTHENTICATED_USER, role_id::OPERATOR],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate test key")
    }

    #[test]
    fn nonce_lengths() {
        assert_eq!(next_nonce(32).len(), 32);
        assert_ne!(next_nonce(32), next_nonce(32));
    }

    #[test]
    fn signature_round_trip_per_policy() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        let cert = b"certificate-bytes";
        let nonce = b"nonce-bytes";

        for policy in [
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            let sig = create_signature(policy, &key, cert, nonce).unwrap();
            assert_eq!(sig.algorithm, policy.signature_algorithm());
            verify_signature(policy, &public, cert, nonce, sig.signature.as_bytes())
                .unwrap_or_else(|e| panic!("{:?}: {}", policy, e));
            // tampering breaks it
            assert!(verify_signature(
                policy,
                &public,
                b"other-certificate",
                nonce,
                sig.signature.as_bytes()
            )
            .is_err());
        }
    }

    #[test]
    fn password_decryption_strips_nonce() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        let password = b"correct horse battery";
        let server_nonce = next_nonce(32);

        let mut plain = Vec::new();
        plain.extend_from_slice(&((password.len() + 32) as u32).to_le_bytes());
        plain.extend_from_slice(password);
        plain.extend_from_slice(&server_nonce);

        for policy in [
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            let cipher = match policy.encryption_scheme() {
                EncryptionScheme::Pkcs1 => {
                    public.encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, &plain)
                }
                EncryptionScheme::OaepSha1 => {
                    public.encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &plain)
                }
                EncryptionScheme::OaepSha256 => {
                    public.encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &plain)
                }
                EncryptionScheme::None => unreachable!(),
            }
            .unwrap();

            let decrypted =
                decrypt_password(policy, &key, policy.encryption_algorithm(), &cipher).unwrap();
            assert_eq!(decrypted, password, "policy {:?}", policy);
        }
    }

    #[test]
    fn password_length_bounds_rejected() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        // declared length below 32 (no nonce appended)
        let mut plain = Vec::new();
        plain.extend_from_slice(&8u32.to_le_bytes());
        plain.extend_from_slice(b"tooshort");
        let cipher = public
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &plain)
            .unwrap();
        let policy = SecurityPolicy::Basic256Sha256;
        assert!(matches!(
            decrypt_password(policy, &key, policy.encryption_algorithm(), &cipher),
            Err(SecurityError::TokenRejected(_))
        ));
    }

    #[test]
    fn wrong_declared_algorithm_rejected() {
        let key = test_key();
        let policy = SecurityPolicy::Basic256Sha256;
        assert!(matches!(
            decrypt_password(policy, &key, "http://unexpected", &[0u8; 256]),
            Err(SecurityError::TokenInvalid(_))
        ));
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("opc.tcp://plant-01:4840"), Some("plant-01".to_string()));
        assert_eq!(host_of("opc.tcp://10.0.0.2:4840/ua"), Some("10.0.0.2".to_string()));
        assert_eq!(host_of("opc.tcp://plant-01"), Some("plant-01".to_string()));
        assert_eq!(host_of("opc.tcp://"), None);
    }
}
