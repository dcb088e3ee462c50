//! KLAP transport for newer Kasa firmware.
//!
//! Devices that close the legacy port accept the same JSON commands over
//! HTTP, wrapped in an authenticated session:
//!
//! 1. `handshake1`: send a random 16-byte seed, receive the device's seed
//!    and a hash proving it holds the same credentials.
//! 2. `handshake2`: prove the same back. The device answers with a session
//!    cookie.
//! 3. `request?seq=N`: AES-128-CBC payloads signed with SHA-256, keyed from
//!    both seeds and the credential hash.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::time::Duration;

use super::DeviceError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const SEED_LEN: usize = 16;
const SIGNATURE_LEN: usize = 32;

/// Cloud account the devices were set up with.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `sha256(sha1(username) || sha1(password))`
    pub fn auth_hash(&self) -> [u8; 32] {
        sha256(&[
            Sha1::digest(self.username.as_bytes()).as_slice(),
            Sha1::digest(self.password.as_bytes()).as_slice(),
        ])
    }
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Proof exchanged in the handshake: `sha256(first || second || auth)`.
pub fn seed_proof(first: &[u8], second: &[u8], auth_hash: &[u8]) -> [u8; 32] {
    sha256(&[first, second, auth_hash])
}

/// Session keys derived from one handshake.
#[derive(Debug, Clone)]
pub struct KlapCipher {
    key: [u8; 16],
    iv_prefix: [u8; 12],
    signature_key: [u8; 28],
    seq: i32,
}

impl KlapCipher {
    pub fn new(local_seed: &[u8], remote_seed: &[u8], auth_hash: &[u8]) -> Self {
        let key_hash = sha256(&[b"lsk", local_seed, remote_seed, auth_hash]);
        let iv_hash = sha256(&[b"iv", local_seed, remote_seed, auth_hash]);
        let signature_hash = sha256(&[b"ldk", local_seed, remote_seed, auth_hash]);

        let mut key = [0u8; 16];
        key.copy_from_slice(&key_hash[..16]);
        let mut iv_prefix = [0u8; 12];
        iv_prefix.copy_from_slice(&iv_hash[..12]);
        let mut signature_key = [0u8; 28];
        signature_key.copy_from_slice(&signature_hash[..28]);
        let seq = i32::from_be_bytes([iv_hash[28], iv_hash[29], iv_hash[30], iv_hash[31]]);

        Self {
            key,
            iv_prefix,
            signature_key,
            seq,
        }
    }

    fn iv(&self, seq: i32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&self.iv_prefix);
        iv[12..].copy_from_slice(&seq.to_be_bytes());
        iv
    }

    /// Signature followed by ciphertext, for message number `seq`.
    pub(super) fn seal(&self, seq: i32, plain: &[u8]) -> Vec<u8> {
        let cipher =
            Aes128CbcEnc::new(&self.key.into(), &self.iv(seq).into()).encrypt_padded_vec_mut::<Pkcs7>(plain);
        let signature = sha256(&[&self.signature_key, &seq.to_be_bytes(), &cipher]);

        let mut body = Vec::with_capacity(SIGNATURE_LEN + cipher.len());
        body.extend_from_slice(&signature);
        body.extend_from_slice(&cipher);
        body
    }

    /// Seal the next request. Returns its sequence number and body.
    pub fn encrypt(&mut self, plain: &[u8]) -> (i32, Vec<u8>) {
        self.seq = self.seq.wrapping_add(1);
        (self.seq, self.seal(self.seq, plain))
    }

    /// Open a body sealed for message number `seq`.
    pub fn decrypt(&self, seq: i32, body: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let cipher = body
            .get(SIGNATURE_LEN..)
            .ok_or_else(|| DeviceError::Protocol("KLAP response too short".to_string()))?;
        Aes128CbcDec::new(&self.key.into(), &self.iv(seq).into())
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| DeviceError::Protocol("KLAP response failed to decrypt".to_string()))
    }
}

/// An authenticated session with one device.
#[derive(Debug, Clone)]
pub struct KlapClient {
    http: Client,
    base_url: String,
    cookie: Option<String>,
    cipher: KlapCipher,
    timeout: Duration,
}

impl KlapClient {
    /// Run the two-step handshake against `address`.
    ///
    /// A device that answers the first step but cannot be authenticated
    /// yields [`DeviceError::AuthenticationRequired`] (no credentials) or
    /// [`DeviceError::AuthenticationFailed`] (wrong ones).
    pub fn connect(
        address: SocketAddr,
        credentials: Option<&Credentials>,
        timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let http = Client::builder()
            .no_proxy()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| http_error(e, timeout))?;
        let base_url = format!("http://{address}/app");
        let local_seed: [u8; SEED_LEN] = rand::random();

        let response = http
            .post(format!("{base_url}/handshake1"))
            .body(local_seed.to_vec())
            .send()
            .map_err(|e| http_error(e, timeout))?;
        if !response.status().is_success() {
            return Err(DeviceError::Protocol(format!(
                "handshake1 returned {}",
                response.status()
            )));
        }
        let cookie = session_cookie(&response);
        let reply = response.bytes().map_err(|e| http_error(e, timeout))?;
        if reply.len() != SEED_LEN + 32 {
            return Err(DeviceError::Protocol(format!(
                "handshake1 reply of {} bytes",
                reply.len()
            )));
        }
        let (remote_seed, server_proof) = reply.split_at(SEED_LEN);

        let credentials = credentials.ok_or(DeviceError::AuthenticationRequired)?;
        let auth_hash = credentials.auth_hash();
        if server_proof != seed_proof(&local_seed, remote_seed, &auth_hash).as_slice() {
            return Err(DeviceError::AuthenticationFailed);
        }

        let confirm = http
            .post(format!("{base_url}/handshake2"))
            .body(seed_proof(remote_seed, &local_seed, &auth_hash).to_vec());
        let response = with_cookie(confirm, cookie.as_deref())
            .send()
            .map_err(|e| http_error(e, timeout))?;
        if !response.status().is_success() {
            return Err(DeviceError::AuthenticationFailed);
        }

        Ok(Self {
            http,
            base_url,
            cookie,
            cipher: KlapCipher::new(&local_seed, remote_seed, &auth_hash),
            timeout,
        })
    }

    pub fn request(&mut self, request: &Value) -> Result<Value, DeviceError> {
        let (seq, body) = self.cipher.encrypt(request.to_string().as_bytes());
        let call = self
            .http
            .post(format!("{}/request?seq={seq}", self.base_url))
            .body(body);

        let response = with_cookie(call, self.cookie.as_deref())
            .send()
            .map_err(|e| http_error(e, self.timeout))?;
        if !response.status().is_success() {
            return Err(DeviceError::Protocol(format!(
                "request returned {}",
                response.status()
            )));
        }
        let reply = response.bytes().map_err(|e| http_error(e, self.timeout))?;

        let plain = self.cipher.decrypt(seq, &reply)?;
        serde_json::from_slice(&plain).map_err(|e| DeviceError::Protocol(format!("invalid JSON: {e}")))
    }
}

/// `TP_SESSIONID=...` from `Set-Cookie`, without attributes.
fn session_cookie(response: &Response) -> Option<String> {
    let header = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    header
        .split(';')
        .next()
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(str::to_string)
}

fn with_cookie(request: RequestBuilder, cookie: Option<&str>) -> RequestBuilder {
    match cookie {
        Some(cookie) => request.header(COOKIE, cookie),
        None => request,
    }
}

fn http_error(error: reqwest::Error, timeout: Duration) -> DeviceError {
    if error.is_timeout() {
        DeviceError::Timeout(timeout)
    } else {
        DeviceError::Http(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    fn seeds() -> ([u8; 16], [u8; 16]) {
        let mut local = [0u8; 16];
        let mut remote = [0u8; 16];
        for i in 0..16 {
            local[i] = i as u8;
            remote[i] = 16 + i as u8;
        }
        (local, remote)
    }

    #[test]
    fn test_auth_hash_matches_known_value() {
        let credentials = Credentials::new("user@example.com", "hunter2");
        assert_eq!(
            hex(&credentials.auth_hash()),
            "b49b2da16ee8155335c944a908c08fb4d18ea952ca0f73b60c8f77d08642e781"
        );
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn test_first_request_is_sealed_like_the_device_expects() {
        let (local, remote) = seeds();
        let auth = Credentials::new("user@example.com", "hunter2").auth_hash();
        let mut cipher = KlapCipher::new(&local, &remote, &auth);

        let (seq, body) = cipher.encrypt(br#"{"system":{"get_sysinfo":{}}}"#);

        assert_eq!(seq, -1214602356);
        assert_eq!(
            hex(&body[..32]),
            "7487857b7cf47ecce6e3c7dc37d2791565a902be4fa4bf1015000bf03a171c36"
        );
        assert_eq!(
            hex(&body[32..]),
            "f3e3c66c6c30f7cc8710a4412b365d0a0124d27a43921f6a87adb999522337bb"
        );
        assert_eq!(
            cipher.decrypt(seq, &body).unwrap(),
            br#"{"system":{"get_sysinfo":{}}}"#.to_vec()
        );

        // Each request advances the sequence
        let (next, _) = cipher.encrypt(b"{}");
        assert_eq!(next, seq + 1);
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let (local, remote) = seeds();
        let cipher = KlapCipher::new(&local, &remote, &[0u8; 32]);
        assert!(matches!(cipher.decrypt(1, &[0u8; 10]), Err(DeviceError::Protocol(_))));
        // Ciphertext that is not a whole number of blocks
        assert!(matches!(cipher.decrypt(1, &[7u8; 50]), Err(DeviceError::Protocol(_))));
    }
}
