//! TP-Link Kasa smart plugs and switches on the local network.
//!
//! ## Wire format
//!
//! Each request is a JSON document, obfuscated with an XOR autokey cipher
//! (initial key 171) and prefixed with its length as a 4-byte big-endian
//! integer. The response uses the same framing. Every connection carries
//! exactly one request.
//!
//! Newer firmware closes the legacy port and takes the same JSON over the
//! authenticated [`super::klap`] transport instead. Discovery tries the
//! legacy port first and falls back when the device refuses the connection.

use serde_json::{Value, json};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::klap::{Credentials, KlapClient};
use super::{DeviceError, DeviceGateway, DeviceHandle, DiscoveryError};
use crate::common::constants::{KASA_INITIAL_KEY, KASA_PORT, KLAP_PORT};

/// Responses larger than this are treated as protocol errors.
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut key = KASA_INITIAL_KEY;
    plain
        .iter()
        .map(|byte| {
            key ^= byte;
            key
        })
        .collect()
}

pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = KASA_INITIAL_KEY;
    cipher
        .iter()
        .map(|byte| {
            let plain = key ^ byte;
            key = *byte;
            plain
        })
        .collect()
}

/// Length-prefixed, encrypted request frame.
pub fn encode_frame(request: &str) -> Vec<u8> {
    let payload = encrypt(request.as_bytes());
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Turn `host` or `host:port` into a socket address, `default_port` if none
/// is given. IP literals never touch the resolver; host names are looked up
/// on a helper thread so a stuck resolver costs at most `timeout`.
pub fn resolve(host: &str, default_port: u16, timeout: Duration) -> Result<SocketAddr, DeviceError> {
    if let Ok(address) = host.parse::<SocketAddr>() {
        return Ok(address);
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (tx, rx) = mpsc::channel();
    let query = host.to_string();
    thread::spawn(move || {
        let addresses = if query.contains(':') {
            query.to_socket_addrs()
        } else {
            (query.as_str(), default_port).to_socket_addrs()
        };
        let _ = tx.send(addresses.map(|mut found| found.next()));
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(Some(address))) => Ok(address),
        Ok(Ok(None)) => Err(DeviceError::Protocol(format!("cannot resolve {host}"))),
        Ok(Err(e)) => Err(DeviceError::Io(e)),
        Err(_) => Err(DeviceError::Timeout(timeout)),
    }
}

/// One request/response exchange over the legacy port.
#[derive(Debug, Clone)]
pub struct KasaClient {
    address: SocketAddr,
    timeout: Duration,
}

impl KasaClient {
    pub fn new(address: SocketAddr, timeout: Duration) -> Self {
        Self { address, timeout }
    }

    pub fn request(&self, request: &Value) -> Result<Value, DeviceError> {
        let mut stream =
            TcpStream::connect_timeout(&self.address, self.timeout).map_err(|e| self.io_error(e))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| self.io_error(e))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| self.io_error(e))?;

        stream
            .write_all(&encode_frame(&request.to_string()))
            .map_err(|e| self.io_error(e))?;

        let mut header = [0u8; 4];
        stream
            .read_exact(&mut header)
            .map_err(|e| self.io_error(e))?;
        let length = u32::from_be_bytes(header) as usize;
        if length > MAX_RESPONSE_BYTES {
            return Err(DeviceError::Protocol(format!(
                "response of {length} bytes exceeds {MAX_RESPONSE_BYTES}"
            )));
        }

        let mut payload = vec![0u8; length];
        stream
            .read_exact(&mut payload)
            .map_err(|e| self.io_error(e))?;

        serde_json::from_slice(&decrypt(&payload))
            .map_err(|e| DeviceError::Protocol(format!("invalid JSON: {e}")))
    }

    fn io_error(&self, error: io::Error) -> DeviceError {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DeviceError::Timeout(self.timeout),
            _ => DeviceError::Io(error),
        }
    }
}

/// The legacy port is closed: the device is up but speaks only KLAP.
fn legacy_port_closed(error: &DeviceError) -> bool {
    matches!(
        error,
        DeviceError::Io(e) if matches!(
            e.kind(),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
        )
    )
}

#[derive(Debug, Clone)]
enum Transport {
    Legacy(KasaClient),
    Klap(KlapClient),
}

impl Transport {
    fn request(&mut self, request: &Value) -> Result<Value, DeviceError> {
        match self {
            Transport::Legacy(client) => client.request(request),
            Transport::Klap(client) => client.request(request),
        }
    }
}

/// Pull `system.<method>` out of a response and check its `err_code`.
fn system_result<'a>(response: &'a Value, method: &str) -> Result<&'a Value, DeviceError> {
    let result = response
        .get("system")
        .and_then(|system| system.get(method))
        .ok_or_else(|| DeviceError::Protocol(format!("missing system.{method}")))?;

    match result.get("err_code").and_then(Value::as_i64) {
        Some(0) | None => Ok(result),
        Some(code) => Err(DeviceError::Rejected(code)),
    }
}

#[derive(Debug)]
pub struct KasaHandle {
    transport: Transport,
    address: String,
    alias: String,
    is_on: bool,
}

impl KasaHandle {
    fn from_sysinfo(address: &str, transport: Transport, response: &Value) -> Result<Self, DeviceError> {
        let info = system_result(response, "get_sysinfo")?;

        let relay_state = info
            .get("relay_state")
            .and_then(Value::as_i64)
            .ok_or_else(|| DeviceError::Protocol("missing relay_state".to_string()))?;
        let alias = info
            .get("alias")
            .and_then(Value::as_str)
            .filter(|alias| !alias.is_empty())
            .unwrap_or(address)
            .to_string();

        Ok(Self {
            transport,
            address: address.to_string(),
            alias,
            is_on: relay_state != 0,
        })
    }

    fn set_relay(&mut self, on: bool) -> Result<(), DeviceError> {
        let response = self.transport.request(&json!({
            "system": { "set_relay_state": { "state": u8::from(on) } }
        }))?;
        system_result(&response, "set_relay_state")?;
        self.is_on = on;
        Ok(())
    }
}

impl DeviceHandle for KasaHandle {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_on(&self) -> bool {
        self.is_on
    }

    fn turn_on(&mut self) -> Result<(), DeviceError> {
        self.set_relay(true)
    }

    fn turn_off(&mut self) -> Result<(), DeviceError> {
        self.set_relay(false)
    }
}

/// Gateway that queries `get_sysinfo` at each address.
#[derive(Debug, Clone)]
pub struct KasaGateway {
    timeout: Duration,
    credentials: Option<Credentials>,
    klap_port: u16,
}

impl KasaGateway {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            credentials: None,
            klap_port: KLAP_PORT,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn query(&self, address: &str) -> Result<KasaHandle, DeviceError> {
        let target = resolve(address, KASA_PORT, self.timeout)?;
        let sysinfo = json!({ "system": { "get_sysinfo": {} } });

        let legacy = KasaClient::new(target, self.timeout);
        match legacy.request(&sysinfo) {
            Ok(response) => KasaHandle::from_sysinfo(address, Transport::Legacy(legacy), &response),
            Err(e) if legacy_port_closed(&e) => {
                let mut klap = KlapClient::connect(
                    SocketAddr::new(target.ip(), self.klap_port),
                    self.credentials.as_ref(),
                    self.timeout,
                )?;
                let response = klap.request(&sysinfo)?;
                KasaHandle::from_sysinfo(address, Transport::Klap(klap), &response)
            }
            Err(e) => Err(e),
        }
    }
}

impl DeviceGateway for KasaGateway {
    fn discover(&self, address: &str) -> Result<Box<dyn DeviceHandle>, DiscoveryError> {
        self.query(address)
            .map(|handle| Box::new(handle) as Box<dyn DeviceHandle>)
            .map_err(|source| DiscoveryError {
                address: address.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::klap::{KlapCipher, seed_proof};
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn test_cipher_matches_device_framing() {
        let frame = encode_frame(r#"{"system":{"get_sysinfo":{}}}"#);
        assert_eq!(&frame[..4], &[0, 0, 0, 0x1d]);
        assert_eq!(&frame[4..8], &[0xd0, 0xf2, 0x81, 0xf8]);

        let plain = br#"{"system":{"set_relay_state":{"state":1}}}"#;
        assert_eq!(decrypt(&encrypt(plain)), plain.to_vec());
    }

    #[test]
    fn test_system_result_checks_err_code() {
        let ok = json!({"system": {"set_relay_state": {"err_code": 0}}});
        assert!(system_result(&ok, "set_relay_state").is_ok());

        let rejected = json!({"system": {"set_relay_state": {"err_code": -3}}});
        assert!(matches!(
            system_result(&rejected, "set_relay_state"),
            Err(DeviceError::Rejected(-3))
        ));

        assert!(matches!(
            system_result(&json!({}), "get_sysinfo"),
            Err(DeviceError::Protocol(_))
        ));
    }

    /// Serve `responses.len()` connections, one canned reply each, returning
    /// the decrypted requests.
    fn fake_plug(responses: Vec<Value>) -> (String, thread::JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut header = [0u8; 4];
                stream.read_exact(&mut header).unwrap();
                let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
                stream.read_exact(&mut payload).unwrap();
                requests.push(serde_json::from_slice(&decrypt(&payload)).unwrap());
                stream.write_all(&encode_frame(&response.to_string())).unwrap();
            }
            requests
        });

        (address, server)
    }

    #[test]
    fn test_discover_and_switch_against_fake_plug() {
        let (address, server) = fake_plug(vec![
            json!({"system": {"get_sysinfo": {"alias": "Dining Room", "relay_state": 0, "err_code": 0}}}),
            json!({"system": {"set_relay_state": {"err_code": 0}}}),
        ]);

        let gateway = KasaGateway::new(Duration::from_secs(2));
        let mut handle = gateway.discover(&address).unwrap();
        assert_eq!(handle.alias(), "Dining Room");
        assert!(!handle.is_on());

        handle.turn_on().unwrap();
        assert!(handle.is_on());

        let requests = server.join().unwrap();
        assert_eq!(requests[0], json!({"system": {"get_sysinfo": {}}}));
        assert_eq!(
            requests[1],
            json!({"system": {"set_relay_state": {"state": 1}}})
        );
    }

    #[test]
    fn test_unreachable_address_is_discovery_error() {
        // Bind then drop to get a port with nothing listening
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let gateway = KasaGateway::new(Duration::from_millis(500));
        let err = gateway.discover(&address).err().unwrap();
        assert_eq!(err.address, address);
    }

    #[test]
    fn test_resolve_literals_without_lookup() {
        let timeout = Duration::from_millis(100);
        assert_eq!(
            resolve("10.0.0.5", KASA_PORT, timeout).unwrap(),
            "10.0.0.5:9999".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(resolve("10.0.0.5:2000", KASA_PORT, timeout).unwrap().port(), 2000);
        assert_eq!(
            resolve("::1", KASA_PORT, timeout).unwrap(),
            SocketAddr::new(IpAddr::from([0, 0, 0, 0, 0, 0, 0, 1u16]), KASA_PORT)
        );
    }

    #[test]
    fn test_resolve_host_name_is_bounded() {
        let timeout = Duration::from_secs(1);
        let started = std::time::Instant::now();

        assert!(resolve("porch-light.invalid", KASA_PORT, timeout).is_err());
        assert!(started.elapsed() < timeout + Duration::from_millis(500));
    }

    /// A localhost address nothing listens on.
    fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    struct HttpRequest {
        path: String,
        cookie: Option<String>,
        body: Vec<u8>,
    }

    fn read_http_request(stream: &TcpStream) -> HttpRequest {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let path = line.split_whitespace().nth(1).unwrap().to_string();

        let mut length = 0;
        let mut cookie = None;
        loop {
            line.clear();
            reader.read_line(&mut line).unwrap();
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            let (name, value) = header.split_once(':').unwrap();
            match name.to_ascii_lowercase().as_str() {
                "content-length" => length = value.trim().parse().unwrap(),
                "cookie" => cookie = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).unwrap();
        HttpRequest { path, cookie, body }
    }

    fn write_http_response(mut stream: &TcpStream, status: &str, headers: &str, body: &[u8]) {
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n{headers}\r\n",
            body.len()
        )
        .unwrap();
        stream.write_all(body).unwrap();
    }

    /// Serve `connections` KLAP exchanges for the account behind
    /// `auth_hash`, returning the decrypted JSON requests.
    fn fake_klap_plug(auth_hash: [u8; 32], connections: usize) -> (u16, thread::JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let remote_seed = [42u8; 16];
            let mut local_seed = Vec::new();
            let mut relay_on = false;
            let mut requests = Vec::new();

            for _ in 0..connections {
                let (stream, _) = listener.accept().unwrap();
                let request = read_http_request(&stream);

                if request.path == "/app/handshake1" {
                    local_seed = request.body;
                    let mut reply = remote_seed.to_vec();
                    reply.extend_from_slice(&seed_proof(&local_seed, &remote_seed, &auth_hash));
                    write_http_response(
                        &stream,
                        "200 OK",
                        "Set-Cookie: TP_SESSIONID=fake-session;TIMEOUT=86400\r\n",
                        &reply,
                    );
                } else if request.path == "/app/handshake2" {
                    let accepted = request.body == seed_proof(&remote_seed, &local_seed, &auth_hash)
                        && request.cookie.as_deref() == Some("TP_SESSIONID=fake-session");
                    let status = if accepted { "200 OK" } else { "403 Forbidden" };
                    write_http_response(&stream, status, "", &[]);
                } else {
                    let seq: i32 = request.path.rsplit('=').next().unwrap().parse().unwrap();
                    let cipher = KlapCipher::new(&local_seed, &remote_seed, &auth_hash);
                    let command: Value =
                        serde_json::from_slice(&cipher.decrypt(seq, &request.body).unwrap()).unwrap();

                    let reply = if command["system"].get("set_relay_state").is_some() {
                        relay_on = command["system"]["set_relay_state"]["state"] == 1;
                        json!({"system": {"set_relay_state": {"err_code": 0}}})
                    } else {
                        json!({"system": {"get_sysinfo": {
                            "alias": "Porch",
                            "relay_state": u8::from(relay_on),
                            "err_code": 0
                        }}})
                    };
                    requests.push(command);
                    write_http_response(
                        &stream,
                        "200 OK",
                        "",
                        &cipher.seal(seq, reply.to_string().as_bytes()),
                    );
                }
            }
            requests
        });

        (port, server)
    }

    fn klap_gateway(credentials: Option<Credentials>, klap_port: u16) -> KasaGateway {
        KasaGateway {
            timeout: Duration::from_secs(2),
            credentials,
            klap_port,
        }
    }

    #[test]
    fn test_refused_legacy_port_falls_back_to_klap() {
        let credentials = Credentials::new("owner@example.com", "s3cret");
        let (port, server) = fake_klap_plug(credentials.auth_hash(), 4);
        let gateway = klap_gateway(Some(credentials), port);

        let mut handle = gateway.discover(&closed_port()).unwrap();
        assert_eq!(handle.alias(), "Porch");
        assert!(!handle.is_on());

        handle.turn_on().unwrap();
        assert!(handle.is_on());

        assert_eq!(
            server.join().unwrap(),
            vec![
                json!({"system": {"get_sysinfo": {}}}),
                json!({"system": {"set_relay_state": {"state": 1}}}),
            ]
        );
    }

    #[test]
    fn test_klap_device_without_credentials_needs_authentication() {
        let account = Credentials::new("owner@example.com", "s3cret");
        let (port, server) = fake_klap_plug(account.auth_hash(), 1);
        let gateway = klap_gateway(None, port);

        let err = gateway.discover(&closed_port()).err().unwrap();
        assert!(matches!(err.source, DeviceError::AuthenticationRequired));
        assert!(err.source.to_string().contains("USERNAME"));
        assert!(server.join().unwrap().is_empty());
    }

    #[test]
    fn test_klap_device_rejects_wrong_password() {
        let account = Credentials::new("owner@example.com", "s3cret");
        let (port, server) = fake_klap_plug(account.auth_hash(), 1);
        let gateway = klap_gateway(Some(Credentials::new("owner@example.com", "guess")), port);

        let err = gateway.discover(&closed_port()).err().unwrap();
        assert!(matches!(err.source, DeviceError::AuthenticationFailed));
        server.join().unwrap();
    }
}
