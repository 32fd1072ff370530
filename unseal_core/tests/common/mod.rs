//! In-process fake Vault and Consul servers for the HTTP integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    web::{self, Data, Json, Path},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::rngs::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey, pkcs8::DecodePublicKey};
use serde::Deserialize;
use serde_json::json;

pub const PRIVATE_KEY: &str = include_str!("../../testdata/rsa_test_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../../testdata/rsa_test_key.pub.pem");
pub const HELLO_B64: &str = include_str!("../../testdata/hello.b64");

/// Encrypt `bundle` for the test key and base64 it the way it is stored in Consul.
pub fn sealed_bundle(bundle: &str) -> String {
    let public = RsaPublicKey::from_public_key_pem(PUBLIC_KEY).unwrap();
    let ciphertext = public
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, bundle.as_bytes())
        .unwrap();
    STANDARD.encode(ciphertext)
}

#[derive(Debug, Default)]
pub struct VaultState {
    pub initialized: bool,
    pub sealed: bool,
    pub threshold: usize,
    pub progress: usize,
    /// Shares that make Vault answer 400
    pub rejected: Vec<String>,
    /// Unseal once this many shares have been accepted; `None` never unseals
    pub unseal_after: Option<usize>,
    pub submitted: Vec<String>,
    pub status_calls: usize,
}

impl VaultState {
    pub fn sealed(threshold: usize) -> Self {
        Self {
            initialized: true,
            sealed: true,
            threshold,
            unseal_after: Some(threshold),
            ..Self::default()
        }
    }

    fn document(&self) -> serde_json::Value {
        json!({
            "type": "shamir",
            "initialized": self.initialized,
            "sealed": self.sealed,
            "t": self.threshold,
            "n": self.threshold + 2,
            "progress": self.progress,
            "nonce": "",
            "version": "1.15.2",
        })
    }
}

#[derive(Deserialize)]
struct UnsealBody {
    key: String,
}

async fn seal_status(state: Data<Mutex<VaultState>>) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.status_calls += 1;
    HttpResponse::Ok().json(state.document())
}

async fn unseal(state: Data<Mutex<VaultState>>, body: Json<UnsealBody>) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.submitted.push(body.key.clone());
    if state.rejected.contains(&body.key) {
        return HttpResponse::BadRequest().json(json!({"errors": ["invalid key"]}));
    }
    state.progress += 1;
    if state.unseal_after.is_some_and(|n| state.progress >= n) {
        state.sealed = false;
        state.progress = 0;
    }
    HttpResponse::Ok().json(state.document())
}

/// Start a fake Vault and return its base address with a handle on its state.
pub fn spawn_vault(state: VaultState) -> (String, Data<Mutex<VaultState>>) {
    let data = Data::new(Mutex::new(state));
    let app_data = data.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .route("/v1/sys/seal-status", web::get().to(seal_status))
            .route("/v1/sys/unseal", web::put().to(unseal))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    (format!("http://{addr}"), data)
}

#[derive(Debug, Default)]
pub struct ConsulState {
    /// Stored values keyed by path
    pub entries: Vec<(String, Vec<u8>)>,
    /// Token required on every request, if any
    pub required_token: Option<String>,
    /// Answer with this literal `Value` instead of encoding the stored bytes
    pub raw_value: Option<String>,
    pub reads: usize,
}

impl ConsulState {
    pub fn with_entry(path: &str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            entries: vec![(path.to_owned(), value.into())],
            ..Self::default()
        }
    }
}

async fn kv_get(
    state: Data<Mutex<ConsulState>>,
    path: Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.reads += 1;
    if let Some(required) = &state.required_token {
        let sent = req
            .headers()
            .get("X-Consul-Token")
            .and_then(|v| v.to_str().ok());
        if sent != Some(required.as_str()) {
            return HttpResponse::Forbidden().body("Permission denied");
        }
    }
    let key = path.into_inner();
    match state.entries.iter().find(|(k, _)| *k == key) {
        Some((k, value)) => {
            let encoded = match (&state.raw_value, value.is_empty()) {
                (Some(raw), _) => serde_json::Value::String(raw.clone()),
                (None, true) => serde_json::Value::Null,
                (None, false) => serde_json::Value::String(STANDARD.encode(value)),
            };
            HttpResponse::Ok().json(json!([{
                "LockIndex": 0,
                "Key": k,
                "Flags": 0,
                "Value": encoded,
                "CreateIndex": 10,
                "ModifyIndex": 12,
            }]))
        }
        None => HttpResponse::NotFound().finish(),
    }
}

/// Start a fake Consul agent and return its `host:port` with a handle on its state.
pub fn spawn_consul(state: ConsulState) -> (String, Data<Mutex<ConsulState>>) {
    let data = Data::new(Mutex::new(state));
    let app_data = data.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .route("/v1/kv/{path:.*}", web::get().to(kv_get))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    (addr.to_string(), data)
}
