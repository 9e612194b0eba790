#![allow(dead_code)]

use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    http::StatusCode,
    web,
};
use serde_json::{
    Value,
    json,
};
use std::{
    net::TcpListener,
    sync::{
        Arc,
        Mutex,
    },
    thread::JoinHandle,
};
use url::Url;

type Responder = Box<dyn Fn(&Value) -> (u16, Value) + Send + Sync>;

struct StubState {
    responder: Responder,
    requests: Mutex<Vec<Value>>,
}

/// HTTP server answering every POST with whatever the responder returns for its JSON body.
pub struct StubServer {
    url: Url,
    state: Arc<StubState>,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start(responder: impl Fn(&Value) -> (u16, Value) + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let address = listener.local_addr().unwrap();
        let url = Url::parse(&format!("http://{address}/")).unwrap();
        let state = Arc::new(StubState {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        });

        let data = web::Data::from(state.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .default_service(web::to(handle))
        })
        .workers(1)
        .shutdown_timeout(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            url,
            state,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle(state: web::Data<StubState>, body: web::Bytes) -> HttpResponse {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.requests.lock().unwrap().push(request.clone());
    let (status, response) = (state.responder)(&request);
    HttpResponse::build(StatusCode::from_u16(status).unwrap()).json(response)
}

/// JSON-RPC success envelope echoing the request id.
pub fn rpc_result(request: &Value, result: Value) -> (u16, Value) {
    (
        200,
        json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
    )
}

pub fn rpc_error(request: &Value, code: i64, message: &str) -> (u16, Value) {
    (
        200,
        json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": code, "message": message },
        }),
    )
}

/// A 32-byte ABI word holding `value`, as `eth_call` returns it.
pub fn word(value: u8) -> String {
    format!("0x{}{:02x}", "00".repeat(31), value)
}

pub fn address_word(address: &str) -> String {
    format!("0x{}{}", "00".repeat(12), address.trim_start_matches("0x"))
}
