//! `#[rpc_service]` contracts driven end to end

use jrex::{rpc_service, JsonRpcServer, RpcResponseEnvelope, ServiceError, StreamSink, TypeTagged};
use jrex_server::{ReturnType, RpcService, TypeKind};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Serialize)]
struct Truck {
    payload: u32,
}

#[derive(Serialize)]
struct Van {
    doors: u8,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Vehicle {
    Truck(Truck),
    Van(Van),
}

impl TypeTagged for Vehicle {
    const DISCRIMINATOR: &'static str = "type";

    fn type_tag(&self) -> &str {
        match self {
            Vehicle::Truck(_) => "truck",
            Vehicle::Van(_) => "van",
        }
    }
}

#[derive(Default)]
struct TestService {
    pings: AtomicUsize,
}

#[rpc_service]
impl TestService {
    pub fn new() -> Self {
        Self::default()
    }

    #[rpc(name = "testMethod")]
    pub fn test_method(&self, _param: &str) -> &'static str {
        "success"
    }

    #[rpc(name = "overloadedMethod")]
    pub fn overloaded_none(&self) -> String {
        "noParam".to_string()
    }

    #[rpc(name = "overloadedMethod")]
    pub fn overloaded_text(&self, value: String) -> String {
        value
    }

    #[rpc(name = "overloadedMethod")]
    pub fn overloaded_pair(&self, a: &str, b: &str) -> String {
        format!("{}, {}", a, b)
    }

    #[rpc(name = "overloadedMethod")]
    pub fn overloaded_int(&self, value: i32) -> String {
        format!("intParam{}", value)
    }

    #[rpc(name = "methodWithoutRequiredParam")]
    pub fn without_required_param(
        &self,
        #[param("param1")] first: String,
        #[param("param2", optional)] second: Option<String>,
    ) -> String {
        format!("{}, {}", first, second.as_deref().unwrap_or("null"))
    }

    #[rpc(name = "getVehicles", tagged)]
    pub fn vehicles(&self) -> Vec<Vehicle> {
        vec![Vehicle::Truck(Truck { payload: 4000 }), Vehicle::Van(Van { doors: 5 })]
    }

    pub fn sum(&self, #[param("values")] values: &[i64]) -> i64 {
        values.iter().sum()
    }

    #[rpc(error(category = "Overdrawn", code = 1001, message = "Insufficient funds"))]
    pub fn withdraw(&self, #[param("amount")] amount: u32) -> Result<u32, ServiceError> {
        if amount > 100 {
            Err(ServiceError::new("Overdrawn", format!("cannot withdraw {}", amount)))
        } else {
            Ok(100 - amount)
        }
    }

    #[rpc(error(category = "ParseIntError", code = -32001))]
    pub fn parse(&self, text: &str) -> Result<i64, std::num::ParseIntError> {
        text.trim().parse()
    }

    pub fn ping(&self) {
        self.pings.fetch_add(1, Ordering::SeqCst);
    }

    #[rpc(skip)]
    pub fn internal(&self) -> u8 {
        7
    }

    #[allow(dead_code)]
    fn private_helper(&self) -> u8 {
        1
    }
}

fn request(server: &JsonRpcServer<TestService>, body: Value) -> RpcResponseEnvelope {
    let mut responses = Vec::new();
    server.handle_value(body, &mut responses).unwrap();
    assert_eq!(responses.len(), 1, "expected exactly one response");
    responses.remove(0)
}

fn call(server: &JsonRpcServer<TestService>, method: &str, params: Value) -> RpcResponseEnvelope {
    request(server, json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
}

#[test]
fn test_contract_contents() {
    let contract = TestService::contract();
    assert!(contract.contains("testMethod"));
    assert_eq!(contract.candidates("overloadedMethod").len(), 4);
    assert!(!contract.contains("internal"));
    assert!(!contract.contains("private_helper"));
    assert!(!contract.contains("new"));

    let descriptor = contract.candidates("methodWithoutRequiredParam")[0].descriptor();
    assert_eq!(descriptor.params[0].name.as_deref(), Some("param1"));
    assert!(descriptor.params[0].required);
    assert!(!descriptor.params[1].required);
    assert_eq!(descriptor.params[1].kind, TypeKind::optional(TypeKind::Text));

    let ping = contract.candidates("ping")[0].descriptor();
    assert_eq!(ping.returns, ReturnType::Unit);

    let sum = contract.candidates("sum")[0].descriptor();
    assert_eq!(sum.params[0].kind, TypeKind::collection_of(TypeKind::INTEGER));
}

#[test]
fn test_round_trip_on_the_wire() {
    let server = JsonRpcServer::new(TestService::new());
    let mut sink = StreamSink::new(Vec::new());
    server
        .handle(
            r#"{"jsonrpc":"2.0","id":"x-1","method":"testMethod","params":["anything"]}"#.as_bytes(),
            &mut sink,
        )
        .unwrap();
    assert_eq!(
        String::from_utf8(sink.into_inner()).unwrap(),
        r#"{"jsonrpc":"2.0","id":"x-1","result":"success"}"#
    );
}

#[test]
fn test_overloads() {
    let server = JsonRpcServer::new(TestService::new());
    assert_eq!(call(&server, "overloadedMethod", json!([])).result(), Some(&json!("noParam")));
    assert_eq!(call(&server, "overloadedMethod", json!(["a"])).result(), Some(&json!("a")));
    assert_eq!(call(&server, "overloadedMethod", json!(["a", "b"])).result(), Some(&json!("a, b")));
    assert_eq!(call(&server, "overloadedMethod", json!([42])).result(), Some(&json!("intParam42")));
}

#[test]
fn test_missing_optional_named_param() {
    let strict = JsonRpcServer::new(TestService::new());
    let response = call(&strict, "methodWithoutRequiredParam", json!({"param1": "value1"}));
    assert_eq!(response.error_data().map(|e| e.code), Some(-32602));

    let lenient = JsonRpcServer::builder(TestService::new())
        .allow_fewer_params(true)
        .build()
        .unwrap();
    let response = call(&lenient, "methodWithoutRequiredParam", json!({"param1": "value1"}));
    assert_eq!(response.result(), Some(&json!("value1, null")));
}

#[test]
fn test_tagged_collection() {
    let server = JsonRpcServer::new(TestService::new());
    let response = call(&server, "getVehicles", json!([]));
    assert_eq!(
        response.result(),
        Some(&json!([{"payload": 4000, "type": "truck"}, {"doors": 5, "type": "van"}]))
    );
}

#[test]
fn test_slice_param_by_name() {
    let server = JsonRpcServer::new(TestService::new());
    let response = call(&server, "sum", json!({"values": [1, 2, 3]}));
    assert_eq!(response.result(), Some(&json!(6)));
}

#[test]
fn test_declared_errors() {
    let server = JsonRpcServer::new(TestService::new());

    let response = call(&server, "withdraw", json!({"amount": 500}));
    let error = response.error_data().unwrap();
    assert_eq!((error.code, error.message.as_str()), (1001, "Insufficient funds"));

    let response = call(&server, "withdraw", json!({"amount": 40}));
    assert_eq!(response.result(), Some(&json!(60)));

    let response = call(&server, "parse", json!(["twelve"]));
    assert_eq!(response.error_data().map(|e| e.code), Some(-32001));
}

#[test]
fn test_unit_operation_and_notification() {
    let server = JsonRpcServer::new(TestService::new());

    let response = call(&server, "ping", json!([]));
    assert_eq!(response.result(), Some(&Value::Null));

    let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
    server
        .handle_value(json!({"jsonrpc": "2.0", "method": "ping"}), &mut responses)
        .unwrap();
    assert!(responses.is_empty());
    assert_eq!(server.handler().pings.load(Ordering::SeqCst), 2);
}

#[test]
fn test_skipped_method_is_not_found() {
    let server = JsonRpcServer::new(TestService::new());
    let response = call(&server, "internal", json!([]));
    assert_eq!(response.error_data().map(|e| e.code), Some(-32601));
}

#[test]
fn test_id_subtypes_survive() {
    let server = JsonRpcServer::new(TestService::new());
    for literal in ["7", "9007199254740993", "0.25", "\"seven\"", "12345678901234567890123"] {
        let body = format!(r#"{{"jsonrpc":"2.0","id":{},"method":"ping"}}"#, literal);
        let mut sink = StreamSink::new(Vec::new());
        server.handle(body.as_bytes(), &mut sink).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            format!(r#"{{"jsonrpc":"2.0","id":{},"result":null}}"#, literal),
            "id literal {}",
            literal
        );
    }
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = Arc::new(JsonRpcServer::new(TestService::new()));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let server = Arc::clone(&server);
            tokio::task::spawn_blocking(move || {
                let body = format!(
                    r#"{{"jsonrpc":"2.0","id":{},"method":"overloadedMethod","params":[{}]}}"#,
                    i, i
                );
                let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
                server.handle(body.as_bytes(), &mut responses).unwrap();
                responses.remove(0)
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let response = task.await.unwrap();
        assert_eq!(response.result(), Some(&json!(format!("intParam{}", i))));
    }
}
