//! Interface-restricted contracts, polymorphic results and shared servers

use jrex_core::RpcResponseEnvelope;
use jrex_server::{
    Contract, ElementType, JsonRpcServer, OperationDescriptor, ParamDescriptor, ReturnType, RpcService,
    ServiceError, TypeKind, TypeTagged,
};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};

trait Ledger: Send + Sync {
    fn balance(&self, account: &str) -> i64;
}

struct Bank;

impl Bank {
    #[allow(dead_code)]
    fn audit(&self) -> &'static str {
        "audited"
    }
}

impl Ledger for Bank {
    fn balance(&self, account: &str) -> i64 {
        account.len() as i64 * 100
    }
}

fn ledger_contract() -> Arc<Contract<dyn Ledger>> {
    Arc::new(
        Contract::<dyn Ledger>::builder()
            .method(
                OperationDescriptor::new("balance")
                    .param(ParamDescriptor::named("account", TypeKind::Text))
                    .returns(ReturnType::Value(TypeKind::INTEGER)),
                |ledger, (account,): (String,)| Ok::<_, ServiceError>(ledger.balance(&account)),
            )
            .build(),
    )
}

#[test]
fn test_trait_object_contract_exposes_only_trait_operations() {
    let handler: Arc<dyn Ledger> = Arc::new(Bank);
    let server = JsonRpcServer::with_contract(handler, ledger_contract());

    let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
    server
        .handle_value(
            json!({"jsonrpc": "2.0", "id": 1, "method": "balance", "params": {"account": "abc"}}),
            &mut responses,
        )
        .unwrap();
    server
        .handle_value(json!({"jsonrpc": "2.0", "id": 2, "method": "audit"}), &mut responses)
        .unwrap();

    assert_eq!(responses[0].result(), Some(&json!(300)));
    assert_eq!(responses[1].error_data().map(|e| e.code), Some(-32601));
}

#[derive(Serialize)]
struct Truck {
    axles: u8,
}

#[derive(Serialize)]
struct Van {
    seats: u8,
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

struct Garage;

impl RpcService for Garage {
    fn contract() -> Arc<Contract<Self>> {
        static CONTRACT: OnceLock<Arc<Contract<Garage>>> = OnceLock::new();
        CONTRACT
            .get_or_init(|| {
                Arc::new(
                    Contract::builder()
                        .method_tagged(OperationDescriptor::new("fleet"), |_: &Garage, (): ()| {
                            Ok::<_, ServiceError>(vec![
                                Vehicle::Truck(Truck { axles: 3 }),
                                Vehicle::Van(Van { seats: 8 }),
                            ])
                        })
                        .build(),
                )
            })
            .clone()
    }
}

#[test]
fn test_polymorphic_collection_carries_type_tags() {
    let server = JsonRpcServer::new(Garage);
    let descriptor = server.contract().candidates("fleet")[0].descriptor().clone();
    assert_eq!(
        descriptor.returns,
        ReturnType::Collection {
            element: ElementType::tagged("Vehicle", "type")
        }
    );

    let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
    server
        .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "fleet"}), &mut responses)
        .unwrap();
    assert_eq!(
        responses[0].result(),
        Some(&json!([{"axles": 3, "type": "truck"}, {"seats": 8, "type": "van"}]))
    );
}

#[tokio::test]
async fn test_shared_server_across_threads() {
    let server = Arc::new(JsonRpcServer::new(Garage));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let server = Arc::clone(&server);
            tokio::task::spawn_blocking(move || {
                let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
                server
                    .handle_value(json!({"jsonrpc": "2.0", "id": i, "method": "fleet"}), &mut responses)
                    .unwrap();
                responses
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let responses = task.await.unwrap();
        assert_eq!(responses[0].id, Some(jrex_core::Id::Int(i as i32)));
        assert!(responses[0].is_success());
    }
}
