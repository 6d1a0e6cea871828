//! Client example demonstrating a full checkout against a running server.
//!
//! A stand-in payment gateway is served locally so the flow needs no
//! external account.
//!
//! Run with: cargo run -p checkout-app --example client_example

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::post};
use checkout_client::CheckoutClient;
use checkout_hex::{
    CheckoutService,
    inbound::HttpServer,
    outbound::{GatewayConfig, HttpPaymentGateway},
};
use checkout_repo::build_repo;
use checkout_types::{
    CreateOrderRequest, CreateProductRequest, Currency, PaymentMethod, ShippingAddress,
    TransactionStatus,
};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::net::TcpListener;

/// Approves every charge whose token does not start with `tok_decline`.
async fn fake_charge(State(counter): State<Arc<AtomicUsize>>, Json(body): Json<Value>) -> Json<Value> {
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    let token = body["payment_method"]["token"].as_str().unwrap_or_default();
    let status = if token.starts_with("tok_decline") {
        "DECLINED"
    } else {
        "APPROVED"
    };
    Json(json!({
        "data": {
            "id": format!("demo-{n}"),
            "status": status,
            "status_message": (status == "DECLINED").then_some("Card declined"),
            "reference": body["reference"],
            "amount_in_cents": body["amount_in_cents"],
            "currency": body["currency"],
            "payment_method_type": body["payment_method"]["type"],
            "created_at": chrono::Utc::now(),
        }
    }))
}

async fn spawn(router: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("server stopped: {e}");
        }
    });
    Ok(addr)
}

fn shipping() -> ShippingAddress {
    ShippingAddress {
        recipient_name: "Ana Gómez".to_string(),
        address_line: "Calle 123 #45-67".to_string(),
        city: "Bogotá".to_string(),
        region: Some("Cundinamarca".to_string()),
        postal_code: None,
        country: "CO".to_string(),
        phone: Some("+57 300 000 0000".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Stand-in gateway
    let gateway_router = Router::new()
        .route("/v1/transactions", post(fake_charge))
        .with_state(Arc::new(AtomicUsize::new(0)));
    let gateway_addr = spawn(gateway_router).await?;
    println!("🏦 Fake gateway on {gateway_addr}");

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("checkout.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    println!("   Database: {db_url}");

    let repo = build_repo(&db_url).await?;
    let gateway = HttpPaymentGateway::new(GatewayConfig {
        base_url: format!("http://{gateway_addr}/v1"),
        private_key: "prv_test_demo".to_string(),
        integrity_secret: "test_integrity_demo".to_string(),
        timeout: Duration::from_secs(5),
    })?;
    let service = CheckoutService::new(repo, gateway);
    let server_addr = spawn(HttpServer::new(service).router()).await?;
    println!("🚀 Checkout server on {server_addr}");

    let client = CheckoutClient::new(format!("http://{server_addr}")).with_client_id("demo");

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: Full checkout flow
    // ─────────────────────────────────────────────────────────────────────────

    let health = client.health().await?;
    println!("✅ Server health: {health}");

    let product = client
        .create_product(&CreateProductRequest {
            name: "Colombian coffee 500g".to_string(),
            price: dec!(50000),
            currency: Currency::COP,
            stock: 5,
            category: Some("coffee".to_string()),
            description: None,
            image_url: None,
        })
        .await?;
    println!("✅ Created product: {} (stock={})", product.name, product.stock);

    let order_request = |quantity| CreateOrderRequest {
        product_id: product.id,
        quantity,
        shipping_address: shipping(),
        customer_email: "ana@example.com".to_string(),
    };

    // Paid order
    let order = client.create_order(&order_request(2)).await?;
    println!(
        "✅ Order {} placed: {} {}",
        order.id,
        order.total_price.amount(),
        order.total_price.currency()
    );
    let paid = client
        .pay(order.id, PaymentMethod::card("tok_test_4242"))
        .await?;
    println!("✅ Payment result: {} (gateway id {:?})", paid.status, paid.gateway_transaction_id);

    let again = client
        .pay(order.id, PaymentMethod::card("tok_test_4242"))
        .await;
    println!("✅ Second payment refused: {}", again.is_err());

    // Declined order gives its stock back
    let order = client.create_order(&order_request(1)).await?;
    let declined = client
        .pay(order.id, PaymentMethod::card("tok_decline_0001"))
        .await?;
    println!(
        "✅ Declined: {} ({})",
        declined.status,
        declined.error_message.unwrap_or_default()
    );

    // Voided order gives its stock back too
    let order = client.create_order(&order_request(1)).await?;
    let voided = client
        .void_order(order.id, Some("Changed my mind".to_string()))
        .await?;
    println!("✅ Voided: {}", voided.status);

    let product = client.get_product(product.id).await?;
    println!("   Stock left: {}", product.stock);

    let approved = client.list_orders(TransactionStatus::Approved).await?;
    println!("\n📋 Approved orders:");
    for order in approved {
        println!("   - {} x{} {}", order.id, order.quantity, order.status);
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
