//! Checkout CLI
//!
//! Command-line interface for the Checkout API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use checkout_client::CheckoutClient;
use checkout_types::{
    CreateOrderRequest, CreateProductRequest, Currency, PaymentMethod, PaymentMethodType,
    ProductId, ShippingAddress, TransactionId, TransactionStatus,
};

#[derive(Parser)]
#[command(name = "checkout")]
#[command(author, version, about = "Checkout API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Checkout API
    #[arg(
        long,
        env = "CHECKOUT_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    /// Client identifier sent for rate limiting
    #[arg(long, env = "CHECKOUT_CLIENT_ID")]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog operations
    Product {
        #[command(subcommand)]
        action: ProductCommands,
    },
    /// Order operations
    Order {
        #[command(subcommand)]
        action: OrderCommands,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Add a product to the catalog
    Create {
        /// Product name
        name: String,
        /// Unit price in major units (e.g. 50000)
        #[arg(long)]
        price: String,
        /// Currency (COP, USD, EUR)
        #[arg(long, default_value = "COP")]
        currency: String,
        /// Units in stock
        #[arg(long, default_value = "0")]
        stock: u32,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Get product details
    Get {
        /// Product ID (UUID)
        id: String,
    },
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Place an order, reserving stock
    Create {
        #[arg(long)]
        product: String,
        #[arg(long, default_value = "1")]
        quantity: u32,
        #[arg(long)]
        email: String,
        /// Recipient name
        #[arg(long)]
        recipient: String,
        /// Street address
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long, default_value = "CO")]
        country: String,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Get order details
    Get {
        /// Order ID (UUID)
        id: String,
    },
    /// List orders by status
    List {
        /// PENDING, APPROVED, DECLINED, ERROR or VOIDED
        #[arg(long, default_value = "PENDING")]
        status: String,
    },
    /// Pay an order with a gateway token
    Pay {
        /// Order ID (UUID)
        id: String,
        #[arg(long)]
        token: String,
        /// CARD, NEQUI or PSE
        #[arg(long, default_value = "CARD")]
        method: String,
        #[arg(long, default_value = "1")]
        installments: u32,
    },
    /// Void an unpaid order
    Void {
        /// Order ID (UUID)
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Refresh an order's status from the gateway
    Sync {
        /// Order ID (UUID)
        id: String,
    },
}

fn parse_currency(s: &str) -> Result<Currency> {
    s.to_uppercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown currency: {}. Supported: COP, USD, EUR", s))
}

fn parse_price(s: &str) -> Result<Decimal> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid price: {}", s))
}

fn parse_status(s: &str) -> Result<TransactionStatus> {
    s.to_uppercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown status: {}", s))
}

fn parse_method(s: &str) -> Result<PaymentMethodType> {
    match s.to_uppercase().as_str() {
        "CARD" => Ok(PaymentMethodType::Card),
        "NEQUI" => Ok(PaymentMethodType::Nequi),
        "PSE" => Ok(PaymentMethodType::Pse),
        _ => anyhow::bail!("Unknown payment method: {}. Supported: CARD, NEQUI, PSE", s),
    }
}

fn parse_product_id(s: &str) -> Result<ProductId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid product ID: {}", s))
}

fn parse_order_id(s: &str) -> Result<TransactionId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid order ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = CheckoutClient::new(&cli.api_url);
    if let Some(id) = cli.client_id {
        client = client.with_client_id(id);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Product { action } => match action {
            ProductCommands::Create {
                name,
                price,
                currency,
                stock,
                category,
                description,
                image_url,
            } => {
                let req = CreateProductRequest {
                    name,
                    price: parse_price(&price)?,
                    currency: parse_currency(&currency)?,
                    stock,
                    category,
                    description,
                    image_url,
                };
                let product = client.create_product(&req).await?;
                println!("{}", serde_json::to_string_pretty(&product)?);
            }
            ProductCommands::Get { id } => {
                let product = client.get_product(parse_product_id(&id)?).await?;
                println!("{}", serde_json::to_string_pretty(&product)?);
            }
        },

        Commands::Order { action } => match action {
            OrderCommands::Create {
                product,
                quantity,
                email,
                recipient,
                address,
                city,
                country,
                region,
                postal_code,
                phone,
            } => {
                let req = CreateOrderRequest {
                    product_id: parse_product_id(&product)?,
                    quantity,
                    customer_email: email,
                    shipping_address: ShippingAddress {
                        recipient_name: recipient,
                        address_line: address,
                        city,
                        region,
                        postal_code,
                        country,
                        phone,
                    },
                };
                let order = client.create_order(&req).await?;
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
            OrderCommands::Get { id } => {
                let order = client.get_order(parse_order_id(&id)?).await?;
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
            OrderCommands::List { status } => {
                let orders = client.list_orders(parse_status(&status)?).await?;
                println!("{}", serde_json::to_string_pretty(&orders)?);
            }
            OrderCommands::Pay {
                id,
                token,
                method,
                installments,
            } => {
                let payment_method = PaymentMethod {
                    method_type: parse_method(&method)?,
                    token,
                    installments,
                };
                let order = client.pay(parse_order_id(&id)?, payment_method).await?;
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
            OrderCommands::Void { id, reason } => {
                let order = client.void_order(parse_order_id(&id)?, reason).await?;
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
            OrderCommands::Sync { id } => {
                let order = client.sync_order(parse_order_id(&id)?).await?;
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
        },
    }

    Ok(())
}
