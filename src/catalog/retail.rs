//! Built-in retail operations catalog.
//!
//! Thirty mock tools with canned outputs. Order matters: degradation sweeps
//! truncate this list by prefix, so the first entries are the ones every
//! tool-count step shares.

use serde_json::{json, Map, Value};

use super::types::{Catalog, CatalogError, ToolSpec};

type Render = fn(&Map<String, Value>) -> String;

/// String value of `key`, or `default` when absent or null.
fn arg(args: &Map<String, Value>, key: &str, default: &str) -> String {
    match args.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn object_schema(properties: &[&str], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|p| ((*p).to_string(), json!({"type": "string"})))
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

fn tool(
    name: &str,
    description: &str,
    properties: &[&str],
    required: &[&str],
    render: Render,
) -> ToolSpec {
    ToolSpec::new(
        name,
        description,
        object_schema(properties, required),
        move |args| Ok(json!({"ok": true, "content": render(args)})),
    )
}

fn inventory_sku(args: &Map<String, Value>) -> String {
    match args.get("sku").and_then(Value::as_str) {
        Some(sku) if !sku.is_empty() => sku.to_string(),
        _ => arg(args, "query", "").to_uppercase(),
    }
}

/// The full retail catalog in its canonical order.
pub fn retail_catalog() -> Result<Catalog, CatalogError> {
    Catalog::new(retail_tools())
}

pub fn retail_tools() -> Vec<ToolSpec> {
    vec![
        tool(
            "InventoryLookup",
            "Check store-level inventory, on-hand vs sellable, backroom, damages. Queries real-time stock levels for a SKU at a store, including units held in the backroom and damaged units pending removal.",
            &["sku", "store"],
            &["sku"],
            |a| {
                format!(
                    "Inventory for SKU {} at store {}: 12 on-hand, 9 sellable, 2 backroom, 1 damaged.",
                    inventory_sku(a),
                    arg(a, "store", "0001")
                )
            },
        ),
        tool(
            "PriceCompare",
            "Compare prices across stores/online and flag price match eligibility. Finds the lowest available price across physical stores and online listings and reports whether the item qualifies for a price match.",
            &["query"],
            &["query"],
            |a| {
                format!(
                    "Lowest price for '{}': $19.99 at Store 112, $21.49 online. Price match eligible.",
                    arg(a, "query", "")
                )
            },
        ),
        tool(
            "PromoEligibility",
            "Check member promo eligibility and exclusions. Verifies whether a member account qualifies for a promotion and lists excluded categories such as clearance and marketplace items.",
            &["member_id"],
            &["member_id"],
            |a| {
                format!(
                    "Member {}: eligible for 20% off weekend promo; excludes clearance and marketplace items.",
                    arg(a, "member_id", "unknown")
                )
            },
        ),
        tool(
            "ReplenishmentPlanner",
            "Suggest reorder qty using simple forecast and safety stock heuristics. Combines a short demand forecast with safety stock to recommend how many units to reorder.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "SKU {}: reorder recommended. Forecast 7d demand = 18, safety stock = 6, reorder qty = 20.",
                    arg(a, "sku", "UNK")
                )
            },
        ),
        tool(
            "StoreLocator",
            "Find nearest stores by location text or lat/lon. Accepts an address, zip code, city or coordinates and returns nearby stores sorted by distance.",
            &["near"],
            &["near"],
            |a| {
                format!(
                    "Closest stores near {}: Store 112 (0.9 mi), Store 203 (2.1 mi).",
                    arg(a, "near", "")
                )
            },
        ),
        tool(
            "ReturnPolicy",
            "Summarize return policy nuances for a given item. Covers return windows, receipt requirements and category exceptions for electronics and consumables.",
            &["item"],
            &["item"],
            |a| {
                format!(
                    "Return policy for {}: 90 days with receipt; electronics 30 days; opened consumables not returnable.",
                    arg(a, "item", "item")
                )
            },
        ),
        tool(
            "MembershipStatus",
            "Lookup club membership tier, renewal, and rewards. Returns the member's tier, renewal date and available rewards balance.",
            &["member_id"],
            &["member_id"],
            |a| {
                format!(
                    "Member {}: Plus tier, renewal due in 23 days; 3 rewards available ($12.40).",
                    arg(a, "member_id", "unknown")
                )
            },
        ),
        tool(
            "OrderStatus",
            "Track ecommerce order shipping status and ETA. Reports carrier, tracking number and estimated delivery date for an online order.",
            &["order_id"],
            &["order_id"],
            |a| {
                format!(
                    "Order {}: shipped, ETA in 2 days via UPS. Tracking 1Z999AA10123456784.",
                    arg(a, "order_id", "N/A")
                )
            },
        ),
        tool(
            "ProductCompatibility",
            "Check accessory compatibility with base product. Compares dimensions, connectors and requirements to confirm an add-on fits a base item.",
            &["base_item", "add_on"],
            &["base_item", "add_on"],
            |a| {
                format!(
                    "Compatibility: {} fits {}: YES (verified dimensions; adapter not required).",
                    arg(a, "add_on", ""),
                    arg(a, "base_item", "")
                )
            },
        ),
        tool(
            "ShelfSpaceOptimizer",
            "Optimize shelf facings by sales rank and velocity heuristics. Recommends facing counts and shelf placement per category to maximise sales per square foot.",
            &["category"],
            &["category"],
            |a| {
                format!(
                    "Planogram suggestion for {}: expand top seller facings from 3→5; move long-tail to lower shelf.",
                    arg(a, "category", "category")
                )
            },
        ),
        tool(
            "ProductSearch",
            "Search for products by name, description, or keywords. Runs a catalog-wide search and ranks matches by relevance, popularity and availability.",
            &["query"],
            &["query"],
            |a| {
                format!(
                    "Found 12 products matching '{}': Top 3 results - Item A ($29.99), Item B ($34.99), Item C ($19.99). All in stock.",
                    arg(a, "query", "")
                )
            },
        ),
        tool(
            "StockAlert",
            "Set up stock alerts to notify when inventory drops below threshold. Registers a notification that fires when a SKU's stock level falls under the given threshold.",
            &["sku", "threshold"],
            &["sku"],
            |a| {
                format!(
                    "Stock alert set for SKU {}: notify when inventory drops below {} units. Current stock: 8 units.",
                    arg(a, "sku", ""),
                    arg(a, "threshold", "5")
                )
            },
        ),
        tool(
            "VendorContact",
            "Get vendor contact information and lead times. Returns the supplier's email, phone number and typical fulfilment lead time.",
            &["vendor"],
            &["vendor"],
            |a| {
                format!(
                    "Vendor {}: Contact - sales@vendor.com, Phone: 555-0123, Lead time: 5-7 business days.",
                    arg(a, "vendor", "")
                )
            },
        ),
        tool(
            "ShippingCalculator",
            "Calculate shipping costs and delivery times for a destination. Prices standard, express and overnight delivery by destination zip code and package weight.",
            &["zip_code", "weight"],
            &["zip_code"],
            |a| {
                format!(
                    "Shipping to {} for {}lbs: Standard (5-7 days) $8.99, Express (2-3 days) $15.99, Overnight $29.99.",
                    arg(a, "zip_code", ""),
                    arg(a, "weight", "1")
                )
            },
        ),
        tool(
            "WarrantyChecker",
            "Check warranty information and extended warranty options for a product. Reports manufacturer coverage and the price of extended protection plans.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Warranty for SKU {}: 1-year manufacturer warranty, 90-day return window. Extended warranty available: +$29.99 for 2 years.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "GiftCardBalance",
            "Check gift card balance and expiration date. Verifies a gift card and returns its remaining balance, expiry and last use.",
            &["card_number"],
            &["card_number"],
            |a| {
                format!(
                    "Gift card {}: Balance $47.50, expires 12/31/2025. Last used: 01/15/2024.",
                    arg(a, "card_number", "")
                )
            },
        ),
        tool(
            "LoyaltyPoints",
            "Check member loyalty points balance and redemption options. Shows the points balance, how points convert to rewards and the next reward milestone.",
            &["member_id"],
            &["member_id"],
            |a| {
                format!(
                    "Member {}: 2,450 points available. 550 points = $5 reward. Next reward in 100 points.",
                    arg(a, "member_id", "")
                )
            },
        ),
        tool(
            "PriceHistory",
            "View price history and trends for a product over time. Compares the current price with 30-day and 90-day history to expose trends and recent drops.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Price history for SKU {}: Current $49.99, 30d avg $52.99, 90d low $44.99. Price dropped 5.7% this month.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "ProductReviews",
            "Get product reviews, ratings, and customer feedback. Aggregates star ratings, review counts and the most common customer comments.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Reviews for SKU {}: 4.3/5 stars (127 reviews). 78% recommend. Top feedback: 'Great quality, fast shipping'.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "BundleRecommendation",
            "Get recommended product bundles with savings information. Suggests bundles built around a base SKU and the savings each bundle offers.",
            &["base_sku"],
            &["base_sku"],
            |a| {
                format!(
                    "Bundle recommendations for {}: Bundle A (save $15), Bundle B (save $22), Bundle C (save $8). All items in stock.",
                    arg(a, "base_sku", "")
                )
            },
        ),
        tool(
            "CrossSellSuggestions",
            "Get cross-sell product suggestions based on purchase history. Lists items frequently bought together with the given SKU.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Customers who bought {} also purchased: Item X (45%), Item Y (32%), Item Z (28%). All available.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "InventoryTransfer",
            "Request inventory transfer between stores. Moves units of a SKU from one store to another and reports the transfer cost and arrival estimate.",
            &["from_store", "to_store", "sku", "qty"],
            &["from_store", "to_store", "sku"],
            |a| {
                format!(
                    "Transfer request: {} units of SKU {} from Store {} to Store {}. ETA: 2-3 days. Cost: $5.00.",
                    arg(a, "qty", "1"),
                    arg(a, "sku", ""),
                    arg(a, "from_store", ""),
                    arg(a, "to_store", "")
                )
            },
        ),
        tool(
            "DamagedItemReport",
            "Report damaged items and process credits or replacements. Logs a damage report for a SKU at a store, issues a credit and creates a replacement order.",
            &["sku", "store"],
            &["sku", "store"],
            |a| {
                format!(
                    "Damage report logged for SKU {} at Store {}. Credit issued: $24.99. Replacement order created.",
                    arg(a, "sku", ""),
                    arg(a, "store", "")
                )
            },
        ),
        tool(
            "RestockNotification",
            "Get restock notifications and expected delivery dates. Reports when an out-of-stock SKU is expected back and in what quantity.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Restock notification for SKU {}: Expected delivery 01/25/2024. Quantity: 50 units. Auto-reorder enabled.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "StoreHours",
            "Get store hours and holiday schedule information. Returns the weekly opening hours for a store and notes holiday variations.",
            &["store"],
            &["store"],
            |a| {
                format!(
                    "Store {} hours: Mon-Fri 9am-9pm, Sat 9am-10pm, Sun 10am-8pm. Holiday hours may vary.",
                    arg(a, "store", "")
                )
            },
        ),
        tool(
            "PaymentMethod",
            "Check payment method and status for an order. Shows which payment method was charged for an order and whether the charge is confirmed.",
            &["order_id"],
            &["order_id"],
            |a| {
                format!(
                    "Payment for order {}: Visa ending 4532, charged $89.99. Payment status: Confirmed. Receipt sent.",
                    arg(a, "order_id", "")
                )
            },
        ),
        tool(
            "RefundProcessor",
            "Process refunds for orders and return items. Refunds an amount to the original payment method and reports the processing time.",
            &["order_id", "amount"],
            &["order_id", "amount"],
            |a| {
                format!(
                    "Refund processed for order {}: ${} refunded to original payment method. Processing time: 3-5 business days.",
                    arg(a, "order_id", ""),
                    arg(a, "amount", "")
                )
            },
        ),
        tool(
            "ExchangePolicy",
            "Get exchange policy details for specific items. Explains exchange windows and conditions for size, colour or model swaps.",
            &["item"],
            &["item"],
            |a| {
                format!(
                    "Exchange policy for {}: 30 days with receipt, same item different size/color. No restocking fee for exchanges.",
                    arg(a, "item", "")
                )
            },
        ),
        tool(
            "ProductSpecs",
            "Get detailed product specifications and technical details. Returns dimensions, weight, materials and warranty for a SKU.",
            &["sku"],
            &["sku"],
            |a| {
                format!(
                    "Specs for SKU {}: Dimensions 12x8x4in, Weight 2.5lbs, Material: Plastic, Color: Black, Warranty: 1 year.",
                    arg(a, "sku", "")
                )
            },
        ),
        tool(
            "BulkOrderQuote",
            "Get pricing quotes for bulk orders with volume discounts. Prices a large-quantity order of a SKU with tiered discounts and shipping terms.",
            &["sku", "qty"],
            &["sku", "qty"],
            |a| {
                format!(
                    "Bulk quote for {} units of SKU {}: Unit price $19.99, Total $999.50 (5% discount). Free shipping on orders $500+.",
                    arg(a, "qty", ""),
                    arg(a, "sku", "")
                )
            },
        ),
    ]
}
