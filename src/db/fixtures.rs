use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;

use super::{
    product::Product,
    tx::{FailureDetails, LineItem, Transaction},
};

fn product(id: &str, name: &str, price: rust_decimal::Decimal, category: &str, seed: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price,
        category: category.to_string(),
        image_url: format!("https://picsum.photos/seed/{seed}/400/300"),
    }
}

pub fn products() -> Vec<Product> {
    vec![
        product("1", "Artisan Latte", dec!(4.50), "Coffee", "coffee"),
        product("2", "Blueberry Muffin", dec!(3.25), "Pastry", "pastry"),
        product("3", "Cold Brew", dec!(4.00), "Coffee", "smoothie"),
        product("4", "Sesame Bagel", dec!(2.75), "Pastry", "bagel"),
    ]
}

fn line(name: &str, quantity: u32, price: rust_decimal::Decimal) -> LineItem {
    LineItem {
        name: name.to_string(),
        quantity,
        price,
    }
}

/// Sample history anchored at `now`: one hour, two hours and a day back.
pub fn transactions(now: DateTime<Utc>) -> Vec<Transaction> {
    vec![
        Transaction::completed(
            "tx_987654",
            dec!(7.75),
            now - Duration::hours(1),
            vec![
                line("Artisan Latte", 1, dec!(4.50)),
                line("Blueberry Muffin", 1, dec!(3.25)),
            ],
        ),
        Transaction::failed(
            "tx_123456",
            dec!(15.50),
            now - Duration::hours(2),
            vec![line("Bulk Coffee Beans", 1, dec!(15.50))],
            FailureDetails::new(
                "Stripe",
                "insufficient_funds",
                "The customer card has insufficient funds for this transaction.",
            ),
        ),
        Transaction::completed(
            "tx_456789",
            dec!(4.00),
            now - Duration::hours(24),
            vec![line("Cold Brew", 1, dec!(4.00))],
        ),
    ]
}
