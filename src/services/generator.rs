//! Synthetic transaction traffic for demos and load runs.

use bigdecimal::BigDecimal;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Category, Currency, Merchant, Transaction};

/// Share of generated transactions that look suspicious.
pub const SUSPICIOUS_RATE: f64 = 0.1;

/// Spending habits of one synthetic customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub user_id: String,
    pub mean_spending: f64,
    pub preferred_currency: Currency,
    pub frequent_category: Category,
    pub infrequent_category: Category,
}

impl CustomerProfile {
    /// Random profile; the two categories always differ.
    pub fn random<R: Rng>(user_id: impl Into<String>, rng: &mut R) -> Self {
        let mut categories = Category::ALL;
        categories.shuffle(rng);

        Self {
            user_id: user_id.into(),
            mean_spending: rng.gen_range(20.0..500.0),
            preferred_currency: Currency::ALL[rng.gen_range(0..Currency::ALL.len())],
            frequent_category: categories[0],
            infrequent_category: categories[1],
        }
    }
}

pub trait TransactionGenerator {
    fn generate(&mut self, customer: &CustomerProfile) -> Transaction;
}

pub struct RandomTransactionGenerator<R> {
    rng: R,
}

impl RandomTransactionGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomTransactionGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Profiles `U1..=Un`.
    pub fn customers(&mut self, count: usize) -> Vec<CustomerProfile> {
        (1..=count)
            .map(|n| CustomerProfile::random(format!("U{}", n), &mut self.rng))
            .collect()
    }

    fn suspicious_currency(&mut self, preferred: Currency) -> Currency {
        let others: Vec<Currency> = Currency::ALL
            .iter()
            .copied()
            .filter(|c| *c != preferred)
            .collect();
        others.choose(&mut self.rng).copied().unwrap_or(preferred)
    }

    fn merchant_in(&mut self, category: Category) -> Merchant {
        let merchants = category.merchants();
        match merchants.choose(&mut self.rng) {
            Some(merchant) => *merchant,
            None => Merchant::ALL[0],
        }
    }
}

impl<R: Rng> TransactionGenerator for RandomTransactionGenerator<R> {
    fn generate(&mut self, customer: &CustomerProfile) -> Transaction {
        let suspicious = self.rng.gen_bool(SUSPICIOUS_RATE);

        let factor = if suspicious {
            2.0 + self.rng.gen::<f64>()
        } else {
            0.5 + self.rng.gen::<f64>()
        };
        let (category, currency) = if suspicious {
            (
                customer.infrequent_category,
                self.suspicious_currency(customer.preferred_currency),
            )
        } else {
            (customer.frequent_category, customer.preferred_currency)
        };
        let merchant = self.merchant_in(category);

        Transaction::new(
            Uuid::new_v4().to_string(),
            customer.user_id.clone(),
            to_amount(customer.mean_spending * factor),
            currency,
            merchant,
            category,
        )
    }
}

/// Two-decimal amount, never below one cent.
fn to_amount(value: f64) -> BigDecimal {
    let cents = ((value * 100.0).round() as i64).max(1);
    BigDecimal::new(cents.into(), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::ToPrimitive;

    fn customer() -> CustomerProfile {
        CustomerProfile {
            user_id: "U1".into(),
            mean_spending: 100.0,
            preferred_currency: Currency::Usd,
            frequent_category: Category::Grocery,
            infrequent_category: Category::Travel,
        }
    }

    #[test]
    fn test_generated_records_follow_customer_profile() {
        let mut generator = RandomTransactionGenerator::seeded(7);
        let customer = customer();

        let mut suspicious = 0;
        for _ in 0..1000 {
            let tx = generator.generate(&customer);
            tx.validate().unwrap();
            assert!(!tx.is_fraud);
            assert_eq!(tx.merchant.category(), tx.category);
            assert!(Uuid::parse_str(&tx.transaction_id).is_ok());

            let amount = tx.amount.to_f64().unwrap();
            if tx.category == Category::Travel {
                suspicious += 1;
                assert_ne!(tx.currency, Currency::Usd);
                assert!((200.0..=300.0).contains(&amount));
            } else {
                assert_eq!(tx.category, Category::Grocery);
                assert_eq!(tx.currency, Currency::Usd);
                assert!((50.0..=150.0).contains(&amount));
            }
        }

        // 10% expected; wide bounds keep the seed from mattering.
        assert!((40..=200).contains(&suspicious), "suspicious = {}", suspicious);
    }

    #[test]
    fn test_amount_has_two_decimals() {
        assert_eq!(to_amount(120.456).to_string(), "120.46");
        assert_eq!(to_amount(0.0).to_string(), "0.01");
    }

    #[test]
    fn test_customers_have_distinct_categories() {
        let mut generator = RandomTransactionGenerator::seeded(1);
        let customers = generator.customers(20);

        assert_eq!(customers.len(), 20);
        assert_eq!(customers[0].user_id, "U1");
        for customer in customers {
            assert_ne!(customer.frequent_category, customer.infrequent_category);
        }
    }
}
