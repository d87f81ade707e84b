//! Closed vocabularies carried by a transaction record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Chf,
    Cad,
    Aud,
    Cny,
    Inr,
    Brl,
}

impl Currency {
    pub const ALL: [Currency; 10] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Chf,
        Currency::Cad,
        Currency::Aud,
        Currency::Cny,
        Currency::Inr,
        Currency::Brl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Chf => "CHF",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Cny => "CNY",
            Currency::Inr => "INR",
            Currency::Brl => "BRL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Grocery,
    Electronics,
    Travel,
    Restaurant,
    Entertainment,
    Clothing,
    Health,
    Fuel,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Grocery,
        Category::Electronics,
        Category::Travel,
        Category::Restaurant,
        Category::Entertainment,
        Category::Clothing,
        Category::Health,
        Category::Fuel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Grocery => "GROCERY",
            Category::Electronics => "ELECTRONICS",
            Category::Travel => "TRAVEL",
            Category::Restaurant => "RESTAURANT",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Clothing => "CLOTHING",
            Category::Health => "HEALTH",
            Category::Fuel => "FUEL",
        }
    }

    /// Merchants that trade in this category.
    pub fn merchants(&self) -> Vec<Merchant> {
        Merchant::ALL
            .iter()
            .copied()
            .filter(|m| m.category() == *self)
            .collect()
    }
}

/// Merchant codes. Every merchant belongs to exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Merchant {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M7,
    M8,
    M9,
    M10,
    M11,
    M12,
    M13,
    M14,
    M15,
    M16,
}

impl Merchant {
    pub const ALL: [Merchant; 16] = [
        Merchant::M1,
        Merchant::M2,
        Merchant::M3,
        Merchant::M4,
        Merchant::M5,
        Merchant::M6,
        Merchant::M7,
        Merchant::M8,
        Merchant::M9,
        Merchant::M10,
        Merchant::M11,
        Merchant::M12,
        Merchant::M13,
        Merchant::M14,
        Merchant::M15,
        Merchant::M16,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Merchant::M1 => "M1",
            Merchant::M2 => "M2",
            Merchant::M3 => "M3",
            Merchant::M4 => "M4",
            Merchant::M5 => "M5",
            Merchant::M6 => "M6",
            Merchant::M7 => "M7",
            Merchant::M8 => "M8",
            Merchant::M9 => "M9",
            Merchant::M10 => "M10",
            Merchant::M11 => "M11",
            Merchant::M12 => "M12",
            Merchant::M13 => "M13",
            Merchant::M14 => "M14",
            Merchant::M15 => "M15",
            Merchant::M16 => "M16",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Merchant::M1 | Merchant::M2 => Category::Grocery,
            Merchant::M3 | Merchant::M4 => Category::Electronics,
            Merchant::M5 | Merchant::M6 => Category::Travel,
            Merchant::M7 | Merchant::M8 => Category::Restaurant,
            Merchant::M9 | Merchant::M10 => Category::Entertainment,
            Merchant::M11 | Merchant::M12 => Category::Clothing,
            Merchant::M13 | Merchant::M14 => Category::Health,
            Merchant::M15 | Merchant::M16 => Category::Fuel,
        }
    }
}

macro_rules! impl_code {
    ($ty:ident, $field:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == s)
                    .ok_or_else(|| ValidationError::new($field, format!("unknown code '{}'", s)))
            }
        }
    };
}

impl_code!(Currency, "currency");
impl_code!(Category, "category");
impl_code!(Merchant, "merchant");
