use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of marketplaces shelfwatch knows how to scrape.
///
/// Submissions for any other seller are rejected at validation time;
/// whether an *adapter* exists for a seller is a separate, runtime
/// question answered by the [`crate::adapter::AdapterRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seller {
    Amazon,
    Flipkart,
    Myntra,
    Ajio,
    Nykaa,
    Snapdeal,
    Meesho,
    Pharmeasy,
    Netmeds,
    #[serde(rename = "one_mg")]
    OneMg,
}

impl Seller {
    pub const ALL: [Seller; 10] = [
        Seller::Amazon,
        Seller::Flipkart,
        Seller::Myntra,
        Seller::Ajio,
        Seller::Nykaa,
        Seller::Snapdeal,
        Seller::Meesho,
        Seller::Pharmeasy,
        Seller::Netmeds,
        Seller::OneMg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Seller::Amazon => "amazon",
            Seller::Flipkart => "flipkart",
            Seller::Myntra => "myntra",
            Seller::Ajio => "ajio",
            Seller::Nykaa => "nykaa",
            Seller::Snapdeal => "snapdeal",
            Seller::Meesho => "meesho",
            Seller::Pharmeasy => "pharmeasy",
            Seller::Netmeds => "netmeds",
            Seller::OneMg => "one_mg",
        }
    }
}

impl fmt::Display for Seller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Seller {
    type Err = String;

    /// Parses a seller id, tolerating case, separators, and the aliases
    /// sellers are commonly submitted under ("1mg", "amazon.in", …).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "amazon" | "amazonin" => Ok(Seller::Amazon),
            "flipkart" => Ok(Seller::Flipkart),
            "myntra" => Ok(Seller::Myntra),
            "ajio" => Ok(Seller::Ajio),
            "nykaa" => Ok(Seller::Nykaa),
            "snapdeal" => Ok(Seller::Snapdeal),
            "meesho" => Ok(Seller::Meesho),
            "pharmeasy" => Ok(Seller::Pharmeasy),
            "netmeds" => Ok(Seller::Netmeds),
            "onemg" | "1mg" | "tata1mg" => Ok(Seller::OneMg),
            _ => Err(format!("Unknown seller: {}", s)),
        }
    }
}
