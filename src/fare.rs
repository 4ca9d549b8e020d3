//! Ride catalog and locale pricing.
//!
//! Base prices are fixed in USD; what the rider sees is base price times a
//! static per-country multiplier, formatted with that country's symbol.
//! Nothing here caches: the country can change at any login, so callers
//! recompute on demand.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideTier {
    Economy,
    Premium,
    Xl,
}

impl RideTier {
    pub const ALL: [Self; 3] = [Self::Economy, Self::Premium, Self::Xl];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::Premium => "premium",
            Self::Xl => "xl",
        }
    }
}

impl std::fmt::Display for RideTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One catalog entry. `base_price_usd` is never shown directly; run it
/// through [`price_for`] first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideOption {
    pub tier: RideTier,
    pub name: &'static str,
    pub base_price_usd: f64,
    pub eta_minutes: u32,
    pub icon: &'static str,
    pub car_model: &'static str,
    pub image_url: &'static str,
}

impl RideOption {
    #[must_use]
    pub const fn eta_seconds(&self) -> u64 {
        self.eta_minutes as u64 * 60
    }
}

pub const RIDE_CATALOG: [RideOption; 3] = [
    RideOption {
        tier: RideTier::Economy,
        name: "Genie Eco",
        base_price_usd: 12.50,
        eta_minutes: 4,
        icon: "\u{1F697}",
        car_model: "Toyota Corolla Hybrid",
        image_url: "https://upload.wikimedia.org/wikipedia/commons/thumb/d/d4/2019_Toyota_Corolla_Icon_Tech_HEV_CVT_1.8.jpg/800px-2019_Toyota_Corolla_Icon_Tech_HEV_CVT_1.8.jpg",
    },
    RideOption {
        tier: RideTier::Premium,
        name: "Genie Premium",
        base_price_usd: 28.00,
        eta_minutes: 7,
        icon: "\u{1F699}",
        car_model: "Mercedes-Benz S-Class",
        image_url: "https://upload.wikimedia.org/wikipedia/commons/thumb/1/15/Mercedes-Benz_W223_IMG_6839.jpg/800px-Mercedes-Benz_W223_IMG_6839.jpg",
    },
    RideOption {
        tier: RideTier::Xl,
        name: "Genie XL",
        base_price_usd: 35.00,
        eta_minutes: 9,
        icon: "\u{1F690}",
        car_model: "Mercedes-Benz V-Class",
        image_url: "https://upload.wikimedia.org/wikipedia/commons/thumb/c/c8/Mercedes-Benz_V_250_d_Avantgarde_Edition_lang_%28447%29_%E2%80%93_Heckansicht%2C_28._Februar_2015%2C_D%C3%BCsseldorf.jpg/800px-Mercedes-Benz_V_250_d_Avantgarde_Edition_lang_%28447%29_%E2%80%93_Heckansicht%2C_28._Februar_2015%2C_D%C3%BCsseldorf.jpg",
    },
];

#[must_use]
pub fn ride_option(tier: RideTier) -> &'static RideOption {
    match tier {
        RideTier::Economy => &RIDE_CATALOG[0],
        RideTier::Premium => &RIDE_CATALOG[1],
        RideTier::Xl => &RIDE_CATALOG[2],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrencySetting {
    pub code: &'static str,
    pub symbol: &'static str,
    pub multiplier: f64,
}

pub const USD: CurrencySetting = CurrencySetting {
    code: "USD",
    symbol: "$",
    multiplier: 1.0,
};

/// Exact-name match against the closed country list; anything else (or no
/// country at all) prices in the base currency.
#[must_use]
pub fn currency_for_country(country: Option<&str>) -> CurrencySetting {
    match country {
        Some("Morocco") => CurrencySetting {
            code: "MAD",
            symbol: "DH",
            multiplier: 10.0,
        },
        Some("United Kingdom") => CurrencySetting {
            code: "GBP",
            symbol: "\u{00A3}",
            multiplier: 0.8,
        },
        Some("Germany") | Some("France") => CurrencySetting {
            code: "EUR",
            symbol: "\u{20AC}",
            multiplier: 0.9,
        },
        Some("Japan") => CurrencySetting {
            code: "JPY",
            symbol: "\u{00A5}",
            multiplier: 150.0,
        },
        _ => USD,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedPrice {
    pub amount: f64,
    pub currency_code: String,
    pub display: String,
}

/// Displayed price for one tier in one country. Pure: identical inputs give
/// identical output, and the result is never stored back into the catalog.
#[must_use]
pub fn price_for(option: &RideOption, country: Option<&str>) -> FormattedPrice {
    let currency = currency_for_country(country);
    let amount = option.base_price_usd * currency.multiplier;
    FormattedPrice {
        amount,
        currency_code: currency.code.to_string(),
        display: format!("{} {:.2}", currency.symbol, amount),
    }
}
