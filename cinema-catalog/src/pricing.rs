use cinema_core::BookingError;
use cinema_shared::Show;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Added to the show's base cost for premium seats
    pub premium_surcharge: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            premium_surcharge: Decimal::new(5000, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatCategory {
    Standard,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatPrice {
    pub seat_number: String,
    pub category: SeatCategory,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub lines: Vec<SeatPrice>,
    pub total: Decimal,
}

/// Per-seat pricing: base show cost, plus a flat surcharge on premium seats
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn seat_category(&self, show: &Show, seat_number: &str) -> SeatCategory {
        if show.is_premium(seat_number) {
            SeatCategory::Premium
        } else {
            SeatCategory::Standard
        }
    }

    pub fn seat_price(&self, show: &Show, seat_number: &str) -> SeatPrice {
        let category = self.seat_category(show, seat_number);
        let price = match category {
            SeatCategory::Standard => show.base_cost,
            SeatCategory::Premium => show.base_cost + self.config.premium_surcharge,
        };
        SeatPrice {
            seat_number: seat_number.to_string(),
            category,
            price,
        }
    }

    pub fn quote(&self, show: &Show, seats: &[String]) -> PriceQuote {
        let lines: Vec<SeatPrice> = seats.iter().map(|seat| self.seat_price(show, seat)).collect();
        let total = lines.iter().map(|line| line.price).sum();
        PriceQuote { lines, total }
    }

    /// A supplied amount must equal the quoted total exactly
    pub fn verify_amount(&self, quote: &PriceQuote, supplied: Decimal) -> Result<(), BookingError> {
        if supplied <= Decimal::ZERO {
            return Err(BookingError::NonPositiveAmount(supplied));
        }
        if supplied != quote.total {
            return Err(BookingError::AmountMismatch {
                expected: quote.total,
                supplied,
            });
        }
        Ok(())
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}
