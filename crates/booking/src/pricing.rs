//! Fare computation.
//!
//! All amounts are computed server-side from these tariffs; a
//! client-supplied amount is never trusted anywhere in the saga.

use common::Money;
use messaging::events::{LuggageKind, PassengerSpec};

/// Flat fare per passenger.
pub const BASE_FARE_CENTS: i64 = 15_000;

/// Fee for a checked-in bag.
pub const CHECKED_BAG_FEE_CENTS: i64 = 4_000;

/// Fee for an oversized item.
pub const OVERSIZED_FEE_CENTS: i64 = 10_000;

/// Settlement currency for all payments.
pub const CURRENCY: &str = "INR";

/// Returns the fee for one luggage item. Cabin luggage is free.
pub fn luggage_fee(kind: LuggageKind) -> Money {
    match kind {
        LuggageKind::Cabin => Money::zero(),
        LuggageKind::Checked => Money::from_cents(CHECKED_BAG_FEE_CENTS),
        LuggageKind::Oversized => Money::from_cents(OVERSIZED_FEE_CENTS),
    }
}

/// Total fare for a booking request: base fare per passenger plus the
/// fee of every declared luggage item.
pub fn quote(passengers: &[PassengerSpec]) -> Money {
    passengers
        .iter()
        .map(|p| {
            let luggage: Money = p.luggage.iter().map(|item| luggage_fee(item.kind)).sum();
            Money::from_cents(BASE_FARE_CENTS) + luggage
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::events::LuggageSpec;

    fn passenger(seat: &str, luggage: Vec<LuggageSpec>) -> PassengerSpec {
        PassengerSpec {
            first_name: "Asha".to_string(),
            last_name: "Iyer".to_string(),
            email: "asha@example.com".to_string(),
            seat_number: seat.into(),
            luggage,
        }
    }

    #[test]
    fn test_base_fare_per_passenger() {
        let total = quote(&[passenger("12A", vec![]), passenger("12B", vec![])]);
        assert_eq!(total, Money::from_major(300));
    }

    #[test]
    fn test_luggage_surcharges() {
        let total = quote(&[passenger(
            "12A",
            vec![
                LuggageSpec {
                    kind: LuggageKind::Cabin,
                    weight_kg: 7.0,
                },
                LuggageSpec {
                    kind: LuggageKind::Checked,
                    weight_kg: 20.0,
                },
                LuggageSpec {
                    kind: LuggageKind::Oversized,
                    weight_kg: 28.5,
                },
            ],
        )]);
        // 150 base + 40 checked + 100 oversized; cabin is free.
        assert_eq!(total, Money::from_major(290));
    }

    #[test]
    fn test_empty_request_is_free() {
        assert!(quote(&[]).is_zero());
    }
}
