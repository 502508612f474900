use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    OneWayMorning,
    OneWayEvening,
    RoundTrip,
}

impl TransportType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oneWayMorning" => Some(Self::OneWayMorning),
            "oneWayEvening" => Some(Self::OneWayEvening),
            "roundTrip" => Some(Self::RoundTrip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionType {
    Monthly,
    Annual,
}

impl SubscriptionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "annual" => Some(Self::Annual),
            _ => None,
        }
    }
}

/// Flat tier table in base currency units. Both one-way directions price
/// identically; annual runs nine school months.
pub fn quote(transport: TransportType, subscription: SubscriptionType) -> f64 {
    use SubscriptionType::*;
    use TransportType::*;
    match (transport, subscription) {
        (OneWayMorning | OneWayEvening, Monthly) => 300.0,
        (RoundTrip, Monthly) => 500.0,
        (OneWayMorning | OneWayEvening, Annual) => 2700.0,
        (RoundTrip, Annual) => 4500.0,
    }
}

/// Quote from wire strings. Unknown strings surface as `UnknownPricingTier`
/// rather than defaulting to zero.
pub fn quote_for(transport: &str, subscription: &str) -> Result<f64, EngineError> {
    let (Some(t), Some(s)) = (
        TransportType::parse(transport),
        SubscriptionType::parse(subscription),
    ) else {
        return Err(EngineError::UnknownPricingTier {
            transport: transport.to_string(),
            subscription: subscription.to_string(),
        });
    };
    Ok(quote(t, s))
}

/// Per-sibling price within one household submission batch, 1-based index:
/// 1st pays 100%, 2nd 90%, 3rd and beyond 80%. Each sibling is priced
/// independently from the unit price; the tiers never compound.
pub fn sibling_price(unit: f64, sibling_index: usize) -> f64 {
    let pct = match sibling_index {
        0 | 1 => 1.0,
        2 => 0.9,
        _ => 0.8,
    };
    round2(unit * pct)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
