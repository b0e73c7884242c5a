//! Shipping quotes for donation conversations: a weight/package tariff with
//! remote-zone and 24h-express surcharges, plus the great-circle distance
//! between the donation and the receiving NGO.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use redona_db::Database;
use redona_db::conversations as store;
use redona_db::models::{DonationRow, OngRow};
use redona_db::queries;
use redona_geo::{format_address, haversine_km, round2};
use redona_types::api::ShippingQuote;
use redona_types::models::ConversationSubject;

use crate::conversations::participant_party;
use crate::convert::{effective_ong, subject_of};
use crate::coordinates;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::{AppState, run_blocking};

pub const CURRENCY: &str = "EUR";

const REMOTE_ZONE_RATE: f64 = 0.15;
const EXPRESS_RATE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffBracket {
    pub max_weight_kg: f64,
    /// Price for 1, 2, 3 and 4 packages.
    pub prices: [f64; 4],
    /// Added per package beyond the fourth.
    pub extra_per_package: f64,
}

const fn bracket(max_weight_kg: f64, prices: [f64; 4], extra_per_package: f64) -> TariffBracket {
    TariffBracket {
        max_weight_kg,
        prices,
        extra_per_package,
    }
}

/// Ascending by weight.
pub const TARIFF: [TariffBracket; 8] = [
    bracket(1.0, [4.9, 7.9, 10.9, 13.9], 2.5),
    bracket(3.0, [5.9, 8.9, 11.9, 14.9], 3.0),
    bracket(5.0, [6.9, 9.9, 12.9, 15.9], 3.5),
    bracket(10.0, [8.9, 12.9, 16.9, 20.9], 4.5),
    bracket(15.0, [10.9, 15.9, 20.9, 25.9], 5.5),
    bracket(20.0, [12.9, 18.9, 24.9, 30.9], 6.5),
    bracket(30.0, [15.9, 23.9, 31.9, 39.9], 8.0),
    bracket(40.0, [20.9, 30.9, 40.9, 50.9], 10.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipmentSpec {
    pub weight_kg: f64,
    pub packages: u32,
    pub remote_zone: bool,
    pub express_24h: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    pub bracket_max_kg: f64,
    pub base: f64,
    pub remote_surcharge: f64,
    pub express_surcharge: f64,
    pub amount: f64,
}

/// Raw query string. Everything arrives as text so that malformed numbers get
/// the usual JSON error instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuery {
    pub weight_kg: Option<String>,
    pub packages: Option<String>,
    pub remote_zone: Option<String>,
    #[serde(rename = "express24h")]
    pub express_24h: Option<String>,
}

/// `true`, `1`, `yes` and `si` (any case) are true; anything else is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "si")
    )
}

pub fn parse_shipment(query: &ShippingQuery) -> Result<ShipmentSpec, ApiError> {
    let weight_kg = query
        .weight_kg
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|w| w.is_finite() && *w > 0.0)
        .ok_or_else(|| ApiError::validation("weightKg must be a number greater than 0"))?;

    let packages = query
        .packages
        .as_deref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .ok_or_else(|| ApiError::validation("packages must be an integer of at least 1"))?;

    Ok(ShipmentSpec {
        weight_kg,
        packages,
        remote_zone: parse_flag(query.remote_zone.as_deref()),
        express_24h: parse_flag(query.express_24h.as_deref()),
    })
}

pub fn select_bracket(weight_kg: f64) -> Option<&'static TariffBracket> {
    TARIFF.iter().find(|b| b.max_weight_kg >= weight_kg)
}

pub fn compute_tariff(shipment: &ShipmentSpec) -> Result<Tariff, ApiError> {
    let bracket = select_bracket(shipment.weight_kg).ok_or_else(|| {
        ApiError::validation("Shipments over 40 kg need special transport; contact us for a quote")
    })?;

    let base = match shipment.packages {
        0 => return Err(ApiError::validation("packages must be an integer of at least 1")),
        n @ 1..=4 => bracket.prices[(n - 1) as usize],
        n => bracket.prices[3] + f64::from(n - 4) * bracket.extra_per_package,
    };
    let remote_surcharge = if shipment.remote_zone { base * REMOTE_ZONE_RATE } else { 0.0 };
    let express_surcharge = if shipment.express_24h { base * EXPRESS_RATE } else { 0.0 };

    // Only the reported figures are rounded; the total uses the exact parts.
    Ok(Tariff {
        bracket_max_kg: bracket.max_weight_kg,
        base: round2(base),
        remote_surcharge: round2(remote_surcharge),
        express_surcharge: round2(express_surcharge),
        amount: round2(base + remote_surcharge + express_surcharge),
    })
}

/// Everything the quote needs from the database.
pub struct ShippingContext {
    pub donation: DonationRow,
    pub ong: OngRow,
    pub donor_location: Option<String>,
}

pub fn load_context(db: &Database, actor: &Actor, conversation_id: &str) -> Result<ShippingContext, ApiError> {
    db.transaction(|tx| {
        let row = store::get_conversation(tx, conversation_id)?
            .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
        let subject = subject_of(&row)?;
        if participant_party(actor, &row, &subject).is_none() {
            return Err(ApiError::forbidden("You are not a participant in this conversation"));
        }
        let ConversationSubject::Donation { donation_id } = &subject else {
            return Err(ApiError::validation(
                "Shipping estimates are only available for donation conversations",
            ));
        };

        let donation = queries::get_donation(tx, donation_id)?
            .ok_or_else(|| ApiError::not_found("Donation not found"))?;
        let ong_id = donation
            .assigned_ong_id
            .clone()
            .or_else(|| effective_ong(&row, &subject))
            .ok_or_else(|| ApiError::not_found("ONG not found"))?;
        let ong = queries::get_ong(tx, &ong_id)?.ok_or_else(|| ApiError::not_found("ONG not found"))?;
        let donor_location = queries::get_user(tx, &donation.donor_id)?.and_then(|u| u.location);

        Ok(ShippingContext {
            donation,
            ong,
            donor_location,
        })
    })
}

fn origin_label(donation: &DonationRow, donor_location: Option<&str>) -> String {
    let city = Some(donation.city.trim())
        .filter(|c| !c.is_empty())
        .or(donor_location);
    format_address(&[
        donation.address.as_deref(),
        donation.postal_code.as_deref(),
        city,
        donation.province.as_deref(),
    ])
}

fn destination_label(ong: &OngRow) -> String {
    format_address(&[
        ong.address.as_deref(),
        ong.postal_code.as_deref(),
        Some(ong.city.as_str()),
        ong.province.as_deref(),
    ])
}

pub async fn estimate(
    state: &AppState,
    actor: Actor,
    conversation_id: String,
    query: ShippingQuery,
) -> Result<ShippingQuote, ApiError> {
    let shipment = parse_shipment(&query)?;
    let tariff = compute_tariff(&shipment)?;

    let ctx = run_blocking(state, move |db| load_context(db, &actor, &conversation_id)).await?;

    let origin = coordinates::resolve_donation(state, &ctx.donation).await;
    let destination = coordinates::resolve_ong(state, &ctx.ong).await;
    let distance_km = match (origin, destination) {
        (Some(from), Some(to)) => Some(round2(haversine_km(from, to))),
        _ => {
            debug!("No distance for donation {}: coordinates unresolved", ctx.donation.id);
            None
        }
    };

    Ok(ShippingQuote {
        amount: tariff.amount,
        currency: CURRENCY,
        distance_km,
        weight_kg: shipment.weight_kg,
        packages: shipment.packages,
        weight_bracket_max_kg: tariff.bracket_max_kg,
        base_amount: tariff.base,
        remote_surcharge: tariff.remote_surcharge,
        express_surcharge: tariff.express_surcharge,
        is_remote_zone: shipment.remote_zone,
        is_express24h: shipment.express_24h,
        origin: origin_label(&ctx.donation, ctx.donor_location.as_deref()),
        destination: destination_label(&ctx.ong),
    })
}

/// GET /conversations/{id}/shipping-cost?weightKg=&packages=&remoteZone=&express24h=
pub async fn get_shipping_cost(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Query(query): Query<ShippingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = estimate(&state, actor, id, query).await?;
    Ok(Json(quote))
}
