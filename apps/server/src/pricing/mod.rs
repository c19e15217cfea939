//! Tour price calculator.
//!
//! `compute_price` is a pure function over the static tables in [`tables`]:
//! base tour cost (base price × duration × participants), plus add-on
//! services, minus every discount rule that qualifies. Lookups fail open:
//! an unknown service contributes nothing instead of raising an error.

pub mod tables;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::AppError;
use crate::models::{PriceQuoteRequest, TourType};
pub use tables::{
    default_discount_rules, find_service, load_discount_rules, tour_type_info, DiscountKind,
    DiscountRule, ServiceCategory, ServiceOption, DEFAULT_SERVICES, TOUR_TYPES,
};

pub const CURRENCY: &str = "RUB";

/// Add-on picked for a single quote.
#[derive(Debug, Clone, Default)]
pub struct SelectedService {
    pub service_id: String,
    pub quantity: u32,
    pub variant_id: Option<String>,
    pub custom_price: Option<f64>,
}

/// Callers must enforce `participants >= 1` and `duration >= 1` beforehand.
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub tour_type: TourType,
    pub participants: u32,
    pub duration: u32,
    pub services: Vec<SelectedService>,
}

impl TryFrom<PriceQuoteRequest> for PriceRequest {
    type Error = AppError;

    fn try_from(req: PriceQuoteRequest) -> Result<Self, Self::Error> {
        let tour_type = req.tour_type.parse::<TourType>().map_err(AppError::BadRequest)?;
        let services = req
            .services
            .into_iter()
            .map(|s| SelectedService {
                service_id: s.service_id,
                quantity: u32::try_from(s.quantity).unwrap_or_default(),
                variant_id: s.variant_id,
                custom_price: s.custom_price,
            })
            .collect();

        Ok(PriceRequest {
            tour_type,
            participants: to_count(req.participants),
            duration: to_count(req.duration),
            services,
        })
    }
}

fn to_count(value: Option<i64>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(1).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCategory {
    BaseTour,
    Service(ServiceCategory),
}

impl LineCategory {
    pub fn code(&self) -> &'static str {
        match self {
            LineCategory::BaseTour => "BASE_TOUR",
            LineCategory::Service(category) => category.code(),
        }
    }
}

impl Serialize for LineCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownLine {
    pub category: LineCategory,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub currency: &'static str,
    pub breakdown: Vec<BreakdownLine>,
}

/// Price a tour request at instant `now` against `rules`.
pub fn compute_price(
    request: &PriceRequest,
    rules: &[DiscountRule],
    now: DateTime<Utc>,
) -> PriceBreakdown {
    let tour = tour_type_info(request.tour_type);
    let base_price = tour.map_or(0.0, |t| t.base_price);
    let tour_cost = base_price * f64::from(request.duration) * f64::from(request.participants);

    let resolved: Vec<(&'static ServiceOption, &SelectedService)> = request
        .services
        .iter()
        .filter_map(|selected| find_service(&selected.service_id).map(|option| (option, selected)))
        .collect();

    let services_cost: f64 = resolved
        .iter()
        .map(|(option, selected)| unit_price(option, selected) * f64::from(selected.quantity))
        .sum();

    let subtotal = tour_cost + services_cost;
    let discount = total_discount(rules, request, subtotal, now);
    let total = (subtotal - discount).max(0.0);

    let mut breakdown = vec![BreakdownLine {
        category: LineCategory::BaseTour,
        name: tour.map_or("Неизвестный тур", |t| t.name).to_string(),
        quantity: request.duration,
        unit_price: base_price,
        total_price: tour_cost,
    }];
    breakdown.extend(service_lines(&resolved));

    PriceBreakdown {
        subtotal,
        discount,
        total,
        currency: CURRENCY,
        breakdown,
    }
}

/// Manual override, then the chosen variant, then the service's own price.
fn unit_price(option: &ServiceOption, selected: &SelectedService) -> f64 {
    if let Some(price) = selected.custom_price {
        return price;
    }
    selected
        .variant_id
        .as_deref()
        .and_then(|id| option.variant(id))
        .map_or(option.price, |variant| variant.price)
}

/// Sum of every qualifying rule. Rules stack additively, in any order.
fn total_discount(
    rules: &[DiscountRule],
    request: &PriceRequest,
    subtotal: f64,
    now: DateTime<Utc>,
) -> f64 {
    rules
        .iter()
        .filter(|rule| rule_applies(rule, request, subtotal, now))
        .map(|rule| match rule.kind {
            DiscountKind::Percentage => subtotal * rule.value / 100.0,
            DiscountKind::Fixed => rule.value,
        })
        .sum()
}

fn rule_applies(rule: &DiscountRule, request: &PriceRequest, subtotal: f64, now: DateTime<Utc>) -> bool {
    let c = &rule.conditions;
    if c.min_participants.is_some_and(|min| request.participants < min) {
        return false;
    }
    if c.min_duration.is_some_and(|min| request.duration < min) {
        return false;
    }
    if c.min_amount.is_some_and(|min| subtotal < min) {
        return false;
    }
    if let Some(types) = &c.tour_types {
        if !types.contains(&request.tour_type) {
            return false;
        }
    }
    let today = now.date_naive();
    rule.valid_from <= today && today <= rule.valid_to
}

/// One line per resolved service, grouped by category in order of first appearance.
fn service_lines(resolved: &[(&'static ServiceOption, &SelectedService)]) -> Vec<BreakdownLine> {
    let mut groups: Vec<(ServiceCategory, Vec<BreakdownLine>)> = Vec::new();
    for (option, selected) in resolved {
        let price = unit_price(option, selected);
        let line = BreakdownLine {
            category: LineCategory::Service(option.category),
            name: option.name.to_string(),
            quantity: selected.quantity,
            unit_price: price,
            total_price: price * f64::from(selected.quantity),
        };
        match groups.iter_mut().find(|(category, _)| *category == option.category) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((option.category, vec![line])),
        }
    }
    groups.into_iter().flat_map(|(_, lines)| lines).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tables::DiscountConditions;
    use chrono::{NaiveDate, TimeZone};

    fn in_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn in_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn request(tour_type: TourType, participants: u32, duration: u32) -> PriceRequest {
        PriceRequest {
            tour_type,
            participants,
            duration,
            services: vec![],
        }
    }

    fn pick(id: &str, quantity: u32) -> SelectedService {
        SelectedService {
            service_id: id.into(),
            quantity,
            ..Default::default()
        }
    }

    fn percentage(id: &str, value: f64) -> DiscountRule {
        DiscountRule {
            id: id.into(),
            name: id.into(),
            kind: DiscountKind::Percentage,
            value,
            conditions: DiscountConditions::default(),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_base_cost_without_discounts() {
        for t in TourType::ALL {
            let base = tour_type_info(t).unwrap().base_price;
            let quote = compute_price(&request(t, 3, 2), &default_discount_rules(), in_2026());
            assert_eq!(quote.discount, 0.0);
            assert_eq!(quote.total, base * 2.0 * 3.0);
            assert_eq!(quote.currency, "RUB");
        }
    }

    #[test]
    fn test_end_to_end_excursion_with_both_rules() {
        let quote = compute_price(
            &request(TourType::Excursion, 4, 3),
            &default_discount_rules(),
            in_2024(),
        );
        assert_eq!(quote.subtotal, 180_000.0);
        assert_eq!(quote.discount, 45_000.0);
        assert_eq!(quote.total, 135_000.0);
    }

    #[test]
    fn test_rules_outside_window_ignored() {
        let quote = compute_price(
            &request(TourType::Excursion, 4, 3),
            &default_discount_rules(),
            in_2026(),
        );
        assert_eq!(quote.discount, 0.0);
        assert_eq!(quote.total, 180_000.0);
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let rules = default_discount_rules();
        let req = request(TourType::Excursion, 4, 1);
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(compute_price(&req, &rules, first).discount > 0.0);
        assert!(compute_price(&req, &rules, last).discount > 0.0);
        assert_eq!(compute_price(&req, &rules, after).discount, 0.0);
    }

    #[test]
    fn test_percentage_rules_stack_additively() {
        let rules = vec![percentage("a", 10.0), percentage("b", 15.0)];
        let quote = compute_price(&request(TourType::Excursion, 1, 1), &rules, in_2026());
        assert_eq!(quote.subtotal, 15_000.0);
        assert_eq!(quote.discount, 3_750.0);
        assert_eq!(quote.total, 11_250.0);

        let reversed: Vec<DiscountRule> = rules.into_iter().rev().collect();
        let again = compute_price(&request(TourType::Excursion, 1, 1), &reversed, in_2026());
        assert_eq!(again.discount, quote.discount);
    }

    #[test]
    fn test_total_never_negative() {
        let mut big = percentage("huge", 0.0);
        big.kind = DiscountKind::Fixed;
        big.value = 1_000_000.0;
        let rules = vec![big, percentage("p", 80.0), percentage("q", 80.0)];
        let quote = compute_price(&request(TourType::Active, 1, 1), &rules, in_2026());
        assert!(quote.discount > quote.subtotal);
        assert_eq!(quote.total, 0.0);
    }

    #[test]
    fn test_unknown_service_ignored() {
        let plain = compute_price(&request(TourType::Cultural, 2, 2), &[], in_2026());
        let mut req = request(TourType::Cultural, 2, 2);
        req.services.push(pick("helicopter", 3));
        let quote = compute_price(&req, &[], in_2026());
        assert_eq!(quote.subtotal, plain.subtotal);
        assert_eq!(quote.breakdown.len(), 1);
    }

    #[test]
    fn test_custom_price_beats_variant() {
        let mut req = request(TourType::Excursion, 1, 1);
        req.services.push(SelectedService {
            variant_id: Some("premium".into()),
            custom_price: Some(1_000.0),
            ..pick("airport_transfer", 2)
        });
        let quote = compute_price(&req, &[], in_2026());
        assert_eq!(quote.subtotal, 15_000.0 + 2_000.0);
        assert_eq!(quote.breakdown[1].unit_price, 1_000.0);
    }

    #[test]
    fn test_variant_beats_base_price() {
        let mut req = request(TourType::Excursion, 1, 1);
        req.services.push(SelectedService {
            variant_id: Some("pottery".into()),
            ..pick("master_class", 3)
        });
        let quote = compute_price(&req, &[], in_2026());
        assert_eq!(quote.breakdown[1].unit_price, 1_200.0);
        assert_eq!(quote.breakdown[1].total_price, 3_600.0);
    }

    #[test]
    fn test_unknown_variant_falls_back_to_base_price() {
        let mut req = request(TourType::Excursion, 1, 1);
        req.services.push(SelectedService {
            variant_id: Some("helicopter".into()),
            ..pick("airport_transfer", 1)
        });
        let quote = compute_price(&req, &[], in_2026());
        assert_eq!(quote.breakdown[1].unit_price, 2_000.0);
    }

    #[test]
    fn test_breakdown_groups_by_category() {
        let mut req = request(TourType::Active, 2, 3);
        req.services = vec![
            pick("lunch", 6),
            pick("rafting", 2),
            pick("dinner", 6),
            pick("trekking", 2),
        ];
        let quote = compute_price(&req, &[], in_2026());
        let categories: Vec<&str> = quote.breakdown.iter().map(|l| l.category.code()).collect();
        assert_eq!(
            categories,
            vec!["BASE_TOUR", "FOOD", "FOOD", "ACTIVITY", "ACTIVITY"]
        );
        assert_eq!(quote.breakdown[0].quantity, 3);
        assert_eq!(quote.breakdown[0].unit_price, 25_000.0);
        assert_eq!(quote.breakdown[0].total_price, 150_000.0);

        let lines_total: f64 = quote.breakdown.iter().map(|l| l.total_price).sum();
        assert_eq!(lines_total, quote.subtotal);
    }

    #[test]
    fn test_conditions_gate_rules() {
        let mut min_amount = percentage("amount", 5.0);
        min_amount.conditions.min_amount = Some(100_000.0);
        let mut only_active = percentage("active", 5.0);
        only_active.conditions.tour_types = Some(vec![TourType::Active]);
        let rules = vec![min_amount, only_active];

        let small = compute_price(&request(TourType::Excursion, 1, 1), &rules, in_2026());
        assert_eq!(small.discount, 0.0);

        let active = compute_price(&request(TourType::Active, 1, 1), &rules, in_2026());
        assert_eq!(active.discount, 1_250.0);

        let big_active = compute_price(&request(TourType::Active, 4, 1), &rules, in_2026());
        assert_eq!(big_active.discount, 10_000.0);
    }

    #[test]
    fn test_empty_tour_type_list_never_matches() {
        let mut rule = percentage("none", 50.0);
        rule.conditions.tour_types = Some(vec![]);
        let quote = compute_price(&request(TourType::Active, 1, 1), &[rule], in_2026());
        assert_eq!(quote.discount, 0.0);
    }

    #[test]
    fn test_category_serializes_as_code() {
        let json = serde_json::to_value(LineCategory::Service(ServiceCategory::Food)).unwrap();
        assert_eq!(json, "FOOD");
        let json = serde_json::to_value(LineCategory::BaseTour).unwrap();
        assert_eq!(json, "BASE_TOUR");
    }
}
