//! Static reference data for the price calculator: tour types, add-on
//! services and the built-in discount rules.

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::TourType;

// ── Tour types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourTypeInfo {
    pub id: TourType,
    pub name: &'static str,
    pub description: &'static str,
    /// RUB per person per day.
    pub base_price: f64,
}

pub const TOUR_TYPES: &[TourTypeInfo] = &[
    TourTypeInfo {
        id: TourType::Excursion,
        name: "Экскурсионные туры",
        description: "Знакомство с достопримечательностями и историей Дагестана",
        base_price: 15_000.0,
    },
    TourTypeInfo {
        id: TourType::Active,
        name: "Активный отдых",
        description: "Джиппинг, треккинг, рафтинг и экстремальные приключения",
        base_price: 25_000.0,
    },
    TourTypeInfo {
        id: TourType::Cultural,
        name: "Культурные туры",
        description: "Погружение в традиции, кухню и быт дагестанского народа",
        base_price: 18_000.0,
    },
    TourTypeInfo {
        id: TourType::Combined,
        name: "Комбинированные туры",
        description: "Сочетание экскурсий, активного отдыха и культурных программ",
        base_price: 30_000.0,
    },
];

pub fn tour_type_info(tour_type: TourType) -> Option<&'static TourTypeInfo> {
    TOUR_TYPES.iter().find(|t| t.id == tour_type)
}

// ── Add-on services ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceCategory {
    Transport,
    Accommodation,
    Food,
    Guide,
    Activity,
    Entrance,
    Other,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 7] = [
        ServiceCategory::Transport,
        ServiceCategory::Accommodation,
        ServiceCategory::Food,
        ServiceCategory::Guide,
        ServiceCategory::Activity,
        ServiceCategory::Entrance,
        ServiceCategory::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ServiceCategory::Transport => "TRANSPORT",
            ServiceCategory::Accommodation => "ACCOMMODATION",
            ServiceCategory::Food => "FOOD",
            ServiceCategory::Guide => "GUIDE",
            ServiceCategory::Activity => "ACTIVITY",
            ServiceCategory::Entrance => "ENTRANCE",
            ServiceCategory::Other => "OTHER",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::Transport => "Транспорт",
            ServiceCategory::Accommodation => "Проживание",
            ServiceCategory::Food => "Питание",
            ServiceCategory::Guide => "Гиды и экскурсии",
            ServiceCategory::Activity => "Активности",
            ServiceCategory::Entrance => "Входные билеты",
            ServiceCategory::Other => "Другое",
        }
    }
}

/// Mutually exclusive priced option inside a service.
#[derive(Debug, Serialize)]
pub struct ServiceVariant {
    pub id: &'static str,
    pub name: &'static str,
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price: f64,
    pub unit: &'static str,
    pub category: ServiceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u32>,
    #[serde(skip_serializing_if = "no_variants")]
    pub variants: &'static [ServiceVariant],
}

fn no_variants(variants: &&'static [ServiceVariant]) -> bool {
    variants.is_empty()
}

impl ServiceOption {
    pub fn variant(&self, id: &str) -> Option<&'static ServiceVariant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

const fn service(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    price: f64,
    unit: &'static str,
    category: ServiceCategory,
    max_quantity: Option<u32>,
) -> ServiceOption {
    ServiceOption {
        id,
        name,
        description,
        price,
        unit,
        category,
        max_quantity,
        variants: &[],
    }
}

pub const DEFAULT_SERVICES: &[ServiceOption] = &[
    service("bus_transfer", "Трансфер автобусом", "Комфортабельный автобус с кондиционером", 1_500.0, "маршрут", ServiceCategory::Transport, Some(10)),
    service("jeep_tour", "Джиппинг тур", "Внедорожник с водителем", 5_000.0, "день", ServiceCategory::Transport, Some(5)),
    ServiceOption {
        variants: &[
            ServiceVariant { id: "economy", name: "Эконом", price: 1_500.0 },
            ServiceVariant { id: "comfort", name: "Комфорт", price: 2_000.0 },
            ServiceVariant { id: "premium", name: "Премиум", price: 3_000.0 },
        ],
        ..service("airport_transfer", "Трансфер из аэропорта", "Встреча в аэропорту Махачкалы", 2_000.0, "поездка", ServiceCategory::Transport, None)
    },
    service("city_tour", "Обзорная экскурсия по Махачкале", "Знакомство со столицей Дагестана", 2_500.0, "группа", ServiceCategory::Guide, Some(1)),
    service("mountain_guide", "Горный гид", "Профессиональный гид для горных маршрутов", 4_000.0, "день", ServiceCategory::Guide, Some(3)),
    service("karadakh_gorge", "Карадахская теснина", "Экскурсия к знаменитой теснине", 1_800.0, "человек", ServiceCategory::Entrance, Some(20)),
    service("hotel_standard", "Стандартный номер", "Комфортабельный номер в отеле", 3_500.0, "ночь", ServiceCategory::Accommodation, Some(10)),
    service("guesthouse", "Гостевой дом", "Традиционное дагестанское гостеприимство", 2_500.0, "ночь", ServiceCategory::Accommodation, Some(8)),
    service("breakfast", "Завтрак", "Традиционный дагестанский завтрак", 500.0, "человек/день", ServiceCategory::Food, Some(30)),
    service("lunch", "Обед", "Национальная кухня Дагестана", 800.0, "человек/день", ServiceCategory::Food, Some(30)),
    service("dinner", "Ужин", "Вечерняя трапеза с местными блюдами", 1_000.0, "человек/день", ServiceCategory::Food, Some(30)),
    service("rafting", "Рафтинг", "Спуск по горным рекам", 3_000.0, "человек", ServiceCategory::Activity, Some(12)),
    service("trekking", "Треккинг", "Пешие маршруты по горам", 2_000.0, "день/человек", ServiceCategory::Activity, Some(15)),
    ServiceOption {
        variants: &[
            ServiceVariant { id: "carpet", name: "Ковроткачество", price: 1_500.0 },
            ServiceVariant { id: "pottery", name: "Гончарное дело", price: 1_200.0 },
            ServiceVariant { id: "cooking", name: "Дагестанская кухня", price: 1_800.0 },
        ],
        ..service("master_class", "Мастер-класс", "Изготовление традиционных изделий", 1_500.0, "человек", ServiceCategory::Activity, None)
    },
];

pub fn find_service(id: &str) -> Option<&'static ServiceOption> {
    DEFAULT_SERVICES.iter().find(|s| s.id == id)
}

// ── Discount rules ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

/// Eligibility conditions. An absent condition always holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscountConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_participants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour_types: Option<Vec<TourType>>,
}

/// A time-boxed, condition-gated price reduction. The validity window covers
/// whole UTC days, both ends inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: f64,
    #[serde(default)]
    pub conditions: DiscountConditions,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("static calendar date")
}

pub fn default_discount_rules() -> Vec<DiscountRule> {
    vec![
        DiscountRule {
            id: "early_booking".into(),
            name: "Раннее бронирование".into(),
            kind: DiscountKind::Percentage,
            value: 10.0,
            conditions: DiscountConditions {
                min_duration: Some(3),
                ..Default::default()
            },
            valid_from: day(2024, 1, 1),
            valid_to: day(2024, 12, 31),
        },
        DiscountRule {
            id: "group_discount".into(),
            name: "Групповая скидка".into(),
            kind: DiscountKind::Percentage,
            value: 15.0,
            conditions: DiscountConditions {
                min_participants: Some(4),
                ..Default::default()
            },
            valid_from: day(2024, 1, 1),
            valid_to: day(2024, 12, 31),
        },
    ]
}

/// Replace the built-in rules with a JSON array read from `path`.
pub fn load_discount_rules(path: &std::path::Path) -> anyhow::Result<Vec<DiscountRule>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read discount rules {}", path.display()))?;
    let rules: Vec<DiscountRule> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid discount rules {}", path.display()))?;
    if let Some(bad) = rules.iter().find(|r| r.valid_from > r.valid_to) {
        anyhow::bail!("discount rule {} ends before it starts", bad.id);
    }
    Ok(rules)
}
