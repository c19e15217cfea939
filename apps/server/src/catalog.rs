//! Read-only tour catalog and its search / filter / sort surface.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::models::TourType;

// ── Types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn code(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Легкий",
            Difficulty::Medium => "Средний",
            Difficulty::Hard => "Сложный",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.code() == s)
            .ok_or_else(|| format!("unknown difficulty: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationInfo {
    pub id: String,
    pub name: String,
    pub region: String,
    pub coordinates: Option<Coordinates>,
}

/// Denormalized catalog entry. Never mutated after startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourCard {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub base_price: f64,
    pub currency: &'static str,
    pub price_from: f64,
    pub duration: u32,
    pub difficulty: Difficulty,
    pub tour_type: TourType,
    pub max_people: u32,
    pub min_people: u32,
    pub is_active: bool,
    pub is_popular: bool,
    pub main_image: String,
    pub destination: DestinationInfo,
    pub rating: f64,
    pub review_count: u32,
    pub next_available_date: Option<NaiveDate>,
}

// ── Sample data ──

struct Seed {
    slug: &'static str,
    title: &'static str,
    description: &'static str,
    short_description: &'static str,
    price: f64,
    duration: u32,
    difficulty: Difficulty,
    tour_type: TourType,
    people: (u32, u32),
    is_popular: bool,
    image: &'static str,
    destination: (&'static str, &'static str, &'static str, f64, f64),
    rating: f64,
    review_count: u32,
    next_available: (i32, u32, u32),
}

const SEEDS: &[Seed] = &[
    Seed {
        slug: "excursion-derbent",
        title: "Древний Дербент и цитадель",
        description: "Путешествие в самый древний город России, включенный в список всемирного наследия ЮНЕСКО.",
        short_description: "Знакомство с древнейшей крепостью и историей Дербента",
        price: 8_500.0,
        duration: 2,
        difficulty: Difficulty::Easy,
        tour_type: TourType::Excursion,
        people: (2, 15),
        is_popular: true,
        image: "/images/tours/derbent-citadel.jpg",
        destination: ("derbent", "Дербент", "Южный Дагестан", 42.0678, 48.2899),
        rating: 4.8,
        review_count: 127,
        next_available: (2024, 2, 15),
    },
    Seed {
        slug: "active-gunib",
        title: "Горный Гуниб и окрестности",
        description: "Активный отдых в одном из самых живописных горных районов Дагестана.",
        short_description: "Горные тропы, каньоны и панорамные виды",
        price: 12_000.0,
        duration: 3,
        difficulty: Difficulty::Medium,
        tour_type: TourType::Active,
        people: (3, 12),
        is_popular: true,
        image: "/images/tours/gunib-mountains.jpg",
        destination: ("gunib", "Гуниб", "Горный Дагестан", 42.3867, 46.9328),
        rating: 4.9,
        review_count: 89,
        next_available: (2024, 2, 20),
    },
    Seed {
        slug: "cultural-village",
        title: "Этно-тур по аулам Дагестана",
        description: "Погружение в традиционную культуру и быт дагестанского народа.",
        short_description: "Посещение традиционных аулов и знакомство с культурой",
        price: 15_000.0,
        duration: 4,
        difficulty: Difficulty::Easy,
        tour_type: TourType::Cultural,
        people: (2, 10),
        is_popular: false,
        image: "/images/tours/dagestan-village.jpg",
        destination: ("chokh", "Аул Чох", "Горный Дагестан", 42.3583, 47.3583),
        rating: 4.7,
        review_count: 64,
        next_available: (2024, 3, 1),
    },
    Seed {
        slug: "combined-sulak",
        title: "Сулакский каньон и окрестности",
        description: "Комбинированный тур с посещением самого глубокого каньона Европы.",
        short_description: "Каньон, горы и культурные достопримечательности",
        price: 18_000.0,
        duration: 3,
        difficulty: Difficulty::Medium,
        tour_type: TourType::Combined,
        people: (2, 8),
        is_popular: true,
        image: "/images/tours/sulak-canyon.jpg",
        destination: ("sulak", "Сулакский каньон", "Центральный Дагестан", 43.0167, 46.8333),
        rating: 4.9,
        review_count: 156,
        next_available: (2024, 2, 25),
    },
    Seed {
        slug: "active-rafting",
        title: "Рафтинг в Дагестане",
        description: "Экстремальный сплав по горным рекам с опытными инструкторами.",
        short_description: "Адреналин и красивые горные пейзажи",
        price: 8_000.0,
        duration: 2,
        difficulty: Difficulty::Hard,
        tour_type: TourType::Active,
        people: (4, 10),
        is_popular: false,
        image: "/images/tours/rafting-dagestan.jpg",
        destination: ("karakoysu", "Река Каракойсу", "Горный Дагестан", 42.5, 47.0),
        rating: 4.6,
        review_count: 43,
        next_available: (2024, 4, 15),
    },
    Seed {
        slug: "cultural-crafts",
        title: "Ремесла и традиции Дагестана",
        description: "Мастер-классы по традиционным ремеслам и знакомство с местными мастерами.",
        short_description: "Изготовление ковров, керамики и национальных блюд",
        price: 9_500.0,
        duration: 3,
        difficulty: Difficulty::Easy,
        tour_type: TourType::Cultural,
        people: (2, 8),
        is_popular: false,
        image: "/images/tours/dagestan-crafts.jpg",
        destination: ("untzukul", "Аул Унцукуль", "Горный Дагестан", 42.7167, 46.7833),
        rating: 4.8,
        review_count: 72,
        next_available: (2024, 3, 10),
    },
];

impl Seed {
    fn to_card(&self) -> TourCard {
        let (dest_id, dest_name, region, latitude, longitude) = self.destination;
        let (y, m, d) = self.next_available;
        TourCard {
            id: self.slug.to_string(),
            title: self.title.to_string(),
            slug: self.slug.to_string(),
            description: self.description.to_string(),
            short_description: self.short_description.to_string(),
            base_price: self.price,
            currency: crate::pricing::CURRENCY,
            price_from: self.price,
            duration: self.duration,
            difficulty: self.difficulty,
            tour_type: self.tour_type,
            min_people: self.people.0,
            max_people: self.people.1,
            is_active: true,
            is_popular: self.is_popular,
            main_image: self.image.to_string(),
            destination: DestinationInfo {
                id: dest_id.to_string(),
                name: dest_name.to_string(),
                region: region.to_string(),
                coordinates: Some(Coordinates {
                    latitude,
                    longitude,
                }),
            },
            rating: self.rating,
            review_count: self.review_count,
            next_available_date: NaiveDate::from_ymd_opt(y, m, d),
        }
    }
}

/// The demo catalog: six tours across six destinations.
pub fn sample_tours() -> Vec<TourCard> {
    SEEDS.iter().map(Seed::to_card).collect()
}

pub fn find_by_slug<'a>(tours: &'a [TourCard], slug: &str) -> Option<&'a TourCard> {
    tours.iter().find(|t| t.slug == slug)
}

// ── Query ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Price,
    Rating,
    Duration,
    /// Review count.
    Popularity,
    /// Next available date.
    Date,
    #[default]
    Title,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Popularity,
        SortKey::Price,
        SortKey::Rating,
        SortKey::Duration,
        SortKey::Date,
        SortKey::Title,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::Rating => "rating",
            SortKey::Duration => "duration",
            SortKey::Popularity => "popularity",
            SortKey::Date => "date",
            SortKey::Title => "title",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Price => "По цене",
            SortKey::Rating => "По рейтингу",
            SortKey::Duration => "По длительности",
            SortKey::Popularity => "По популярности",
            SortKey::Date => "По дате",
            SortKey::Title => "По названию",
        }
    }

    /// Unrecognised keys sort by title.
    pub fn parse_or_title(s: &str) -> SortKey {
        SortKey::ALL
            .into_iter()
            .find(|k| k.code() == s)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Inclusive bounds; a missing side is open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Range<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Range<T> {
    fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Empty lists mean "no constraint" for that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourFilters {
    pub tour_types: Vec<TourType>,
    pub difficulty: Vec<Difficulty>,
    pub destinations: Vec<String>,
    pub price: Range<f64>,
    pub duration: Range<u32>,
    pub min_rating: Option<f64>,
}

impl TourFilters {
    fn matches(&self, tour: &TourCard) -> bool {
        (self.tour_types.is_empty() || self.tour_types.contains(&tour.tour_type))
            && (self.difficulty.is_empty() || self.difficulty.contains(&tour.difficulty))
            && (self.destinations.is_empty() || self.destinations.contains(&tour.destination.id))
            && self.price.contains(tour.price_from)
            && self.duration.contains(tour.duration)
            && self.min_rating.map_or(true, |min| tour.rating >= min)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourQuery {
    pub search: Option<String>,
    pub filters: TourFilters,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

/// Search, filter, sort and truncate. `today` stands in for tours without
/// a next available date when sorting by date.
pub fn query_tours<'a>(tours: &'a [TourCard], query: &TourQuery, today: NaiveDate) -> Vec<&'a TourCard> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut out: Vec<&TourCard> = tours
        .iter()
        .filter(|t| needle.as_deref().map_or(true, |n| matches_text(t, n)))
        .filter(|t| query.filters.matches(t))
        .collect();

    // sort_by is stable, so ties keep catalog order in both directions
    out.sort_by(|a, b| {
        let ord = compare(a, b, query.sort_by, today);
        match query.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    out
}

fn matches_text(tour: &TourCard, needle: &str) -> bool {
    [&tour.title, &tour.description, &tour.destination.name]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

fn compare(a: &TourCard, b: &TourCard, key: SortKey, today: NaiveDate) -> Ordering {
    match key {
        SortKey::Price => a.price_from.total_cmp(&b.price_from),
        SortKey::Rating => a.rating.total_cmp(&b.rating),
        SortKey::Duration => a.duration.cmp(&b.duration),
        SortKey::Popularity => a.review_count.cmp(&b.review_count),
        SortKey::Date => a
            .next_available_date
            .unwrap_or(today)
            .cmp(&b.next_available_date.unwrap_or(today)),
        SortKey::Title => a.title.cmp(&b.title),
    }
}
