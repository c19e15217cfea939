pub mod admin;
pub mod bookings;
pub mod health;
pub mod quote;
pub mod tours;

/// Split a comma-separated query value, dropping blank items.
pub(crate) fn split_list<'a>(raw: Option<&'a str>) -> impl Iterator<Item = &'a str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
