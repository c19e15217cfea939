use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AppError;

type TierMap = DashMap<Tier, (RateLimitConfig, DashMap<IpAddr, Vec<Instant>>)>;

// ── Configuration ──

/// Route groups that share a request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Catalog and reference reads.
    Public,
    /// Price calculation.
    Quote,
    /// Booking submission.
    Booking,
    /// Operator listing and status changes.
    Admin,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Public, Tier::Quote, Tier::Booking, Tier::Admin];

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Quote => "quote",
            Tier::Booking => "booking",
            Tier::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the sliding window.
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Budget per tier. Defaults: public 60/min, quote 30/min, booking 5 per
/// 5 min, admin 120/min.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub public: RateLimitConfig,
    pub quote: RateLimitConfig,
    pub booking: RateLimitConfig,
    pub admin: RateLimitConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            public: RateLimitConfig::new(60, 60),
            quote: RateLimitConfig::new(30, 60),
            booking: RateLimitConfig::new(5, 300),
            admin: RateLimitConfig::new(120, 60),
        }
    }
}

impl RateLimitSettings {
    pub fn get(&self, tier: Tier) -> RateLimitConfig {
        match tier {
            Tier::Public => self.public,
            Tier::Quote => self.quote,
            Tier::Booking => self.booking,
            Tier::Admin => self.admin,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut RateLimitConfig {
        match tier {
            Tier::Public => &mut self.public,
            Tier::Quote => &mut self.quote,
            Tier::Booking => &mut self.booking,
            Tier::Admin => &mut self.admin,
        }
    }
}

// ── Core Rate Limiter ──

/// In-memory per-IP rate limiter using sliding window counters.
///
/// Each tier has its own config and tracking map. Keys are client IP
/// addresses; values are the timestamps of requests still inside the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tiers: Arc<TierMap>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let limiter = Self {
            tiers: Arc::new(DashMap::new()),
        };
        for tier in Tier::ALL {
            limiter.add_tier(tier, settings.get(tier));
        }
        limiter
    }

    pub fn add_tier(&self, tier: Tier, config: RateLimitConfig) {
        self.tiers.insert(tier, (config, DashMap::new()));
    }

    /// Returns `Err(retry_after_secs)` when `ip` has used up the tier's budget.
    /// A tier that was never registered is unlimited.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let Some(tier_entry) = self.tiers.get(&tier) else {
            return Ok(());
        };
        let (config, ip_map) = tier_entry.value();
        let now = Instant::now();

        let mut entry = ip_map.entry(ip).or_default();
        entry.retain(|t| now.duration_since(*t) < config.window);

        if entry.len() >= config.max_requests as usize {
            let retry_after = entry
                .first()
                .map(|oldest| (*oldest + config.window).saturating_duration_since(now))
                .unwrap_or(config.window)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        entry.push(now);
        Ok(())
    }

    /// Remove stale entries (older than 2× window) from all tiers.
    /// Call periodically from a background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for tier_entry in self.tiers.iter() {
            let (config, ip_map) = tier_entry.value();
            let cutoff = config.window * 2;
            ip_map.retain(|_ip, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < cutoff);
                !timestamps.is_empty()
            });
        }
    }
}

// ── IP Extraction ──

/// Client IP from the first X-Forwarded-For hop (reverse proxy), else the socket peer.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first_ip) = forwarded.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ── Middleware Functions (one per tier) ──

async fn enforce(limiter: &RateLimiter, tier: Tier, req: Request, next: Next) -> Result<Response, AppError> {
    let ip = extract_client_ip(&req);
    if let Err(retry_after) = limiter.check(tier, ip) {
        tracing::warn!(tier = tier.name(), %ip, retry_after, "rate limit exceeded");
        return Err(AppError::TooManyRequests(retry_after));
    }
    Ok(next.run(req).await)
}

pub async fn rate_limit_public(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&limiter, Tier::Public, req, next).await
}

pub async fn rate_limit_quote(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&limiter, Tier::Quote, req, next).await
}

/// Booking submission is the strictest tier.
pub async fn rate_limit_booking(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&limiter, Tier::Booking, req, next).await
}

pub async fn rate_limit_admin(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&limiter, Tier::Admin, req, next).await
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn test_ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter_with(max_requests: u32, window: Duration) -> RateLimiter {
        let limiter = RateLimiter::new(&RateLimitSettings::default());
        limiter.add_tier(
            Tier::Public,
            RateLimitConfig {
                max_requests,
                window,
            },
        );
        limiter
    }

    #[test]
    fn test_allows_requests_under_limit() {
        let limiter = limiter_with(3, Duration::from_secs(60));
        let ip = test_ip(1);
        assert!(limiter.check(Tier::Public, ip).is_ok());
        assert!(limiter.check(Tier::Public, ip).is_ok());
        assert!(limiter.check(Tier::Public, ip).is_ok());
    }

    #[test]
    fn test_rejects_over_limit() {
        let limiter = limiter_with(2, Duration::from_secs(60));
        let ip = test_ip(1);
        assert!(limiter.check(Tier::Public, ip).is_ok());
        assert!(limiter.check(Tier::Public, ip).is_ok());
        assert!(limiter.check(Tier::Public, ip).is_err());
    }

    #[test]
    fn test_returns_retry_after() {
        let limiter = limiter_with(1, Duration::from_secs(60));
        let ip = test_ip(1);
        limiter.check(Tier::Public, ip).unwrap();
        let retry_after = limiter.check(Tier::Public, ip).unwrap_err();
        assert!((1..=60).contains(&retry_after));
    }

    #[test]
    fn test_different_ips_independent() {
        let limiter = limiter_with(1, Duration::from_secs(60));
        assert!(limiter.check(Tier::Public, test_ip(1)).is_ok());
        assert!(limiter.check(Tier::Public, test_ip(1)).is_err());
        assert!(limiter.check(Tier::Public, test_ip(2)).is_ok());
    }

    #[test]
    fn test_default_booking_tier_allows_five() {
        let limiter = RateLimiter::new(&RateLimitSettings::default());
        let ip = test_ip(1);
        for _ in 0..5 {
            assert!(limiter.check(Tier::Booking, ip).is_ok());
        }
        assert!(limiter.check(Tier::Booking, ip).is_err());
        // other tiers keep their own budget
        assert!(limiter.check(Tier::Quote, ip).is_ok());
    }

    #[test]
    fn test_window_expiry_allows_again() {
        let limiter = limiter_with(1, Duration::from_millis(100));
        let ip = test_ip(1);
        assert!(limiter.check(Tier::Public, ip).is_ok());
        assert!(limiter.check(Tier::Public, ip).is_err());

        sleep(Duration::from_millis(150));

        assert!(limiter.check(Tier::Public, ip).is_ok());
    }

    #[test]
    fn test_cleanup_removes_stale_entries() {
        let limiter = limiter_with(10, Duration::from_millis(50));
        let ip = test_ip(1);
        limiter.check(Tier::Public, ip).unwrap();

        sleep(Duration::from_millis(120));
        limiter.cleanup();

        let tiers = limiter.tiers.get(&Tier::Public).unwrap();
        assert!(tiers.value().1.get(&ip).is_none());
    }

    #[test]
    fn test_cleanup_preserves_active_entries() {
        let limiter = limiter_with(2, Duration::from_secs(60));
        let ip = test_ip(1);
        limiter.check(Tier::Public, ip).unwrap();

        limiter.cleanup();

        limiter.check(Tier::Public, ip).unwrap();
        assert!(limiter.check(Tier::Public, ip).is_err());
    }

    #[test]
    fn test_forwarded_header_wins() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req), "203.0.113.7".parse::<IpAddr>().unwrap());

        let bare = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&bare), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
