//! Demo data for the dashboard
//!
//! Everything here is random or hardcoded. Generated data is cached for a
//! short TTL so reloads do not reshuffle the charts every time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use rand::Rng;
use tokio::sync::RwLock;

/// Number of daily points in the time series
pub const SERIES_DAYS: u64 = 30;

/// One day of demo traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub visitors: u64,
    pub conversions: u64,
    pub revenue: u64,
}

/// Per-channel campaign numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    pub channel: &'static str,
    pub sent: u64,
    pub opens: u64,
    pub conversions: u64,
}

/// Headline numbers over the whole series
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub visitors: u64,
    pub conversions: u64,
    pub revenue: u64,
    /// Percentage, `conversions / max(1, visitors) * 100`
    pub conversion_rate: f64,
}

/// A row of the "recent activity" table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub time: String,
    pub event: &'static str,
    pub by: String,
}

/// Complete data set rendered by the dashboard
#[derive(Debug, Clone)]
pub struct DemoData {
    pub daily: Vec<DailyMetrics>,
    pub channels: Vec<ChannelStats>,
}

impl DemoData {
    /// Generate a series of `SERIES_DAYS` days ending on `today`
    ///
    /// Day `i` (0-based) gets `visitors = i*10 + [0,50)`,
    /// `conversions = i + [0,5)` and `revenue = i*3 + [0,200)`.
    pub fn generate<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> Self {
        let daily = (0..SERIES_DAYS)
            .map(|i| DailyMetrics {
                date: today
                    .checked_sub_days(Days::new(SERIES_DAYS - 1 - i))
                    .unwrap_or(today),
                visitors: i * 10 + rng.gen_range(0..50),
                conversions: i + rng.gen_range(0..5),
                revenue: i * 3 + rng.gen_range(0..200),
            })
            .collect();

        Self {
            daily,
            channels: default_channels(),
        }
    }

    pub fn kpis(&self) -> Kpis {
        let visitors: u64 = self.daily.iter().map(|d| d.visitors).sum();
        let conversions: u64 = self.daily.iter().map(|d| d.conversions).sum();
        let revenue: u64 = self.daily.iter().map(|d| d.revenue).sum();

        Kpis {
            visitors,
            conversions,
            revenue,
            conversion_rate: conversions as f64 / visitors.max(1) as f64 * 100.0,
        }
    }
}

fn default_channels() -> Vec<ChannelStats> {
    [
        ("WhatsApp", 1200, 900, 120),
        ("E-mail", 2000, 800, 150),
        ("SMS", 300, 180, 20),
        ("Voice", 50, 40, 2),
        ("Organic", 800, 600, 60),
    ]
    .into_iter()
    .map(|(channel, sent, opens, conversions)| ChannelStats {
        channel,
        sent,
        opens,
        conversions,
    })
    .collect()
}

const RECENT_EVENTS: [&str; 6] = [
    "Campaign sent",
    "Lead converted",
    "Message failed",
    "New subscription",
    "Delivery rescheduled",
    "A/B test completed",
];

/// Six hourly activity rows ending at `now`, all attributed to `login`
pub fn recent_activity(now: DateTime<Utc>, login: &str) -> Vec<ActivityEntry> {
    let count = RECENT_EVENTS.len() as i64;
    RECENT_EVENTS
        .iter()
        .zip(0..count)
        .map(|(&event, i)| ActivityEntry {
            time: (now - TimeDelta::hours(count - 1 - i))
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            event,
            by: login.to_string(),
        })
        .collect()
}

/// Generated data plus when it was generated
struct CachedData {
    data: Arc<DemoData>,
    generated_at: Instant,
}

/// Process-wide demo data cache
pub struct DemoDataCache {
    cached: RwLock<Option<CachedData>>,
    ttl: Duration,
}

impl DemoDataCache {
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `ttl` - How long a generated data set is served
    pub fn new(ttl: Duration) -> Self {
        Self {
            cached: RwLock::new(None),
            ttl,
        }
    }

    /// Get the current data set, regenerating it when stale
    pub async fn get(&self) -> Arc<DemoData> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.generated_at.elapsed() < self.ttl {
                    return entry.data.clone();
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed it while we waited for the lock.
        if let Some(entry) = cached.as_ref() {
            if entry.generated_at.elapsed() < self.ttl {
                return entry.data.clone();
            }
        }

        let data = Arc::new(DemoData::generate(
            Utc::now().date_naive(),
            &mut rand::thread_rng(),
        ));
        *cached = Some(CachedData {
            data: data.clone(),
            generated_at: Instant::now(),
        });

        use crate::metrics::DEMO_DATA_REFRESHES_TOTAL;
        DEMO_DATA_REFRESHES_TOTAL.inc();
        tracing::debug!("Demo data regenerated");

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn series_covers_thirty_days_ending_today() {
        let data = DemoData::generate(today(), &mut StdRng::seed_from_u64(1));
        assert_eq!(data.daily.len(), 30);
        assert_eq!(data.daily.last().unwrap().date, today());
        assert_eq!(
            data.daily.first().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
        );
    }

    #[test]
    fn generated_values_stay_in_range() {
        let data = DemoData::generate(today(), &mut StdRng::seed_from_u64(7));
        for (i, day) in data.daily.iter().enumerate() {
            let i = i as u64;
            assert!((i * 10..i * 10 + 50).contains(&day.visitors));
            assert!((i..i + 5).contains(&day.conversions));
            assert!((i * 3..i * 3 + 200).contains(&day.revenue));
        }
    }

    #[test]
    fn kpis_sum_the_series() {
        let data = DemoData {
            daily: vec![
                DailyMetrics {
                    date: today(),
                    visitors: 100,
                    conversions: 3,
                    revenue: 40,
                },
                DailyMetrics {
                    date: today(),
                    visitors: 300,
                    conversions: 5,
                    revenue: 60,
                },
            ],
            channels: vec![],
        };

        let kpis = data.kpis();
        assert_eq!(kpis.visitors, 400);
        assert_eq!(kpis.conversions, 8);
        assert_eq!(kpis.revenue, 100);
        assert!((kpis.conversion_rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn conversion_rate_with_no_visitors_does_not_divide_by_zero() {
        let data = DemoData {
            daily: vec![DailyMetrics {
                date: today(),
                visitors: 0,
                conversions: 2,
                revenue: 0,
            }],
            channels: vec![],
        };
        assert!((data.kpis().conversion_rate - 200.0).abs() < 1e-9);
    }

    #[test]
    fn recent_activity_is_hourly_and_attributed() {
        let now = DateTime::parse_from_rfc3339("2024-03-15T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let rows = recent_activity(now, "octo");

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].time, "2024-03-15 07:30");
        assert_eq!(rows[5].time, "2024-03-15 12:30");
        assert!(rows.iter().all(|row| row.by == "octo"));
    }

    #[tokio::test]
    async fn cache_reuses_data_within_ttl() {
        let cache = DemoDataCache::new(Duration::from_secs(60));
        let first = cache.get().await;
        let second = cache.get().await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn cache_regenerates_after_ttl() {
        let cache = DemoDataCache::new(Duration::ZERO);
        let first = cache.get().await;
        let second = cache.get().await;
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
