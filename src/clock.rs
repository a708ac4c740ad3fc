//! client-side timestamps in a fixed civil timezone
//!
//! records are stamped by the writer, not the store. the format is
//! zero-padded `YYYY-MM-DD HH:mm:ss` so that string order is time order.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub struct CivilClock {
    tz: Tz,
}

impl CivilClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// parse an IANA zone name such as "America/Mexico_City"
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|e| anyhow::anyhow!("unknown timezone {name:?}: {e}"))?;
        Ok(Self::new(tz))
    }

    pub fn stamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(DATE_FORMAT).to_string()
    }

    pub fn now(&self) -> String {
        self.stamp(Utc::now())
    }
}
