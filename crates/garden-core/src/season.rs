//! Seasons and the wall-clock source.

use crate::config::ScheduleConfig;
use chrono::{DateTime, Local, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn all() -> [Season; 4] {
        [Season::Spring, Season::Summer, Season::Autumn, Season::Winter]
    }

    /// Season active after `elapsed` time since the world started, rotating
    /// every `rotation`.
    pub fn at(elapsed: Duration, rotation: Duration) -> Season {
        if rotation.is_zero() {
            return Season::Spring;
        }
        let periods = elapsed.as_millis() / rotation.as_millis();
        Season::all()[(periods % 4) as usize]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }

    pub fn growth_modifier(&self) -> f64 {
        match self {
            Season::Spring => 1.5,
            Season::Summer => 1.0,
            Season::Autumn => 0.7,
            Season::Winter => 0.3,
        }
    }

    pub fn moisture_retention(&self) -> f64 {
        match self {
            Season::Spring => 1.0,
            Season::Summer => 0.8,
            Season::Autumn => 1.0,
            Season::Winter => 1.2,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Season::Spring => "#7CB342",
            Season::Summer => "#FFA726",
            Season::Autumn => "#FF7043",
            Season::Winter => "#90CAF9",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32, schedule: &ScheduleConfig) -> Self {
        if hour >= schedule.day_start_hour && hour < schedule.night_start_hour {
            TimeOfDay::Day
        } else {
            TimeOfDay::Night
        }
    }

    /// Sunlight every tile is reset to at the start of a cycle
    pub fn base_sunlight(&self, schedule: &ScheduleConfig) -> f64 {
        match self {
            TimeOfDay::Day => schedule.day_sunlight,
            TimeOfDay::Night => schedule.day_sunlight * schedule.night_sunlight_factor,
        }
    }
}

/// Source of wall-clock time. Everything the core derives from time (season,
/// sunlight baseline, missed cycles) is a pure function of these readings.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Hour used for the day/night cycle
    fn local_hour(&self) -> u32 {
        self.now().with_timezone(&Local).hour()
    }

    fn time_of_day(&self, schedule: &ScheduleConfig) -> TimeOfDay {
        TimeOfDay::from_hour(self.local_hour(), schedule)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock shared between clones; reports its UTC hour as local time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.lock() = time;
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn local_hour(&self) -> u32 {
        self.now().hour()
    }
}
