//! AIS track smoothing
//!
//! Raw AIS positions zig-zag enough to draw ugly trails and to feed spurious
//! course gradients into the encounter classifier. Each contact keeps
//! bounded lat/lon/course histories; once a history is long enough it is
//! run through a zero-phase Butterworth low-pass and the smoothed tail is
//! published.

mod butterworth;

pub use butterworth::Butterworth;

use std::collections::{BTreeMap, VecDeque};

/// Samples kept per history
pub const HISTORY_LEN: usize = 30;
/// Histories shorter than this are published raw
pub const MIN_FILTER_SAMPLES: usize = 15;

/// Smoother tuning. The filter parameters mirror the upstream sample rate:
/// order 3, cutoff 0.1 of a 0.5 Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct SmootherConfig {
    pub filter_order: usize,
    pub cutoff: f64,
    pub nyquist: f64,
    pub history_len: usize,
    pub min_filter_samples: usize,
    /// Contacts silent this long are dropped, milliseconds
    pub stale_after_ms: u64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            filter_order: 3,
            cutoff: 0.1,
            nyquist: 0.5,
            history_len: HISTORY_LEN,
            min_filter_samples: MIN_FILTER_SAMPLES,
            stale_after_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TrackHistory {
    lat: VecDeque<f64>,
    lon: VecDeque<f64>,
    course: VecDeque<f64>,
    last_update_ms: u64,
}

/// Smoothed view of one track, published after every update.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedTrack {
    /// Smoothed positions as (lon, lat) pairs, oldest first
    pub pos_history: Vec<[f64; 2]>,
    /// Last sample of the smoothed course, if the track reports course
    pub filtered_course: Option<f64>,
}

/// Per-MMSI bounded history plus low-pass filter.
#[derive(Debug, Clone)]
pub struct TrackSmoother {
    config: SmootherConfig,
    filter: Butterworth,
    tracks: BTreeMap<String, TrackHistory>,
}

impl TrackSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        let filter = Butterworth::lowpass(config.filter_order, config.cutoff, config.nyquist);
        Self {
            config,
            filter,
            tracks: BTreeMap::new(),
        }
    }

    /// Number of tracked histories.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Ingest one AIS sample and publish the smoothed track. `now_ms` is the
    /// caller's wall clock, used for stale pruning only.
    pub fn update(
        &mut self,
        mmsi: &str,
        lat: f64,
        lon: f64,
        course: Option<f64>,
        now_ms: u64,
    ) -> SmoothedTrack {
        self.prune_stale(now_ms);

        let track = self.tracks.entry(mmsi.to_string()).or_default();
        track.last_update_ms = now_ms;
        track.lat.push_back(lat);
        track.lon.push_back(lon);
        if let Some(c) = course {
            track.course.push_back(c);
        }

        let min = self.config.min_filter_samples;
        let smoothed_lat = filtered_or_raw(&self.filter, &track.lat, min);
        let smoothed_lon = filtered_or_raw(&self.filter, &track.lon, min);
        let pos_history = smoothed_lon
            .iter()
            .zip(smoothed_lat.iter())
            .map(|(&lon, &lat)| [lon, lat])
            .collect();

        let filtered_course = if track.course.is_empty() {
            None
        } else {
            filtered_or_raw(&self.filter, &track.course, min).last().copied()
        };

        while track.lat.len() > self.config.history_len {
            track.lat.pop_front();
        }
        while track.lon.len() > self.config.history_len {
            track.lon.pop_front();
        }
        while track.course.len() > self.config.history_len {
            track.course.pop_front();
        }

        SmoothedTrack {
            pos_history,
            filtered_course,
        }
    }

    fn prune_stale(&mut self, now_ms: u64) {
        let stale = self.config.stale_after_ms;
        self.tracks
            .retain(|_, t| now_ms.saturating_sub(t.last_update_ms) <= stale);
    }

    /// Longest history currently held for the MMSI, for diagnostics.
    pub fn history_len(&self, mmsi: &str) -> usize {
        self.tracks.get(mmsi).map_or(0, |t| t.lat.len())
    }
}

fn filtered_or_raw(filter: &Butterworth, history: &VecDeque<f64>, min: usize) -> Vec<f64> {
    let raw: Vec<f64> = history.iter().copied().collect();
    if raw.len() < min {
        raw
    } else {
        filter.filtfilt(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_history_published_raw() {
        let mut s = TrackSmoother::new(SmootherConfig::default());
        for i in 0..5 {
            let out = s.update("257000001", 63.0 + i as f64 * 1e-4, 10.0, Some(45.0), 1000 * i);
            assert_eq!(out.pos_history.len(), (i + 1) as usize);
            assert_eq!(out.filtered_course, Some(45.0));
        }
    }

    #[test]
    fn test_history_never_exceeds_cap() {
        let mut s = TrackSmoother::new(SmootherConfig::default());
        for i in 0..100u64 {
            s.update("257000001", 63.0, 10.0, Some(90.0), 1000 * i);
            assert!(s.history_len("257000001") <= HISTORY_LEN);
        }
        assert_eq!(s.history_len("257000001"), HISTORY_LEN);
    }

    #[test]
    fn test_smoothing_reduces_jitter() {
        let mut s = TrackSmoother::new(SmootherConfig::default());
        let mut out = None;
        for i in 0..30u64 {
            // Straight northbound track with alternating cross-track noise
            let noise = if i % 2 == 0 { 1e-4 } else { -1e-4 };
            out = Some(s.update(
                "257000001",
                63.0 + i as f64 * 1e-3,
                10.0 + noise,
                Some(0.0),
                1000 * i,
            ));
        }
        let out = out.unwrap();
        // Interior smoothed longitudes hug the true track much tighter than
        // the raw noise amplitude
        let max_dev = out.pos_history[5..25]
            .iter()
            .map(|p| (p[0] - 10.0).abs())
            .fold(0.0_f64, f64::max);
        assert!(max_dev < 5e-5, "jitter survived smoothing: {}", max_dev);
    }

    #[test]
    fn test_course_absent_stays_absent() {
        let mut s = TrackSmoother::new(SmootherConfig::default());
        let out = s.update("257000001", 63.0, 10.0, None, 0);
        assert_eq!(out.filtered_course, None);
    }

    #[test]
    fn test_stale_tracks_pruned() {
        let mut s = TrackSmoother::new(SmootherConfig::default());
        s.update("1", 63.0, 10.0, None, 0);
        s.update("2", 63.0, 10.0, None, 400_000);
        assert_eq!(s.len(), 1);
        assert_eq!(s.history_len("1"), 0);
    }
}
