use super::types::{Event, Segment, TimestampSet};
use log::debug;

/// 選取參數
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPlan {
    pub highlight_fraction: f64,
    pub minimum_highlight_seconds: f64,
    pub segment_length_seconds: f64,
}

impl SelectionPlan {
    /// 精華目標長度：`max(duration * fraction, minimum)`
    #[must_use]
    pub fn target_duration(&self, video_duration: f64) -> f64 {
        (video_duration * self.highlight_fraction).max(self.minimum_highlight_seconds)
    }

    /// 片段數量：`max(1, floor(target / segment_length))`
    #[must_use]
    pub fn segment_count(&self, video_duration: f64) -> usize {
        let count = (self.target_duration(video_duration) / self.segment_length_seconds).floor();
        if count.is_finite() && count >= 1.0 {
            count as usize
        } else {
            1
        }
    }
}

/// 合併所有偵測器的事件
///
/// 去除超出 `[0, duration)` 或非有限值的時間點，排序後移除完全相同的值。
/// 結果為空時回傳 `None`，由呼叫端決定是否改用合成時間點。
#[must_use]
pub fn fuse_events(events: &[Event], duration: f64) -> Option<TimestampSet> {
    let mut values: Vec<f64> = events
        .iter()
        .map(|e| e.timestamp_seconds)
        .filter(|t| t.is_finite() && *t >= 0.0 && *t < duration)
        .collect();

    values.sort_by(f64::total_cmp);
    values.dedup();

    debug!("合併 {} 個事件，得到 {} 個時間點", events.len(), values.len());

    if values.is_empty() {
        None
    } else {
        Some(TimestampSet {
            values,
            synthetic: false,
        })
    }
}

/// 在 `[0, duration)` 內產生 `count` 個均勻分布的時間點
#[must_use]
pub fn synthetic_timestamps(duration: f64, count: usize) -> TimestampSet {
    let count = count.max(1);
    let step = duration / count as f64;
    let mut values: Vec<f64> = (0..count).map(|i| i as f64 * step).collect();

    // 極短影片可能讓相鄰值相同
    values.dedup();

    TimestampSet {
        values,
        synthetic: true,
    }
}

/// 合併事件，沒有事件時改用合成時間點
#[must_use]
pub fn fuse_or_synthesize(events: &[Event], duration: f64, synthetic_count: usize) -> TimestampSet {
    fuse_events(events, duration).unwrap_or_else(|| {
        debug!("沒有偵測到事件，改用 {synthetic_count} 個均勻時間點");
        synthetic_timestamps(duration, synthetic_count)
    })
}

/// 在 `len` 個元素中均勻選出 `count` 個索引（包含頭尾）
///
/// `len <= count` 時回傳全部索引。
#[must_use]
pub fn select_evenly(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if len <= count {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![0];
    }

    let step = (len - 1) as f64 / (count - 1) as f64;

    (0..count)
        .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
        .collect()
}

/// 將時間點轉為待擷取的片段
#[must_use]
pub fn plan_segments(
    timestamps: &TimestampSet,
    plan: &SelectionPlan,
    video_duration: f64,
) -> Vec<Segment> {
    let count = plan.segment_count(video_duration);
    let indices = select_evenly(timestamps.len(), count);

    debug!(
        "目標長度 {:.1}s，片段數 {}，從 {} 個時間點選出 {} 個",
        plan.target_duration(video_duration),
        count,
        timestamps.len(),
        indices.len()
    );

    indices
        .into_iter()
        .enumerate()
        .map(|(source_index, i)| Segment {
            start_seconds: timestamps.values[i],
            duration_seconds: plan.segment_length_seconds,
            source_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::highlight_generator::EventKind;

    fn default_plan() -> SelectionPlan {
        SelectionPlan {
            highlight_fraction: 0.2,
            minimum_highlight_seconds: 30.0,
            segment_length_seconds: 3.0,
        }
    }

    fn scene(t: f64) -> Event {
        Event::new(t, EventKind::Scene)
    }

    fn audio(t: f64) -> Event {
        Event::new(t, EventKind::AudioPeak)
    }

    #[test]
    fn test_fuse_sorts_and_dedups_across_detectors() {
        let events = vec![scene(30.0), scene(10.0), audio(20.0), audio(10.0), scene(20.0)];
        let set = fuse_events(&events, 100.0).unwrap();
        assert_eq!(set.as_slice(), &[10.0, 20.0, 30.0]);
        assert!(!set.is_synthetic());
    }

    #[test]
    fn test_fuse_drops_out_of_range() {
        let events = vec![
            scene(-1.0),
            scene(0.0),
            scene(99.9),
            scene(100.0),
            scene(150.0),
            audio(f64::NAN),
            audio(f64::INFINITY),
        ];
        let set = fuse_events(&events, 100.0).unwrap();
        assert_eq!(set.as_slice(), &[0.0, 99.9]);
    }

    #[test]
    fn test_fuse_is_strictly_increasing_within_bounds() {
        let duration = 321.0;
        let events: Vec<Event> = (0..500)
            .map(|i| {
                let t = f64::from((i * 37) % 400) * 0.9;
                if i % 2 == 0 { scene(t) } else { audio(t) }
            })
            .collect();

        let set = fuse_events(&events, duration).unwrap();
        for pair in set.as_slice().windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(set.as_slice().iter().all(|t| *t >= 0.0 && *t < duration));
    }

    #[test]
    fn test_fuse_empty_is_none() {
        assert!(fuse_events(&[], 100.0).is_none());
        assert!(fuse_events(&[scene(200.0)], 100.0).is_none());
    }

    #[test]
    fn test_synthetic_timestamps() {
        let set = synthetic_timestamps(100.0, 20);
        assert_eq!(set.len(), 20);
        assert!(set.is_synthetic());
        assert!(set.as_slice()[0].abs() < 1e-9);
        assert!((set.as_slice()[1] - 5.0).abs() < 1e-9);
        assert!(*set.as_slice().last().unwrap() < 100.0);
        for pair in set.as_slice().windows(2) {
            assert!((pair[1] - pair[0] - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fuse_or_synthesize_falls_back() {
        let set = fuse_or_synthesize(&[], 100.0, 20);
        assert!(set.is_synthetic());
        assert_eq!(set.len(), 20);

        let set = fuse_or_synthesize(&[scene(5.0)], 100.0, 20);
        assert!(!set.is_synthetic());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_segment_count() {
        let plan = default_plan();
        assert_eq!(plan.segment_count(600.0), 40);
        assert!((plan.target_duration(600.0) - 120.0).abs() < 1e-9);
        assert_eq!(plan.segment_count(100.0), 10);
        assert_eq!(plan.segment_count(10.0), 10);
    }

    #[test]
    fn test_segment_count_clamped_to_one() {
        let plan = SelectionPlan {
            highlight_fraction: 0.2,
            minimum_highlight_seconds: 0.0,
            segment_length_seconds: 3.0,
        };
        assert_eq!(plan.segment_count(5.0), 1);
    }

    #[test]
    fn test_select_evenly_includes_first_and_last() {
        let indices = select_evenly(12, 10);
        assert_eq!(indices.len(), 10);
        assert_eq!(indices[0], 0);
        assert_eq!(*indices.last().unwrap(), 11);
        for pair in indices.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_select_evenly_uses_all_when_short() {
        assert_eq!(select_evenly(5, 10), vec![0, 1, 2, 3, 4]);
        assert_eq!(select_evenly(10, 10), (0..10).collect::<Vec<_>>());
        assert!(select_evenly(0, 10).is_empty());
        assert_eq!(select_evenly(7, 1), vec![0]);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let events: Vec<Event> = (0..73).map(|i| scene(f64::from(i) * 7.3)).collect();
        let set = fuse_events(&events, 600.0).unwrap();

        let first = plan_segments(&set, &default_plan(), 600.0);
        let second = plan_segments(&set, &default_plan(), 600.0);
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn test_plan_segments_tags_source_index() {
        let events: Vec<Event> = (0..12).map(|i| scene(f64::from(i) * 8.0)).collect();
        let set = fuse_events(&events, 100.0).unwrap();
        let segments = plan_segments(&set, &default_plan(), 100.0);

        assert_eq!(segments.len(), 10);
        assert!(segments[0].start_seconds.abs() < 1e-9);
        assert!((segments[9].start_seconds - 88.0).abs() < 1e-9);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.source_index, i);
            assert!((segment.duration_seconds - 3.0).abs() < 1e-9);
        }
    }
}
