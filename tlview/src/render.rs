use overview::{CpuOverview, ThreadStrip, TimelineCategory};

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One character per sample, taller for higher utilization.
pub fn sparkline(values: impl Iterator<Item = f64>) -> String {
    values
        .map(|value| {
            let level = (value.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f64).round() as usize;
            LEVELS[level]
        })
        .collect()
}

/// A row per non-idle category of the CPU overview.
pub fn cpu_rows(overview: &CpuOverview<TimelineCategory>) -> Vec<(TimelineCategory, String)> {
    overview
        .categories
        .iter()
        .enumerate()
        .filter(|&(_, &category)| category != TimelineCategory::Idle)
        .map(|(index, &category)| {
            let line = sparkline(
                (0..overview.samples.len()).map(|sample| overview.utilization(sample, index)),
            );
            (category, line)
        })
        .collect()
}

fn symbol(category: TimelineCategory) -> char {
    match category {
        TimelineCategory::Idle => ' ',
        TimelineCategory::Loading => 'L',
        TimelineCategory::Painting => 'P',
        TimelineCategory::Rendering => 'R',
        TimelineCategory::Scripting => 'S',
        TimelineCategory::Other => 'o',
    }
}

/// Draws a thread strip one character per pixel.
pub fn strip_line(strip: &ThreadStrip<TimelineCategory>, width: usize) -> String {
    let mut line = vec!['.'; width];
    for bar in &strip.bars {
        let start = bar.start.max(0) as usize;
        let end = (bar.end.max(0) as usize).min(width);
        for cell in line.iter_mut().take(end).skip(start) {
            *cell = symbol(bar.category);
        }
    }
    line.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use overview::CategoryBar;
    use tracemodel::ThreadRef;

    #[test]
    fn sparkline_levels() {
        assert_eq!(sparkline([0.0, 0.5, 1.0, 2.0].into_iter()), " ▄██");
    }

    #[test]
    fn cpu_rows_skip_idle() {
        let overview = CpuOverview {
            categories: vec![TimelineCategory::Idle, TimelineCategory::Scripting],
            start_time: 0.0,
            quant_px: 4.0,
            quant_duration: 2.0,
            samples: vec![vec![2.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]],
        };
        assert_eq!(cpu_rows(&overview), vec![(TimelineCategory::Scripting, " █▄".to_string())]);
    }

    #[test]
    fn strip_is_clipped_to_width() {
        let strip = ThreadStrip {
            thread: ThreadRef { pid: 1, tid: 2 },
            name: "worker".to_string(),
            bars: vec![
                CategoryBar { category: TimelineCategory::Scripting, start: 1, end: 3 },
                CategoryBar { category: TimelineCategory::Painting, start: 4, end: 9 },
            ],
        };
        assert_eq!(strip_line(&strip, 6), ".SS.PP");
    }
}
