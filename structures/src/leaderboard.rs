use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::Pixel;

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFrame {
    All,
    Daily,
    Weekly,
}

impl TimeFrame {
    fn window(&self) -> Option<Duration> {
        match self {
            TimeFrame::All => None,
            TimeFrame::Daily => Some(Duration::days(1)),
            TimeFrame::Weekly => Some(Duration::days(7)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub count: usize,
    pub last_placed: DateTime<Utc>,
}

/// Ranks authors by how many cells they currently own on the canvas.
///
/// Only surviving pixels count: an overwritten placement belongs to whoever
/// placed last.
pub fn rank(pixels: &[Pixel], frame: TimeFrame, now: DateTime<Utc>) -> Vec<LeaderboardEntry> {
    let since = frame.window().map(|window| now - window);
    let mut counters: HashMap<&str, LeaderboardEntry> = HashMap::new();

    for pixel in pixels {
        if matches!(since, Some(since) if pixel.placed_at < since) {
            continue;
        }

        let entry = counters
            .entry(pixel.author())
            .or_insert_with(|| LeaderboardEntry {
                name: pixel.author().to_string(),
                count: 0,
                last_placed: pixel.placed_at,
            });

        entry.count += 1;
        entry.last_placed = entry.last_placed.max(pixel.placed_at);
    }

    let mut entries: Vec<LeaderboardEntry> = counters.into_values().collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coord, HexColor};

    fn pixel(x: u16, author: Option<&str>, placed_at: DateTime<Utc>) -> Pixel {
        Pixel::new(Coord::new(x, 0), HexColor::from_rgb(0, 0, 0), author, placed_at)
    }

    #[test]
    fn counts_per_author_and_window() {
        let now = Utc::now();
        let pixels = vec![
            pixel(0, Some("ada"), now - Duration::hours(1)),
            pixel(1, Some("ada"), now - Duration::days(3)),
            pixel(2, Some("bob"), now - Duration::days(10)),
            pixel(3, Some("bob"), now - Duration::days(10)),
            pixel(4, Some("bob"), now - Duration::days(10)),
            pixel(5, None, now - Duration::minutes(5)),
        ];

        let all = rank(&pixels, TimeFrame::All, now);
        assert_eq!(all[0].name, "bob");
        assert_eq!(all[0].count, 3);
        assert_eq!(all[1].name, "ada");
        assert_eq!(all[1].last_placed, now - Duration::hours(1));

        let weekly = rank(&pixels, TimeFrame::Weekly, now);
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].name, "ada");
        assert_eq!(weekly[0].count, 2);

        let daily = rank(&pixels, TimeFrame::Daily, now);
        let names: Vec<_> = daily.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Anonymous", "ada"]);
    }

    #[test]
    fn keeps_top_ten() {
        let now = Utc::now();
        let names: Vec<String> = (0..15).map(|i| format!("user{:02}", i)).collect();
        let pixels: Vec<Pixel> = names
            .iter()
            .enumerate()
            .map(|(i, name)| pixel(i as u16, Some(name), now))
            .collect();

        let ranked = rank(&pixels, TimeFrame::All, now);
        assert_eq!(ranked.len(), LEADERBOARD_SIZE);
        assert_eq!(ranked[0].name, "user00");
    }
}
