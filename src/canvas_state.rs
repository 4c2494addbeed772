use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use store::{ChangeFeed, PixelStoreAdapter, SubscriptionHandle};
use structures::{CanvasConfig, Coord, Grid, HexColor, PersistenceMode, Pixel};

use crate::rate_limiter::{CooldownState, RateLimiter};
use crate::update_queue::UpdateQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The cell was painted and the placement handed to the store.
    Accepted,
    /// Awaited persistence failed and the cell was rolled back.
    Failed,
    CoolingDown { remaining: u32 },
    OutOfBounds,
}

/// Things the presentation layer may want to tell the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasNotice {
    LoadFailed,
    CooldownActive { remaining: u32 },
    PlacementFailed { coord: Coord },
}

#[derive(Debug)]
struct PlacementReport {
    coord: Coord,
    color: HexColor,
    /// Color to put back when the upsert failed, `None` once stored.
    rollback_to: Option<HexColor>,
}

/// Upserts one placement and, when that fails, re-reads the last stored
/// value for the cell. Runs wherever the placement is persisted so the event
/// loop never waits on the store for a rollback.
fn store_placement(
    adapter: &PixelStoreAdapter,
    coord: Coord,
    color: HexColor,
    previous: HexColor,
    background: HexColor,
    author: Option<&str>,
) -> PlacementReport {
    let stored = adapter.place(coord.x as i32, coord.y as i32, color, author);

    let rollback_to = if stored {
        None
    } else {
        let restored = match adapter.try_fetch_one(coord) {
            Ok(Some(pixel)) => pixel.color,
            Ok(None) => background,
            Err(err) => {
                warn!(
                    "could not re-read ({}, {}) for rollback: {}",
                    coord.x, coord.y, err
                );
                previous
            }
        };
        Some(restored)
    };

    PlacementReport {
        coord,
        color,
        rollback_to,
    }
}

/// Owns the session's grid and reconciles local placements with the store.
///
/// Driven from a single event loop: call [`update`](CanvasState::update)
/// every frame so the cooldown advances, background placements report back
/// and remote changes reach the grid.
pub struct CanvasState {
    config: CanvasConfig,
    grid: Grid,
    adapter: PixelStoreAdapter,
    limiter: RateLimiter,
    feed: ChangeFeed,
    subscription: Option<SubscriptionHandle>,
    remote_updates: Rc<RefCell<UpdateQueue>>,
    selected_color: HexColor,
    nickname: Option<String>,
    reports_tx: Sender<PlacementReport>,
    reports_rx: Receiver<PlacementReport>,
    in_flight: usize,
    notices: VecDeque<CanvasNotice>,
}

impl CanvasState {
    pub fn new(adapter: PixelStoreAdapter, config: CanvasConfig) -> Self {
        let (reports_tx, reports_rx) = channel();

        Self {
            grid: Grid::new(config.grid_size, config.default_color),
            feed: ChangeFeed::new(adapter.store().clone()),
            limiter: RateLimiter::new(config.cooldown_seconds),
            remote_updates: Rc::new(RefCell::new(UpdateQueue::new(
                config.flush_interval(),
                config.max_pending_updates,
            ))),
            selected_color: config.selected_color,
            nickname: None,
            subscription: None,
            reports_tx,
            reports_rx,
            in_flight: 0,
            notices: VecDeque::new(),
            adapter,
            config,
        }
    }

    /// Listens for remote changes, then repaints the grid from a full
    /// snapshot. Returns `false` when the snapshot could not be loaded, in
    /// which case the grid is left blank.
    pub fn initialize(&mut self) -> bool {
        // Subscribe first so writes racing the snapshot are replayed after it
        if self.subscription.is_none() {
            let queue = self.remote_updates.clone();
            let handle = self
                .feed
                .subscribe(move |pixel: &Pixel| queue.borrow_mut().push(pixel.clone()));
            self.subscription = Some(handle);
        }

        self.grid.clear(self.config.default_color);

        match self.adapter.fetch_all() {
            Some(pixels) => {
                let painted = self.grid.paint(&pixels);
                info!("loaded {} pixels onto the canvas", painted);
                true
            }
            None => {
                self.notices.push_back(CanvasNotice::LoadFailed);
                false
            }
        }
    }

    pub fn place_pixel(&mut self, x: i32, y: i32) -> PlaceOutcome {
        if !self.limiter.can_place() {
            let remaining = self.limiter.remaining();
            self.notices.push_back(CanvasNotice::CooldownActive { remaining });
            return PlaceOutcome::CoolingDown { remaining };
        }

        let Some(coord) = Coord::checked(x, y, self.grid.size()) else {
            return PlaceOutcome::OutOfBounds;
        };

        let color = self.selected_color;
        let previous = self
            .grid
            .set(coord, color)
            .unwrap_or(self.config.default_color);
        self.limiter.start();

        match self.config.persistence {
            PersistenceMode::Awaited => {
                let report = self.persist(coord, color, previous);
                let stored = report.rollback_to.is_none();
                self.finish_placement(report);

                if stored {
                    PlaceOutcome::Accepted
                } else {
                    PlaceOutcome::Failed
                }
            }
            PersistenceMode::Background => {
                self.persist_in_background(coord, color, previous);
                PlaceOutcome::Accepted
            }
        }
    }

    /// Writes one remote row onto the grid. Returns `false` for rows outside
    /// the grid.
    pub fn on_remote_pixel_update(&mut self, pixel: &Pixel) -> bool {
        if self.grid.set(pixel.coord(), pixel.color).is_none() {
            warn!(
                "ignored remote pixel outside the grid at ({}, {})",
                pixel.x, pixel.y
            );
            return false;
        }

        self.adapter.observe(pixel);
        true
    }

    /// Author and time of a placed cell. Cells still showing the background
    /// have no row and give `None` without touching the store.
    pub fn get_pixel_info(&self, x: i32, y: i32) -> Option<Pixel> {
        let coord = Coord::checked(x, y, self.grid.size())?;

        if self.grid.get(coord)? == self.config.default_color {
            return None;
        }

        self.adapter.fetch_one(x, y)
    }

    /// Advances the session by `dt`.
    pub fn update(&mut self, dt: Duration) {
        self.limiter.advance(dt);

        while let Ok(report) = self.reports_rx.try_recv() {
            self.in_flight -= 1;
            self.finish_placement(report);
        }

        self.feed.pump();

        let due = self.remote_updates.borrow_mut().advance(dt);
        if due {
            self.flush_remote_updates();
        }
    }

    /// Applies every queued remote change now, returning how many cells were
    /// written.
    pub fn flush_remote_updates(&mut self) -> usize {
        let pending = self.remote_updates.borrow_mut().drain();

        pending
            .iter()
            .filter(|pixel| self.on_remote_pixel_update(pixel))
            .count()
    }

    /// Blocks until every background placement has reported or `timeout`
    /// runs out. Returns `true` when nothing is left in flight.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.in_flight > 0 {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.reports_rx.recv_timeout(wait) {
                Ok(report) => {
                    self.in_flight -= 1;
                    self.finish_placement(report);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    warn!("{} placements still in flight", self.in_flight);
                    return false;
                }
            }
        }

        true
    }

    /// Stops listening for remote changes. Placements already handed to the
    /// store are not cancelled.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.feed.unsubscribe(handle);
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn color_at(&self, x: i32, y: i32) -> Option<HexColor> {
        self.grid.get(Coord::checked(x, y, self.grid.size())?)
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn palette(&self) -> &[HexColor] {
        &self.config.palette
    }

    pub fn selected_color(&self) -> HexColor {
        self.selected_color
    }

    pub fn set_selected_color(&mut self, color: HexColor) {
        self.selected_color = color;
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn set_nickname(&mut self, nickname: Option<String>) {
        self.nickname = nickname.filter(|name| !name.trim().is_empty());
    }

    pub fn can_place(&self) -> bool {
        self.limiter.can_place()
    }

    pub fn cooldown(&self) -> u32 {
        self.limiter.remaining()
    }

    pub fn cooldown_state(&self) -> CooldownState {
        self.limiter.state()
    }

    pub fn pending_placements(&self) -> usize {
        self.in_flight
    }

    pub fn pending_remote_updates(&self) -> usize {
        self.remote_updates.borrow().len()
    }

    /// Lets other session components listen to the same change feed.
    pub fn feed_mut(&mut self) -> &mut ChangeFeed {
        &mut self.feed
    }

    pub fn take_notices(&mut self) -> Vec<CanvasNotice> {
        self.notices.drain(..).collect()
    }

    fn persist(&self, coord: Coord, color: HexColor, previous: HexColor) -> PlacementReport {
        store_placement(
            &self.adapter,
            coord,
            color,
            previous,
            self.config.default_color,
            self.nickname.as_deref(),
        )
    }

    fn persist_in_background(&mut self, coord: Coord, color: HexColor, previous: HexColor) {
        let adapter = self.adapter.clone();
        let reports = self.reports_tx.clone();
        let nickname = self.nickname.clone();
        let background = self.config.default_color;

        let spawned = thread::Builder::new()
            .name("pixel-placement".into())
            .spawn(move || {
                let report = store_placement(
                    &adapter,
                    coord,
                    color,
                    previous,
                    background,
                    nickname.as_deref(),
                );
                let _ = reports.send(report);
            });

        match spawned {
            Ok(_) => self.in_flight += 1,
            Err(err) => {
                warn!("could not start placement worker, storing inline: {}", err);
                let report = self.persist(coord, color, previous);
                self.finish_placement(report);
            }
        }
    }

    // Only writes the grid: the rollback color was read from the store
    // alongside the failed upsert. The cell is left alone when something
    // else has been written there since.
    fn finish_placement(&mut self, report: PlacementReport) {
        let PlacementReport {
            coord,
            color,
            rollback_to,
        } = report;

        let Some(restored) = rollback_to else {
            debug!("stored {} at ({}, {})", color, coord.x, coord.y);
            return;
        };

        self.notices.push_back(CanvasNotice::PlacementFailed { coord });

        if self.grid.get(coord) == Some(color) {
            self.grid.set(coord, restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use store::{MemoryStore, PixelStore};

    use super::*;

    const RED: HexColor = HexColor::from_rgb(0xFF, 0, 0);
    const BLUE: HexColor = HexColor::from_rgb(0, 0, 0xFF);

    fn config(persistence: PersistenceMode) -> CanvasConfig {
        CanvasConfig {
            grid_size: 16,
            persistence,
            flush_interval_ms: 0,
            ..CanvasConfig::default()
        }
    }

    fn canvas_on(store: Arc<MemoryStore>, persistence: PersistenceMode) -> CanvasState {
        let config = config(persistence);
        let adapter = PixelStoreAdapter::new(store, &config);
        let mut canvas = CanvasState::new(adapter, config);
        canvas.initialize();
        canvas
    }

    #[test]
    fn placement_is_visible_before_the_store_answers() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store.clone(), PersistenceMode::Background);
        canvas.set_selected_color(RED);

        assert_eq!(canvas.place_pixel(3, 3), PlaceOutcome::Accepted);
        assert_eq!(canvas.color_at(3, 3), Some(RED));

        assert!(canvas.settle(Duration::from_secs(5)));
        assert_eq!(store.fetch_one(Coord::new(3, 3)).unwrap().unwrap().color, RED);
    }

    #[test]
    fn cooldown_blocks_second_placement() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store.clone(), PersistenceMode::Awaited);
        canvas.set_selected_color(RED);

        assert_eq!(canvas.place_pixel(1, 1), PlaceOutcome::Accepted);
        canvas.set_selected_color(BLUE);
        assert_eq!(
            canvas.place_pixel(2, 2),
            PlaceOutcome::CoolingDown { remaining: 5 }
        );

        assert_eq!(canvas.color_at(2, 2), Some(canvas.config().default_color));
        assert_eq!(store.len(), 1);
        assert_eq!(
            canvas.take_notices(),
            vec![CanvasNotice::CooldownActive { remaining: 5 }]
        );

        for _ in 0..5 {
            canvas.update(Duration::from_secs(1));
        }
        assert!(canvas.can_place());
        assert_eq!(canvas.place_pixel(2, 2), PlaceOutcome::Accepted);
        assert_eq!(canvas.color_at(2, 2), Some(BLUE));
    }

    #[test]
    fn out_of_bounds_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store.clone(), PersistenceMode::Awaited);
        let before = canvas.grid().clone();

        assert_eq!(canvas.place_pixel(16, 0), PlaceOutcome::OutOfBounds);
        assert_eq!(canvas.place_pixel(-1, 4), PlaceOutcome::OutOfBounds);

        assert_eq!(canvas.grid(), &before);
        assert!(canvas.can_place());
        assert!(store.is_empty());
    }

    #[test]
    fn remote_update_patches_one_cell() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store.clone(), PersistenceMode::Awaited);
        let before = canvas.grid().clone();

        let remote = Pixel::new(Coord::new(5, 6), BLUE, Some("far away"), Utc::now());
        assert!(canvas.on_remote_pixel_update(&remote));

        let changed: Vec<_> = canvas
            .grid()
            .iter()
            .zip(before.iter())
            .filter(|(now, then)| now != then)
            .map(|((coord, _), _)| coord)
            .collect();
        assert_eq!(changed, vec![Coord::new(5, 6)]);
        assert_eq!(canvas.get_pixel_info(5, 6), Some(remote));
    }

    #[test]
    fn pixel_info_is_none_for_background_cells() {
        let store = Arc::new(MemoryStore::new());
        let canvas = canvas_on(store, PersistenceMode::Awaited);

        assert_eq!(canvas.get_pixel_info(0, 0), None);
        assert_eq!(canvas.get_pixel_info(99, 0), None);
    }

    #[test]
    fn nickname_is_stored_with_the_pixel() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store.clone(), PersistenceMode::Awaited);
        canvas.set_nickname(Some("ada".to_string()));
        canvas.set_selected_color(RED);

        canvas.place_pixel(4, 4);

        assert_eq!(canvas.get_pixel_info(4, 4).unwrap().author(), "ada");

        canvas.set_nickname(Some("  ".to_string()));
        assert_eq!(canvas.nickname(), None);
    }

    #[test]
    fn shutdown_closes_the_feed() {
        let store = Arc::new(MemoryStore::new());
        let mut canvas = canvas_on(store, PersistenceMode::Awaited);
        assert!(canvas.feed_mut().is_connected());

        canvas.shutdown();
        assert!(!canvas.feed_mut().is_connected());
    }
}
