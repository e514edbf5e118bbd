use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};

pub enum Event {
    Key(KeyEvent),
    /// Time to reload the log from the store.
    Refresh,
    Tick,
}

pub struct EventHandler {
    tick_rate: Duration,
    refresh_every: Duration,
    last_refresh: Instant,
}

impl EventHandler {
    pub fn new(tick_rate_ms: u64, refresh_every: Duration) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
            refresh_every,
            last_refresh: Instant::now(),
        }
    }

    /// Wait up to one tick for a key; otherwise report a due refresh or a tick.
    pub fn poll(&mut self) -> std::io::Result<Event> {
        if event::poll(self.tick_rate)?
            && let CrosstermEvent::Key(key) = event::read()?
        {
            return Ok(Event::Key(key));
        }
        if self.last_refresh.elapsed() >= self.refresh_every {
            self.last_refresh = Instant::now();
            return Ok(Event::Refresh);
        }
        Ok(Event::Tick)
    }
}
