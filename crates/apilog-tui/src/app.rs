use apilog_core::LogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    RecordList,
    RecordDetail,
}

pub struct App {
    /// Newest first.
    pub records: Vec<LogRecord>,
    pub selected_index: usize,
    pub filter: String,
    pub filter_active: bool,
    pub active_pane: Pane,
    pub should_quit: bool,
    pub backend_name: String,
    pub capacity: usize,
    /// Last store problem, shown in the status bar until the next good read.
    pub degraded: Option<String>,
}

impl App {
    pub fn new(backend_name: &str, capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            selected_index: 0,
            filter: String::new(),
            filter_active: false,
            active_pane: Pane::RecordList,
            should_quit: false,
            backend_name: backend_name.to_string(),
            capacity,
            degraded: None,
        }
    }

    /// Matches URL or method, case-insensitively.
    pub fn filtered_records(&self) -> Vec<&LogRecord> {
        if self.filter.is_empty() {
            self.records.iter().collect()
        } else {
            let filter_lower = self.filter.to_lowercase();
            self.records
                .iter()
                .filter(|r| {
                    r.url.to_lowercase().contains(&filter_lower)
                        || r.method.to_lowercase().contains(&filter_lower)
                })
                .collect()
        }
    }

    pub fn selected_record(&self) -> Option<&LogRecord> {
        self.filtered_records().get(self.selected_index).copied()
    }

    /// Swap in a fresh newest-first snapshot, keeping the selected record
    /// selected when it is still retained.
    pub fn replace_records(&mut self, records: Vec<LogRecord>) {
        let selected_id = self.selected_record().map(|r| r.id.clone());
        self.records = records;
        let filtered = self.filtered_records();
        let index = selected_id
            .and_then(|id| filtered.iter().position(|r| r.id == id))
            .unwrap_or(0)
            .min(filtered.len().saturating_sub(1));
        self.selected_index = index;
    }

    pub fn move_up(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    pub fn move_down(&mut self) {
        let max = self.filtered_records().len().saturating_sub(1);
        if self.selected_index < max {
            self.selected_index += 1;
        }
    }

    pub fn jump_top(&mut self) {
        self.selected_index = 0;
    }

    pub fn jump_bottom(&mut self) {
        self.selected_index = self.filtered_records().len().saturating_sub(1);
    }

    pub fn toggle_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::RecordList => Pane::RecordDetail,
            Pane::RecordDetail => Pane::RecordList,
        };
    }

    pub fn activate_filter(&mut self) {
        self.filter_active = true;
    }

    pub fn deactivate_filter(&mut self) {
        self.filter_active = false;
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
        self.filter_active = false;
        self.selected_index = 0;
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter.push(c);
        self.selected_index = 0;
    }

    pub fn pop_filter_char(&mut self) {
        self.filter.pop();
        self.selected_index = 0;
    }
}
