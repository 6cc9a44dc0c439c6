use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, ReactionType};

pub const PAUSE_ID: &str = "music_pause";
pub const SKIP_ID: &str = "music_skip";
pub const STOP_ID: &str = "music_stop";
pub const QUEUE_ID: &str = "music_queue";

/// Player facts the control buttons are derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    /// A track is streaming or paused
    pub active: bool,
    pub paused: bool,
    /// At least one track is waiting in the queue
    pub has_next: bool,
    /// The view was invalidated; every button renders disabled
    pub disabled: bool,
}

impl ControlState {
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Default::default()
        }
    }

    pub fn pause_label(&self) -> &'static str {
        if self.paused { "Resume" } else { "Pause" }
    }

    pub fn pause_enabled(&self) -> bool {
        !self.disabled && self.active
    }

    pub fn skip_enabled(&self) -> bool {
        !self.disabled && self.active && self.has_next
    }

    pub fn stop_enabled(&self) -> bool {
        !self.disabled && self.active
    }

    pub fn queue_enabled(&self) -> bool {
        !self.disabled
    }
}

/// A button press on the control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    TogglePause,
    Skip,
    Stop,
    ShowQueue,
}

impl ControlAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            PAUSE_ID => Some(Self::TogglePause),
            SKIP_ID => Some(Self::Skip),
            STOP_ID => Some(Self::Stop),
            QUEUE_ID => Some(Self::ShowQueue),
            _ => None,
        }
    }
}

/// Creates the row of music control buttons for the given state
pub fn create_music_control_buttons(state: ControlState) -> Vec<CreateActionRow> {
    let play_pause = CreateButton::new(PAUSE_ID)
        .emoji(ReactionType::Unicode(
            if state.paused { "▶️" } else { "⏸️" }.to_string(),
        ))
        .style(if state.paused {
            ButtonStyle::Success
        } else {
            ButtonStyle::Primary
        })
        .label(state.pause_label())
        .disabled(!state.pause_enabled());

    let skip = CreateButton::new(SKIP_ID)
        .emoji(ReactionType::Unicode("⏭️".to_string()))
        .style(ButtonStyle::Secondary)
        .label("Skip")
        .disabled(!state.skip_enabled());

    let stop = CreateButton::new(STOP_ID)
        .emoji(ReactionType::Unicode("⏹️".to_string()))
        .style(ButtonStyle::Danger)
        .label("Stop")
        .disabled(!state.stop_enabled());

    let queue = CreateButton::new(QUEUE_ID)
        .emoji(ReactionType::Unicode("📜".to_string()))
        .style(ButtonStyle::Secondary)
        .label("Queue")
        .disabled(!state.queue_enabled());

    vec![CreateActionRow::Buttons(vec![play_pause, skip, stop, queue])]
}
