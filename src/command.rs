#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AlertOn,
    AlertOff,
}

impl Command {
    pub fn payload(self) -> &'static str {
        match self {
            Command::AlertOn => "ALERT_ON",
            Command::AlertOff => "ALERT_OFF",
        }
    }
}

/// Operator input, decoupled from whichever surface produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send(Command),
    Export,
    Quit,
}
