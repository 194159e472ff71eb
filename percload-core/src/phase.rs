/// Screens of a session, in the order a participant sees them
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Instructions,
    Trials,
    Debrief,
}

impl Phase {
    pub fn next(&self) -> Option<Self> {
        use Phase::*;
        Some(match self {
            Instructions => Trials,
            Trials => Debrief,
            Debrief => return None,
        })
    }
}
