/// Which of the two chain buffers holds the current output.
///
/// Every executed step reads `active()`, writes `next()` and then toggles,
/// so the output of the chain is always `buffers[active()]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingPong {
    active: u8,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.active as usize
    }

    pub fn next(&self) -> usize {
        1 - self.active as usize
    }

    pub fn toggle(&mut self) {
        self.active ^= 1;
    }

    pub fn reset(&mut self) {
        self.active = 0;
    }
}
