/// Mulberry32 stream seeded from a participant id.
///
/// Every random decision in a session is drawn from one of these, so the
/// whole schedule is a pure function of the participant id and the
/// manifest. The generator never reads the clock or the OS entropy pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededGenerator {
    state: u32,
}

impl SeededGenerator {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / 4_294_967_296.0
    }

    /// Uniform index in `0..len`. Always consumes one value, even for `len == 1`.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero; callers filter candidate sets before drawing.
    pub fn pick_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "pick_index on an empty candidate set");
        let index = (self.next_f64() * len as f64) as usize;
        index.min(len - 1)
    }
}
