use rand::Rng;

/// One timed play unit of a room
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// 1-indexed
    pub number: u32,
    pub letter: char,
    pub duration: u32,
    pub active: bool,
    pub remaining_seconds: u32,
}

impl Round {
    pub fn new(number: u32, letter: char, duration: u32) -> Self {
        Self {
            number,
            letter,
            duration,
            active: true,
            remaining_seconds: duration,
        }
    }

    pub fn close(&mut self) {
        self.active = false;
        self.remaining_seconds = 0;
    }
}

/// Letters drawn without repetition until every letter has been played
#[derive(Debug, Clone, Default)]
pub struct LetterPool {
    used: Vec<char>,
}

impl LetterPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self) -> char {
        let mut left: Vec<char> = ('A'..='Z').filter(|c| !self.used.contains(c)).collect();
        if left.is_empty() {
            self.used.clear();
            left = ('A'..='Z').collect();
        }

        let mut rng = rand::rng();
        let letter = left[rng.random_range(0..left.len())];
        self.used.push(letter);
        letter
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }
}
