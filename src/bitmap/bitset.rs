/// Growable bit-vector keyed by entity id: OR/AND/test beyond native
/// word width, plus descending set-bit iteration.
///
/// Bit 0 is reserved and never meaningful: store ids start at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitset {
    words: Vec<u64>,
}

impl Bitset {
    pub fn new() -> Self {
        Bitset { words: Vec::new() }
    }

    pub fn set(&mut self, bit: u64) {
        let word = (bit / 64) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn test(&self, bit: u64) -> bool {
        let word = (bit / 64) as usize;
        match self.words.get(word) {
            Some(w) => w & (1 << (bit % 64)) != 0,
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Monotonic grow-only union; normal operation never clears bits.
    pub fn or_assign(&mut self, other: &Bitset) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= src;
        }
    }

    pub fn and(&self, other: &Bitset) -> Bitset {
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| a & b)
            .collect();
        Bitset { words }
    }

    /// Number of set bits, ignoring reserved bit 0.
    pub fn count(&self) -> usize {
        let mut total: usize = self.words.iter().map(|w| w.count_ones() as usize).sum();
        if self.test(0) {
            total -= 1;
        }
        total
    }

    /// Minimal big-endian byte image; empty for the zero bitset. This is
    /// the stored form (before compression) and must stay bit-exact.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * 8);
        for word in self.words.iter().rev() {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        // Strip leading zero bytes for the minimal image
        let first = bytes.iter().position(|&b| b != 0);
        match first {
            Some(i) => bytes.split_off(i),
            None => Vec::new(),
        }
    }

    pub fn from_be_bytes(bytes: &[u8]) -> Bitset {
        let mut words = Vec::with_capacity(bytes.len() / 8 + 1);
        for chunk in bytes.rchunks(8) {
            let mut buf = [0u8; 8];
            buf[8 - chunk.len()..].copy_from_slice(chunk);
            words.push(u64::from_be_bytes(buf));
        }
        let mut set = Bitset { words };
        set.shrink();
        set
    }

    fn shrink(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Lazy iterator over set-bit positions in strictly descending
    /// order. Position 0 is reserved and never yielded. The iterator
    /// owns a snapshot: it is finite, forward-only and not restartable.
    pub fn ranks(&self) -> Ranks {
        Ranks {
            set: self.clone(),
        }
    }
}

pub struct Ranks {
    set: Bitset,
}

impl Iterator for Ranks {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while let Some(&word) = self.set.words.last() {
            if word == 0 {
                self.set.words.pop();
                continue;
            }
            let word_index = self.set.words.len() - 1;
            let top = 63 - word.leading_zeros() as u64;
            let bit = word_index as u64 * 64 + top;
            if bit == 0 {
                return None;
            }
            *self.set.words.last_mut().unwrap() ^= 1 << top;
            return Some(bit);
        }
        None
    }
}
