/// A string buffer capped at a fixed byte count, used by the script
/// sandbox's `emit` binding. Once the cap is reached the buffer discards
/// further writes but remembers that the limit was hit so the caller can
/// report `OUTPUT_LIMIT` instead of a clean completion.
pub struct CappedOutput {
    data: String,
    cap_bytes: usize,
    limit_hit: bool,
}

impl CappedOutput {
    pub fn new(cap_bytes: usize) -> Self {
        Self {
            data: String::new(),
            cap_bytes,
            limit_hit: false,
        }
    }

    /// Appends `s`, truncating at the cap. Returns `true` once the limit
    /// has been reached (on this call or a prior one).
    pub fn emit(&mut self, s: &str) -> bool {
        if self.limit_hit {
            return true;
        }
        let remaining = self.cap_bytes.saturating_sub(self.data.len());
        if s.len() <= remaining {
            self.data.push_str(s);
            return false;
        }
        let mut boundary = remaining;
        while boundary > 0 && !s.is_char_boundary(boundary) {
            boundary -= 1;
        }
        self.data.push_str(&s[..boundary]);
        self.limit_hit = true;
        true
    }

    pub fn limit_hit(&self) -> bool {
        self.limit_hit
    }

    pub fn into_string(self) -> String {
        self.data
    }
}
