use std::fmt;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub read_hits: u64,
    pub read_misses: u64,
    pub write_hits: u64,
    pub write_misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn accesses(&self) -> u64 {
        self.read_hits + self.read_misses + self.write_hits + self.write_misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.accesses();
        if total > 0 {
            (self.read_hits + self.write_hits) as f64 / total as f64
        } else {
            0.0
        }
    }
}

fn rate_line(f: &mut fmt::Formatter<'_>, label: &str, hits: u64, misses: u64) -> fmt::Result {
    let total = hits + misses;
    if total > 0 {
        let rate = hits as f64 / total as f64;
        writeln!(
            f,
            "{label:<14}{:.2}% hit rate ({} / {})",
            rate * 100.0,
            hits,
            total
        )
    } else {
        writeln!(f, "{label:<14}N/A")
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------------------------")?;
        rate_line(f, "Reads:", self.read_hits, self.read_misses)?;
        rate_line(f, "Writes:", self.write_hits, self.write_misses)?;
        writeln!(f, "{:<14}{}", "Invalidations:", self.invalidations)?;
        writeln!(f, "{:<14}{}", "Evictions:", self.evictions)?;
        write!(f, "-----------------------------")
    }
}
