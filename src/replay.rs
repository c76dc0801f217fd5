use std::io::{self, BufRead, Write};

use log::warn;

use crate::backing::BackingStore;
use crate::controller::CacheController;
use crate::memory_access::MemoryAccess;

/// Drives `cache` with every record of `input`. Records that missed are
/// echoed to `misses` in trace format, so the output is itself a trace of
/// the traffic reaching memory.
///
/// Malformed records and failed accesses are logged and skipped.
pub fn replay<M, R, W>(
    cache: &mut CacheController<M>,
    input: R,
    mut misses: Option<W>,
) -> io::Result<()>
where
    M: BackingStore,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = match line.parse::<MemoryAccess>() {
            Ok(rec) => rec,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };
        let outcome = match &rec {
            MemoryAccess::Regular(mem) if mem.store => cache
                .write_word(mem.address, mem.data.unwrap_or(0))
                .map(|access| access.is_hit()),
            MemoryAccess::Regular(mem) => cache
                .read_word(mem.address)
                .map(|(_, access)| access.is_hit()),
            MemoryAccess::Invalidate(inv) => {
                cache.invalidate(inv.address);
                Ok(true)
            }
        };
        match (outcome, misses.as_mut()) {
            (Ok(false), Some(out)) => writeln!(out, "{}", rec)?,
            (Ok(_), _) => {}
            (Err(e), _) => warn!("skipping {rec}: {e}"),
        }
    }
    if let Some(out) = misses.as_mut() {
        out.flush()?;
    }
    Ok(())
}
