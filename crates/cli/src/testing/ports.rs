// Path: crates/cli/src/testing/ports.rs

/// How many random starting points to try before giving up.
const PICK_ATTEMPTS: usize = 64;

/// Finds `len` consecutive ports that are currently free for both TCP and UDP.
///
/// The ports are only checked by binding, not reserved, so another process may still take
/// one of them before the validator binds it.
pub fn pick_port_block(len: usize) -> Option<u16> {
    let len = u16::try_from(len).ok()?;
    for _ in 0..PICK_ATTEMPTS {
        let base = portpicker::pick_unused_port()?;
        let Some(last) = base.checked_add(len.saturating_sub(1)) else {
            continue;
        };
        if (base..=last).all(portpicker::is_free) {
            return Some(base);
        }
    }
    None
}

/// Picks two disjoint blocks of `len` ports, for HTTP and gossip.
pub fn pick_disjoint_blocks(len: usize) -> Option<(u16, u16)> {
    let span = u16::try_from(len).ok()?;
    for _ in 0..PICK_ATTEMPTS {
        let http = pick_port_block(len)?;
        let gossip = pick_port_block(len)?;
        let overlaps = http < gossip.saturating_add(span) && gossip < http.saturating_add(span);
        if !overlaps {
            return Some((http, gossip));
        }
    }
    None
}
