//! RESP instrument response files.
//!
//! RESP is line oriented: every line starts with a `BxxxFyy` tag naming the
//! blockette and field, the value is the last whitespace-separated token.
//! It carries channel identity and epochs but no coordinates.

use std::io::BufRead;

use crate::error::{CodecError, CodecResult};
use crate::seed::parse_seed_time;
use crate::trace::{InventoryChannel, StationInventory};

/// Whether the payload looks like a RESP file.
pub fn is_resp(data: &[u8]) -> bool {
    let head = &data[..data.len().min(4096)];
    String::from_utf8_lossy(head)
        .lines()
        .any(|l| l.trim_start().starts_with("B050F03"))
}

#[derive(Default)]
struct Pending {
    network: Option<String>,
    station: Option<String>,
    location: Option<String>,
    channel: Option<String>,
    start: Option<chrono::DateTime<chrono::Utc>>,
}

/// Read the channels described by a RESP file.
///
/// A channel is complete once its end date line (B052F23) is seen; epochs
/// missing any identifying field are dropped.
pub fn read(data: &[u8]) -> CodecResult<StationInventory> {
    let mut inventory = StationInventory::default();
    let mut pending = Pending::default();

    for line in data.lines() {
        let line = line.map_err(|e| CodecError::malformed("RESP", e.to_string()))?;
        let line = line.trim();
        let Some(value) = line.split_whitespace().last() else {
            continue;
        };

        if line.starts_with("B050F03") {
            pending.station = Some(value.to_string());
        } else if line.starts_with("B050F16") {
            pending.network = Some(value.to_string());
        } else if line.starts_with("B052F03") {
            let location = if value == "??" { "" } else { value };
            pending.location = Some(location.to_string());
        } else if line.starts_with("B052F04") {
            pending.channel = Some(value.to_string());
        } else if line.starts_with("B052F22") {
            pending.start = parse_seed_time(value);
        } else if line.starts_with("B052F23") {
            let end = parse_seed_time(value);
            let done = std::mem::take(&mut pending);
            if let (Some(network), Some(station), Some(location), Some(channel), Some(start)) =
                (done.network, done.station, done.location, done.channel, done.start)
            {
                inventory.push_channel(
                    &network,
                    &station,
                    InventoryChannel {
                        location,
                        channel,
                        start_date: Some(start),
                        end_date: end,
                    },
                );
            }
        }
    }

    if inventory.is_empty() {
        return Err(CodecError::malformed("RESP", "no complete channel found"));
    }
    Ok(inventory)
}
