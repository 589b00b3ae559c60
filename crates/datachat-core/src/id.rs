use parking_lot::Mutex;
use rand::Rng;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const LENGTH: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Session,
    Turn,
    Message,
}

impl Prefix {
    fn as_str(&self) -> &'static str {
        match self {
            Prefix::Session => "ses",
            Prefix::Turn => "trn",
            Prefix::Message => "msg",
        }
    }
}

/// Last timestamp handed out and the counter within that millisecond.
static CLOCK: Mutex<(u64, u32)> = Mutex::new((0, 0));

fn random_base62(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut result = String::with_capacity(length);
    for _ in 0..length {
        let idx = rng.gen_range(0..62);
        result.push(BASE62_CHARS[idx] as char);
    }
    result
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn next_counter(timestamp: u64) -> u32 {
    let mut clock = CLOCK.lock();
    if clock.0 != timestamp {
        *clock = (timestamp, 0);
    }
    clock.1 += 1;
    clock.1
}

/// Sortable id: `<prefix>_<12 hex chars of time+counter><random base62>`.
pub fn create(prefix: Prefix, timestamp: Option<u64>) -> String {
    let current_timestamp = timestamp.unwrap_or_else(now_millis);
    let counter = next_counter(current_timestamp);
    let now = current_timestamp * 0x1000 + u64::from(counter);

    let mut time_bytes = [0u8; 6];
    for (i, byte) in time_bytes.iter_mut().enumerate() {
        *byte = ((now >> (40 - 8 * i)) & 0xff) as u8;
    }

    format!(
        "{}_{}{}",
        prefix.as_str(),
        hex::encode(time_bytes),
        random_base62(LENGTH - 12)
    )
}

pub fn timestamp(id: &str) -> Option<u64> {
    let (_, body) = id.split_once('_')?;
    let hex = body.get(0..12)?;
    let encoded = u64::from_str_radix(hex, 16).ok()?;
    Some(encoded / 0x1000)
}

pub fn validate_prefix(id: &str, expected: Prefix) -> bool {
    id.strip_prefix(expected.as_str())
        .is_some_and(|rest| rest.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_id() {
        let id = create(Prefix::Session, None);
        assert!(id.starts_with("ses_"));
        assert_eq!(id.len(), 30);
    }

    #[test]
    fn test_timestamp_extraction() {
        let id = create(Prefix::Turn, Some(1_700_000_000_000));
        assert!(timestamp(&id).is_some());
        assert!(timestamp("no-separator").is_none());
    }

    #[test]
    fn test_validate_prefix() {
        let id = create(Prefix::Session, None);
        assert!(validate_prefix(&id, Prefix::Session));
        assert!(!validate_prefix(&id, Prefix::Turn));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = create(Prefix::Message, None);
        let b = create(Prefix::Message, None);
        assert_ne!(a, b);
    }
}
