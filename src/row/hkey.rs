use std::cmp;
use std::fmt;

const ESCAPE_LENGTH: usize = 9;

pub fn encoded_size(len: usize) -> usize {
    (len + (ESCAPE_LENGTH - 1)) / (ESCAPE_LENGTH - 1) * ESCAPE_LENGTH
}

// 8 バイトずつ区切り、各グループの末尾に長さ(続きがあれば 9)を付ける
fn encode(mut src: &[u8], dst: &mut Vec<u8>) {
    dst.reserve(encoded_size(src.len()));
    loop {
        let copy_len = cmp::min(ESCAPE_LENGTH - 1, src.len());
        dst.extend(&src[0..copy_len]);
        src = &src[copy_len..];
        if src.is_empty() {
            let pad_size = ESCAPE_LENGTH - 1 - copy_len;
            dst.resize(dst.len() + pad_size, 0);
            dst.push(copy_len as u8);
            break;
        }
        dst.push(ESCAPE_LENGTH as u8);
    }
}

fn decode(src: &mut &[u8], dst: &mut Vec<u8>) {
    loop {
        let extra = src[ESCAPE_LENGTH - 1];
        let len = cmp::min(ESCAPE_LENGTH - 1, extra as usize);
        dst.extend_from_slice(&src[..len]);
        *src = &src[ESCAPE_LENGTH..];
        if extra < ESCAPE_LENGTH as u8 {
            break;
        }
    }
}

/// Hierarchical key: segments of table ordinal plus key columns, all
/// memcomparable. An ancestor's key is a segment-aligned prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HKey {
    bytes: Vec<u8>,
    segment_ends: Vec<usize>,
}

impl HKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_segment(&mut self, ordinal: u32, keys: &[&[u8]]) {
        let mut header = ordinal.to_be_bytes().to_vec();
        header.extend_from_slice(&(keys.len() as u64).to_be_bytes());
        encode(&header, &mut self.bytes);
        for key in keys {
            encode(key, &mut self.bytes);
        }
        self.segment_ends.push(self.bytes.len());
    }

    pub fn with_segment(mut self, ordinal: u32, keys: &[&[u8]]) -> Self {
        self.push_segment(ordinal, keys);
        self
    }

    pub fn segment_count(&self) -> usize {
        self.segment_ends.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_ancestor_of(&self, other: &HKey) -> bool {
        let depth = self.segment_count();
        depth < other.segment_count()
            && (depth == 0 || other.segment_ends[depth - 1] == self.bytes.len())
            && other.bytes.starts_with(&self.bytes)
    }

    pub fn segments(&self) -> Vec<(u32, Vec<Vec<u8>>)> {
        let mut segments = Vec::with_capacity(self.segment_count());
        let mut rest = &self.bytes[..];
        while !rest.is_empty() {
            let mut header = vec![];
            decode(&mut rest, &mut header);
            let mut ordinal = [0u8; 4];
            ordinal.copy_from_slice(&header[..4]);
            let mut count = [0u8; 8];
            count.copy_from_slice(&header[4..12]);
            let count = u64::from_be_bytes(count);
            let mut keys = vec![];
            for _ in 0..count {
                let mut key = vec![];
                decode(&mut rest, &mut key);
                keys.push(key);
            }
            segments.push((u32::from_be_bytes(ordinal), keys));
        }
        segments
    }
}

impl PartialOrd for HKey {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HKey {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl fmt::Display for HKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (ordinal, keys)) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", ordinal)?;
            for key in keys {
                match std::str::from_utf8(key) {
                    Ok(s) => write!(f, ",{:?}", s)?,
                    Err(_) => write!(f, ",{:02x?}", key)?,
                }
            }
        }
        f.write_str("}")
    }
}
