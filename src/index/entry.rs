//! Wire format for node entries.
//!
//! A leaf entry encodes `(key, rid)`, an index entry `(key, child page)`.
//! Both start with a little-endian u16 key length followed by the raw key
//! bytes, so entries are self-describing and slots can hold either kind.

use crate::common::{BriarError, PageId, RecordId, Result, SlotId, MAX_KEY_SIZE};
use crate::storage::page::PageType;

/// Bytes of payload after the key in a leaf entry: rid page (4) + slot (2).
const LEAF_PAYLOAD_SIZE: usize = 6;

/// Bytes of payload after the key in an index entry: child page id.
const INDEX_PAYLOAD_SIZE: usize = 4;

const KEY_LEN_SIZE: usize = 2;

/// Encoded length of an entry holding `key` on the given node kind.
pub fn entry_len(key: &[u8], page_type: PageType) -> usize {
    let payload = match page_type {
        PageType::Leaf => LEAF_PAYLOAD_SIZE,
        PageType::Index => INDEX_PAYLOAD_SIZE,
    };
    KEY_LEN_SIZE + key.len() + payload
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(BriarError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

/// Encodes a leaf entry.
pub fn encode_leaf_entry(key: &[u8], rid: RecordId) -> Result<Vec<u8>> {
    check_key(key)?;

    let mut buf = Vec::with_capacity(entry_len(key, PageType::Leaf));
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&rid.page_id.as_u32().to_le_bytes());
    buf.extend_from_slice(&rid.slot_id.as_u16().to_le_bytes());
    Ok(buf)
}

/// Decodes a leaf entry into its key and rid.
pub fn decode_leaf_entry(record: &[u8]) -> (&[u8], RecordId) {
    let key_len = u16::from_le_bytes([record[0], record[1]]) as usize;
    let key = &record[KEY_LEN_SIZE..KEY_LEN_SIZE + key_len];
    let payload = &record[KEY_LEN_SIZE + key_len..];

    let page = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let slot = u16::from_le_bytes([payload[4], payload[5]]);

    (key, RecordId::new(PageId::new(page), SlotId::new(slot)))
}

/// Encodes an index entry.
pub fn encode_index_entry(key: &[u8], child: PageId) -> Result<Vec<u8>> {
    check_key(key)?;

    let mut buf = Vec::with_capacity(entry_len(key, PageType::Index));
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&child.as_u32().to_le_bytes());
    Ok(buf)
}

/// Decodes an index entry into its separator key and child page.
pub fn decode_index_entry(record: &[u8]) -> (&[u8], PageId) {
    let key_len = u16::from_le_bytes([record[0], record[1]]) as usize;
    let key = &record[KEY_LEN_SIZE..KEY_LEN_SIZE + key_len];
    let payload = &record[KEY_LEN_SIZE + key_len..];

    let child = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);

    (key, PageId::new(child))
}
