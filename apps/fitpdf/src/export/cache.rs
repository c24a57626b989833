//! In-memory cache of rendered PDFs keyed by a digest of the request.
//!
//! Export is deterministic for a given content tree and option set, so repeated
//! downloads of an unchanged resume skip the search entirely. Eviction is FIFO.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::export::exporter::{ExportOptions, ExportedDocument};
use crate::render::tree::RenderNodeSpec;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, ExportedDocument>,
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct ExportCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    content: &'a RenderNodeSpec,
    options: &'a ExportOptions,
}

impl ExportCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn key(content: &RenderNodeSpec, options: &ExportOptions) -> Option<String> {
        let material = serde_json::to_vec(&KeyMaterial { content, options }).ok()?;
        Some(hex_sha256(&material))
    }

    pub fn get(&self, key: &str) -> Option<ExportedDocument> {
        if !self.is_enabled() {
            return None;
        }
        self.entries.lock().map.get(key).cloned()
    }

    pub fn insert(&self, key: String, export: ExportedDocument) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.map.insert(key.clone(), export).is_none() {
            entries.order.push_back(key);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::fitting::templates::Archetype;

    fn make_export(tag: &'static [u8]) -> ExportedDocument {
        ExportedDocument {
            bytes: Bytes::from_static(tag),
            filename: "resume.pdf".to_string(),
            archetype: Archetype::Modern,
            scale: 0.2,
            used_fallback: false,
        }
    }

    #[test]
    fn test_key_is_stable_and_option_sensitive() {
        let content = RenderNodeSpec::text("p", "", "hello");
        let options = ExportOptions::default();
        let a = ExportCache::key(&content, &options).unwrap();
        let b = ExportCache::key(&content, &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let quality = ExportOptions {
            raster_quality: 0.5,
            ..Default::default()
        };
        assert_ne!(a, ExportCache::key(&content, &quality).unwrap());
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = ExportCache::new(2);
        cache.insert("a".into(), make_export(b"1"));
        cache.insert("b".into(), make_export(b"2"));
        cache.insert("c".into(), make_export(b"3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").unwrap().bytes, Bytes::from_static(b"3"));
    }

    #[test]
    fn test_reinserting_does_not_duplicate_order() {
        let cache = ExportCache::new(2);
        cache.insert("a".into(), make_export(b"1"));
        cache.insert("a".into(), make_export(b"2"));
        cache.insert("b".into(), make_export(b"3"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().bytes, Bytes::from_static(b"2"));
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = ExportCache::new(0);
        cache.insert("a".into(), make_export(b"1"));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
    }
}
