// Bounded in-memory cache of resolved packets, keyed by public key.
use crate::core::keys::PublicKey;
use crate::core::signed_packet::SignedPacket;
use moka::sync::Cache;

pub struct PacketCache {
    inner: Cache<PublicKey, SignedPacket>,
}

impl PacketCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity.max(1) as u64)
                .build(),
        }
    }

    pub fn get(&self, key: &PublicKey) -> Option<SignedPacket> {
        self.inner.get(key)
    }

    /// Inserts `packet` unless a more recent one for the same key is cached.
    pub fn put(&self, packet: &SignedPacket) {
        let key = packet.public_key();
        let entry = match self.inner.get(&key) {
            Some(mut existing) if existing.is_more_recent_than(packet) => {
                existing.set_last_seen(packet.last_seen());
                existing
            }
            _ => packet.clone(),
        };
        self.inner.insert(key, entry);
    }

    /// Entry count after pending evictions are applied.
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::PacketCache;
    use crate::core::keys::Keypair;
    use crate::core::signed_packet::SignedPacket;
    use crate::core::timestamp::Timestamp;

    fn packet(seed: u8, ts: u64) -> SignedPacket {
        SignedPacket::builder(&Keypair::from_secret_key(&[seed; 32]))
            .txt("a", "b", 30)
            .timestamp(Timestamp::from_micros(ts))
            .sign()
            .expect("sign")
    }

    #[test]
    fn stays_within_capacity() {
        let cache = PacketCache::new(2);
        for seed in 1..=6 {
            cache.put(&packet(seed, 1));
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn keeps_the_more_recent_packet() {
        let cache = PacketCache::new(4);
        let newer = packet(1, 20);
        let older = packet(1, 10);
        cache.put(&newer);
        cache.put(&older);
        let cached = cache.get(&newer.public_key()).expect("cached");
        assert_eq!(cached.timestamp().as_u64(), 20);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn starts_empty() {
        let cache = PacketCache::new(0);
        assert!(cache.is_empty());
        assert!(cache.get(&packet(3, 5).public_key()).is_none());
    }
}
