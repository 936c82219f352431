//! The synchronous, in-memory KV state machine.
//!
//! `KvState` holds the key/value map and the per-client reply cache. It has
//! no knowledge of RPC, tokio, or mutexes — the gRPC service in
//! [`crate::service`] wraps one behind a `std::sync::Mutex` and does nothing
//! else inside the critical section, matching the "short, non-suspending
//! handler" discipline the whole workspace follows.
//!
//! Keys and values are arbitrary byte strings, not UTF-8 text — spec.md §3
//! and §6 are explicit about this, so no `String` conversion happens
//! anywhere in this module.

use std::collections::HashMap;

/// `Key -> Value` store plus the per-client last-applied-mutation cache.
#[derive(Default)]
pub struct KvState {
    store: HashMap<Vec<u8>, Vec<u8>>,
    /// `cid -> (lastSeq, lastReply)`. Entries are created on first mutation
    /// from a client and overwritten on every subsequently accepted one;
    /// there is no explicit eviction, only the overwrite itself.
    cache: HashMap<i64, (i64, Vec<u8>)>,
}

impl KvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value for `key`, or `""` if unset. Never mutates.
    pub fn get(&self, key: &[u8]) -> Vec<u8> {
        self.store.get(key).cloned().unwrap_or_default()
    }

    /// Unconditional overwrite; returns the value just written.
    pub fn put(&mut self, cid: i64, seq: i64, key: &[u8], value: &[u8]) -> Vec<u8> {
        self.apply(cid, seq, |store| {
            store.insert(key.to_vec(), value.to_vec());
            value.to_vec()
        })
    }

    /// Appends `value` to the existing value of `key` (treating an absent
    /// key as `""`); returns the value *before* the append.
    pub fn append(&mut self, cid: i64, seq: i64, key: &[u8], value: &[u8]) -> Vec<u8> {
        self.apply(cid, seq, |store| {
            let old = store.get(key).cloned().unwrap_or_default();
            let mut new = old.clone();
            new.extend_from_slice(value);
            store.insert(key.to_vec(), new);
            old
        })
    }

    /// Shared acceptance/dedup logic for the two mutating operations.
    ///
    /// `op` is applied to `self.store` only when `(cid, seq)` is the next
    /// expected request for `cid`; otherwise the cached reply from the
    /// matching prior acceptance is returned untouched.
    fn apply(
        &mut self,
        cid: i64,
        seq: i64,
        op: impl FnOnce(&mut HashMap<Vec<u8>, Vec<u8>>) -> Vec<u8>,
    ) -> Vec<u8> {
        let expected = self.cache.get(&cid).map(|(last, _)| last + 1).unwrap_or(0);

        if seq < expected {
            // Duplicate of an already-applied request: the client is still
            // retransmitting a call whose reply it never saw.
            return self
                .cache
                .get(&cid)
                .map(|(_, reply)| reply.clone())
                .unwrap_or_default();
        }

        if seq > expected {
            // Not reachable under the client contract (a clerk never sends
            // seq ahead of lastSeq+1). Self-heal rather than wedge the
            // server: apply it and resynchronize the cache, but this
            // indicates a bug on the caller's side.
            tracing::warn!(cid, seq, expected, "out-of-order sequence number from client");
        }

        let reply = op(&mut self.store);
        self.cache.insert(cid, (seq, reply.clone()));
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_absent_key_is_empty_and_non_mutating() {
        let state = KvState::new();
        assert_eq!(state.get(b"x"), b"");
    }

    #[test]
    fn put_overwrites_and_echoes_value() {
        let mut state = KvState::new();
        assert_eq!(state.put(1, 0, b"x", b"a"), b"a");
        assert_eq!(state.get(b"x"), b"a");
        assert_eq!(state.put(1, 1, b"x", b"b"), b"b");
        assert_eq!(state.get(b"x"), b"b");
    }

    #[test]
    fn append_returns_prior_value_and_accumulates() {
        let mut state = KvState::new();
        assert_eq!(state.append(1, 0, b"x", b"a"), b"");
        assert_eq!(state.get(b"x"), b"a");
        assert_eq!(state.append(1, 1, b"x", b"b"), b"a");
        assert_eq!(state.get(b"x"), b"ab");
    }

    /// A retransmitted Append must not be applied twice.
    #[test]
    fn duplicate_append_is_applied_exactly_once() {
        let mut state = KvState::new();
        let first = state.append(1, 0, b"x", b"a");
        let retransmit = state.append(1, 0, b"x", b"a");
        assert_eq!(first, b"");
        assert_eq!(retransmit, b"");
        assert_eq!(state.get(b"x"), b"a");

        let next = state.append(1, 1, b"x", b"b");
        assert_eq!(next, b"a");
        assert_eq!(state.get(b"x"), b"ab");
    }

    #[test]
    fn reply_cache_is_per_client() {
        let mut state = KvState::new();
        assert_eq!(state.append(1, 0, b"x", b"a"), b"");
        assert_eq!(state.append(2, 0, b"x", b"b"), b"a");
        // client 1 retransmitting its first call still sees its own cached
        // reply, unaffected by client 2's interleaved call.
        assert_eq!(state.append(1, 0, b"x", b"a"), b"");
    }

    /// Two clients interleaving Appends, each retransmitting some calls,
    /// must each see N distinct return values.
    #[test]
    fn interleaved_clients_each_see_distinct_old_values() {
        let mut state = KvState::new();
        let mut c1_replies = Vec::new();
        let mut c2_replies = Vec::new();

        for seq in 0..5 {
            let r = state.append(1, seq, b"x", b"1");
            c1_replies.push(r.clone());
            // retransmit the same call once; must be identical.
            let retransmit = state.append(1, seq, b"x", b"1");
            assert_eq!(retransmit, r);

            let r = state.append(2, seq, b"x", b"2");
            c2_replies.push(r);
        }

        let unique_c1: std::collections::HashSet<_> = c1_replies.iter().cloned().collect();
        let unique_c2: std::collections::HashSet<_> = c2_replies.iter().cloned().collect();
        assert_eq!(unique_c1.len(), 5);
        assert_eq!(unique_c2.len(), 5);
        assert_eq!(state.get(b"x").len(), 10);
    }

    #[test]
    fn reply_cache_last_seq_is_monotonic() {
        let mut state = KvState::new();
        let mut last = -1;
        for seq in 0..10 {
            state.put(1, seq, b"x", b"v");
            let (stored_seq, _) = state.cache[&1];
            assert!(stored_seq >= last);
            last = stored_seq;
        }
    }

    /// A value split across two Appends at what would be a UTF-8 character
    /// boundary if this were text must round-trip byte-for-byte — arbitrary
    /// binary values are in scope, not just valid UTF-8.
    #[test]
    fn binary_values_round_trip_exactly() {
        let mut state = KvState::new();
        let invalid_utf8_1 = [0xE2, 0x82]; // first two bytes of a 3-byte UTF-8 sequence
        let invalid_utf8_2 = [0xAC, b'!']; // completes it, plus a trailing byte
        let old = state.append(1, 0, b"x", &invalid_utf8_1);
        assert_eq!(old, Vec::<u8>::new());
        let old = state.append(1, 1, b"x", &invalid_utf8_2);
        assert_eq!(old, invalid_utf8_1.to_vec());
        assert_eq!(state.get(b"x"), [0xE2, 0x82, 0xAC, b'!']);
    }
}
