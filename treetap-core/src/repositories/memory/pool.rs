//! treetap-core/src/repositories/memory/pool.rs
//!
//! One advertisement's coupon pool, kept as an explicit available-set so random selection
//! never has to scan assigned coupons.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rand::Rng;
use rand::seq::{IndexedRandom, IteratorRandom};
use uuid::Uuid;
use treetap_common::error::Error;
use treetap_common::models::{Coupon, CouponState};

#[derive(Debug)]
pub(crate) struct CouponPool {
    advertisement_id: Uuid,
    /// Insertion order, which is also the listing order.
    coupons: Vec<Coupon>,
    by_code: HashMap<String, usize>,
    /// Indices into `coupons` that are still unassigned.
    available: Vec<usize>,
    /// Position of each available coupon inside `available`, for O(1) removal.
    available_pos: HashMap<usize, usize>,
    /// user_email -> index of the coupon that user holds.
    holders: HashMap<String, usize>,
}

impl CouponPool {
    pub(crate) fn new(advertisement_id: Uuid) -> Self {
        Self {
            advertisement_id,
            coupons: Vec::new(),
            by_code: HashMap::new(),
            available: Vec::new(),
            available_pos: HashMap::new(),
            holders: HashMap::new(),
        }
    }

    /// All-or-nothing append. Collisions with existing codes or inside the batch are reported
    /// together and nothing is inserted.
    pub(crate) fn add(&mut self, codes: &[String]) -> Result<usize, Error> {
        let mut seen = HashSet::with_capacity(codes.len());
        let collisions: Vec<&String> = codes
            .iter()
            .filter(|code| self.by_code.contains_key(code.as_str()) || !seen.insert(code.as_str()))
            .collect();
        if !collisions.is_empty() {
            return Err(Error::duplicate_codes(self.advertisement_id, collisions.into_iter().cloned()));
        }

        for code in codes {
            let idx = self.coupons.len();
            self.coupons.push(Coupon::new(self.advertisement_id, code.clone()));
            self.by_code.insert(code.clone(), idx);
            self.available_pos.insert(idx, self.available.len());
            self.available.push(idx);
        }
        Ok(codes.len())
    }

    pub(crate) fn select<R: Rng + ?Sized>(&self, excluded: &HashSet<String>, rng: &mut R) -> Option<String> {
        let picked = if excluded.is_empty() {
            self.available.choose(rng).copied()
        } else {
            self.available
                .iter()
                .copied()
                .filter(|&idx| !excluded.contains(&self.coupons[idx].code))
                .choose(rng)
        };
        picked.map(|idx| self.coupons[idx].code.clone())
    }

    pub(crate) fn assign(&mut self, code: &str, user_email: &str) -> Result<(), Error> {
        let idx = *self.by_code.get(code).ok_or_else(|| {
            Error::NotFound(format!("Coupon '{code}' not found for advertisement {}", self.advertisement_id))
        })?;

        if !self.available_pos.contains_key(&idx) {
            return Err(Error::AlreadyAssigned {
                advertisement_id: self.advertisement_id,
                code: code.to_string(),
            });
        }
        if self.holders.contains_key(user_email) {
            return Err(Error::AlreadyRedeemed {
                advertisement_id: self.advertisement_id,
                user_email: user_email.to_string(),
            });
        }

        self.remove_available(idx);
        let coupon = &mut self.coupons[idx];
        coupon.state = CouponState::AssignedTo(user_email.to_string());
        coupon.assigned_at = Some(Utc::now());
        self.holders.insert(user_email.to_string(), idx);
        Ok(())
    }

    fn remove_available(&mut self, idx: usize) {
        if let Some(pos) = self.available_pos.remove(&idx) {
            self.available.swap_remove(pos);
            if let Some(&moved) = self.available.get(pos) {
                self.available_pos.insert(moved, pos);
            }
        }
    }

    pub(crate) fn unassigned(&self) -> usize {
        self.available.len()
    }

    pub(crate) fn holds(&self, user_email: &str) -> bool {
        self.holders.contains_key(user_email)
    }

    pub(crate) fn held_by(&self, user_email: &str) -> Option<&Coupon> {
        self.holders.get(user_email).map(|&idx| &self.coupons[idx])
    }

    pub(crate) fn coupons(&self) -> &[Coupon] {
        &self.coupons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn pool_with(list: &[&str]) -> CouponPool {
        let mut pool = CouponPool::new(Uuid::new_v4());
        pool.add(&codes(list)).unwrap();
        pool
    }

    #[test]
    fn add_rejects_whole_batch_on_collision() {
        let mut pool = pool_with(&["A", "B"]);
        let err = pool.add(&codes(&["C", "B", "D"])).unwrap_err();
        match err {
            Error::DuplicateCode { codes, .. } => assert_eq!(codes, vec!["B".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pool.unassigned(), 2);
        assert_eq!(pool.coupons().len(), 2);
    }

    #[test]
    fn add_rejects_duplicates_inside_batch() {
        let mut pool = CouponPool::new(Uuid::new_v4());
        assert!(matches!(pool.add(&codes(&["A", "A"])), Err(Error::DuplicateCode { .. })));
        assert_eq!(pool.unassigned(), 0);
    }

    #[test]
    fn assignment_is_one_way_and_one_per_user() {
        let mut pool = pool_with(&["A", "B", "C"]);
        pool.assign("B", "u1@x.test").unwrap();

        assert!(matches!(pool.assign("B", "u2@x.test"), Err(Error::AlreadyAssigned { .. })));
        assert!(matches!(pool.assign("A", "u1@x.test"), Err(Error::AlreadyRedeemed { .. })));
        assert!(matches!(pool.assign("Z", "u3@x.test"), Err(Error::NotFound(_))));

        assert_eq!(pool.unassigned(), 2);
        assert!(pool.holds("u1@x.test"));
        assert_eq!(pool.held_by("u1@x.test").map(|c| c.code.as_str()), Some("B"));
    }

    #[test]
    fn selection_only_returns_available_codes() {
        let mut pool = pool_with(&["A", "B", "C", "D"]);
        pool.assign("A", "u1@x.test").unwrap();
        pool.assign("C", "u2@x.test").unwrap();

        let mut rng = rand::rng();
        let none = HashSet::new();
        for _ in 0..50 {
            let code = pool.select(&none, &mut rng).unwrap();
            assert!(code == "B" || code == "D", "picked assigned code {code}");
        }

        let excluded: HashSet<String> = ["B".to_string()].into_iter().collect();
        for _ in 0..20 {
            assert_eq!(pool.select(&excluded, &mut rng).as_deref(), Some("D"));
        }

        let all: HashSet<String> = ["B".to_string(), "D".to_string()].into_iter().collect();
        assert_eq!(pool.select(&all, &mut rng), None);
    }

    #[test]
    fn selection_reaches_every_available_code() {
        let pool = pool_with(&["A", "B", "C"]);
        let mut rng = rand::rng();
        let none = HashSet::new();
        let seen: HashSet<String> = (0..300).filter_map(|_| pool.select(&none, &mut rng)).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn draining_the_pool_keeps_index_consistent() {
        let mut pool = pool_with(&["A", "B", "C", "D", "E"]);
        let mut rng = rand::rng();
        let none = HashSet::new();
        for n in 0..5 {
            let code = pool.select(&none, &mut rng).unwrap();
            pool.assign(&code, &format!("user{n}@x.test")).unwrap();
        }
        assert_eq!(pool.unassigned(), 0);
        assert_eq!(pool.select(&none, &mut rng), None);
        assert!(pool.coupons().iter().all(Coupon::is_assigned));
    }
}
