use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

/// Ids with a request currently in flight.
///
/// The lock is never held across an await.
#[derive(Clone, Debug, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

/// Marks one id as in flight until dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if `id` is already in flight.
    pub fn try_acquire(&self, id: &str) -> Option<InFlightTicket> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);

        if !ids.insert(id.to_string()) {
            return None;
        }

        Some(InFlightTicket {
            id: id.to_string(),
            ids: Arc::clone(&self.ids),
        })
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_suppressed() {
        let in_flight = InFlight::new();

        let ticket = in_flight.try_acquire("a").unwrap();
        assert!(in_flight.try_acquire("a").is_none());
        assert!(in_flight.contains("a"));

        // other ids are independent
        let _other = in_flight.try_acquire("b").unwrap();

        drop(ticket);
        assert!(!in_flight.contains("a"));
        assert!(in_flight.try_acquire("a").is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let in_flight = InFlight::new();
        let cloned = in_flight.clone();

        let res = std::thread::spawn(move || {
            let _ticket = cloned.try_acquire("a").unwrap();
            panic!("request blew up");
        })
        .join();

        assert!(res.is_err());
        assert!(!in_flight.contains("a"));
    }
}
