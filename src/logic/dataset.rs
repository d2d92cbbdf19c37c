//! Embedded Fallback Dataset
//!
//! A small bundled voyage history used when neither the local cache nor
//! the remote dataset is available, so a fresh install still renders a
//! populated dashboard.

use once_cell::sync::Lazy;

use crate::logic::types::RawEvent;

static EMBEDDED_DATASET: Lazy<Vec<RawEvent>> = Lazy::new(|| {
    match serde_json::from_str(include_str!("embedded_dataset.json")) {
        Ok(events) => events,
        Err(e) => {
            log::error!("Embedded dataset failed to parse: {}", e);
            Vec::new()
        }
    }
});

/// The bundled fallback events
pub fn embedded_events() -> &'static [RawEvent] {
    &EMBEDDED_DATASET
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::normalize::normalize_events;
    use crate::logic::types::Currency;

    #[test]
    fn test_embedded_dataset_parses() {
        let events = embedded_events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.ship_name.is_some()));
    }

    #[test]
    fn test_embedded_dataset_normalizes_cleanly() {
        let predictions = normalize_events(embedded_events(), Currency::Brl);
        assert_eq!(predictions.len(), embedded_events().len());
        // bundled timestamps are well-formed, none should fall back to now
        assert!(predictions
            .iter()
            .all(|p| p.timestamp_iso.starts_with("2024-")));
        // the sample history progresses to heavy fouling
        assert!(predictions.iter().any(|p| p.biofouling_level == 3));
    }
}
