//! Side data joined onto records during normalization

use std::collections::HashMap;

use crate::domain::region::Region;

/// Satisfaction survey results keyed by `(region, ticket id)`.
///
/// Ticket ids are only unique within one helpdesk instance, and regions may
/// map to different instances, so the region is part of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryData {
    satisfaction: HashMap<(Region, u64), String>,
}

impl AuxiliaryData {
    pub fn insert_satisfaction(&mut self, region: Region, ticket_id: u64, score: impl Into<String>) {
        self.satisfaction.insert((region, ticket_id), score.into());
    }

    pub fn satisfaction_for(&self, region: &Region, ticket_id: u64) -> Option<&str> {
        self.satisfaction
            .get(&(region.clone(), ticket_id))
            .map(String::as_str)
    }

    pub fn merge(&mut self, other: Self) {
        self.satisfaction.extend(other.satisfaction);
    }

    pub fn len(&self) -> usize {
        self.satisfaction.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satisfaction.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_scoped_by_region() {
        let mut aux = AuxiliaryData::default();
        aux.insert_satisfaction(Region::new("eu"), 7, "good");
        assert_eq!(aux.satisfaction_for(&Region::new("eu"), 7), Some("good"));
        assert_eq!(aux.satisfaction_for(&Region::new("us"), 7), None);
    }

    #[test]
    fn merge_combines_entries() {
        let mut a = AuxiliaryData::default();
        a.insert_satisfaction(Region::new("eu"), 1, "bad");
        let mut b = AuxiliaryData::default();
        b.insert_satisfaction(Region::new("us"), 1, "good");
        a.merge(b);
        assert_eq!(a.len(), 2);
    }
}
